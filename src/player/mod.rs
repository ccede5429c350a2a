pub mod auth;
pub mod spotify;
pub mod traits;

pub use auth::SpotifyAuth;
pub use spotify::SpotifyClient;
pub use traits::{PlaybackSnapshot, PlaybackSource, TrackId};
