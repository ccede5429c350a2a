pub mod cache;
pub mod cli;
pub mod now_playing;

pub use cache::LyricsCache;
pub use cli::Args;
pub use now_playing::{NowPlaying, NowPlayingService, PollResponse};
