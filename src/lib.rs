pub mod app;
pub mod artwork;
pub mod config;
pub mod error;
pub mod logging;
pub mod lyrics;
pub mod palette;
pub mod player;
pub mod server;

pub use error::{Error, Result};
