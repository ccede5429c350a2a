use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

/// Opaque key telling one song apart from another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TrackId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What the account is playing right now. Built fresh on every poll.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub track_id: TrackId,
    pub track_name: String,
    pub artist_name: String,
    pub album_art_url: String,
    pub duration_ms: u64,
    pub progress_ms: u64,
    pub is_playing: bool,
}

/// The "what is playing now" side of the world 🎵
#[async_trait]
pub trait PlaybackSource: Send + Sync {
    /// `Ok(None)` when there is no active session at all.
    async fn current_playback(&self) -> Result<Option<PlaybackSnapshot>>;
}
