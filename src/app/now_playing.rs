//! The `/now_playing` poll: playback + lyrics (cached per track) + album art
//! color, folded into one response.

use super::cache::LyricsCache;
use crate::artwork::ArtworkSource;
use crate::error::Result;
use crate::lyrics::LyricsSource;
use crate::palette;
use crate::player::{PlaybackSnapshot, PlaybackSource, TrackId};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const NOT_PLAYING_MESSAGE: &str = "No song is currently playing.";
pub const LYRICS_NOT_FOUND: &str = "Lyrics not found.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NowPlaying {
    pub track_name: String,
    pub artist_name: String,
    pub album_image_url: String,
    pub lyrics: Vec<String>,
    pub duration_ms: u64,
    pub progress_ms: u64,
    pub dominant_color: String,
}

impl NowPlaying {
    /// Index of the lyric line the page scrolls to:
    /// `floor(progress / duration * lines)`, kept inside the line list.
    pub fn highlighted_line(&self) -> Option<usize> {
        highlighted_line(self.progress_ms, self.duration_ms, self.lyrics.len())
    }
}

/// What `/now_playing` answers. Errors travel in-band.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PollResponse {
    Playing(NowPlaying),
    Error { error: String },
}

impl PollResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

pub fn highlighted_line(progress_ms: u64, duration_ms: u64, line_count: usize) -> Option<usize> {
    if duration_ms == 0 || line_count == 0 {
        return None;
    }
    let ratio = progress_ms as f64 / duration_ms as f64;
    let index = (ratio * line_count as f64).floor() as usize;
    Some(index.min(line_count - 1))
}

/// Split provider text into display lines.
///
/// The provider's first line is a title header rather than lyrics, so it is
/// dropped before anything else. This is a heuristic about the provider's
/// formatting, not a parse.
pub fn lyric_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct NowPlayingService {
    playback: Arc<dyn PlaybackSource>,
    lyrics: Arc<dyn LyricsSource>,
    artwork: Arc<dyn ArtworkSource>,
    cache: Mutex<LyricsCache>,
    color_quality: u32,
}

impl NowPlayingService {
    pub fn new(
        playback: Arc<dyn PlaybackSource>,
        lyrics: Arc<dyn LyricsSource>,
        artwork: Arc<dyn ArtworkSource>,
        color_quality: u32,
    ) -> Self {
        Self {
            playback,
            lyrics,
            artwork,
            cache: Mutex::new(LyricsCache::new()),
            color_quality,
        }
    }

    /// One poll. Never fails: problems come back as `PollResponse::Error`.
    pub async fn poll(&self) -> PollResponse {
        match self.try_poll().await {
            Ok(Some(now)) => {
                debug!(
                    track = %now.track_name,
                    line = ?now.highlighted_line(),
                    "Now playing"
                );
                PollResponse::Playing(now)
            }
            Ok(None) => PollResponse::error(NOT_PLAYING_MESSAGE),
            Err(err) => {
                warn!(error = %err, "Now playing poll failed");
                PollResponse::error(err.to_string())
            }
        }
    }

    /// Track whose lyrics are currently cached.
    pub async fn cached_track(&self) -> Option<TrackId> {
        self.cache.lock().await.current_track().cloned()
    }

    async fn try_poll(&self) -> Result<Option<NowPlaying>> {
        // 1. What's playing? 🎵
        let snapshot = match self.playback.current_playback().await? {
            Some(s) if s.is_playing => s,
            _ => return Ok(None),
        };

        // 2. Album art color 🎨 (before lyrics, so a failure here leaves the cache alone)
        let dominant_color = self.dominant_color(&snapshot.album_art_url).await?;

        // 3. Lyrics, cached per track 📝
        let lyrics = self.lyrics_for(&snapshot).await?;

        Ok(Some(NowPlaying {
            track_name: snapshot.track_name,
            artist_name: snapshot.artist_name,
            album_image_url: snapshot.album_art_url,
            lyrics,
            duration_ms: snapshot.duration_ms,
            progress_ms: snapshot.progress_ms,
            dominant_color,
        }))
    }

    async fn dominant_color(&self, url: &str) -> Result<String> {
        let image = self.artwork.fetch_image(url).await?;
        let quality = self.color_quality;
        let color =
            tokio::task::spawn_blocking(move || palette::dominant_color(&image, quality)).await??;
        Ok(color.to_css())
    }

    async fn lyrics_for(&self, snapshot: &PlaybackSnapshot) -> Result<Vec<String>> {
        // Held across the fetch: concurrent polls of a new track fetch once
        let mut cache = self.cache.lock().await;

        if let Some(lines) = cache.lookup(&snapshot.track_id) {
            debug!(track = %snapshot.track_id, "Lyrics cache hit");
            return Ok(lines.to_vec());
        }

        let text = self
            .lyrics
            .search_lyrics(&snapshot.track_name, &snapshot.artist_name)
            .await?;

        let lines = match text {
            Some(text) if !text.trim().is_empty() => lyric_lines(&text),
            _ => vec![LYRICS_NOT_FOUND.to_string()],
        };
        info!(
            track = %snapshot.track_id,
            title = %snapshot.track_name,
            lines = lines.len(),
            "Fetched lyrics"
        );

        cache.store(snapshot.track_id.clone(), lines.clone());
        Ok(lines)
    }
}
