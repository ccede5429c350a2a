use super::auth::SpotifyAuth;
use super::traits::{PlaybackSnapshot, PlaybackSource, TrackId};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

pub const API_BASE: &str = "https://api.spotify.com/v1";

#[derive(Debug, Deserialize)]
struct CurrentlyPlaying {
    #[serde(default)]
    is_playing: bool,
    progress_ms: Option<u64>,
    item: Option<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    /// `null` for local files
    id: Option<String>,
    uri: String,
    name: String,
    duration_ms: u64,
    #[serde(default)]
    artists: Vec<ArtistObject>,
    album: AlbumObject,
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumObject {
    #[serde(default)]
    images: Vec<ImageObject>,
}

#[derive(Debug, Deserialize)]
struct ImageObject {
    url: String,
}

impl CurrentlyPlaying {
    fn into_snapshot(self) -> Result<Option<PlaybackSnapshot>> {
        let Some(track) = self.item else {
            // Playing but no track item: an ad, or an episode we didn't ask for
            return if self.is_playing {
                Err(Error::MissingField("a track item"))
            } else {
                Ok(None)
            };
        };

        let artist_name = track
            .artists
            .into_iter()
            .next()
            .map(|a| a.name)
            .ok_or(Error::MissingField("an artist"))?;

        // Spotify lists album images largest first
        let album_art_url = track
            .album
            .images
            .into_iter()
            .next()
            .map(|i| i.url)
            .ok_or(Error::MissingField("album art"))?;

        Ok(Some(PlaybackSnapshot {
            track_id: TrackId::new(track.id.unwrap_or(track.uri)),
            track_name: track.name,
            artist_name,
            album_art_url,
            duration_ms: track.duration_ms,
            progress_ms: self.progress_ms.unwrap_or(0),
            is_playing: self.is_playing,
        }))
    }
}

/// Spotify Web API client for the single configured account.
pub struct SpotifyClient {
    client: Client,
    api_base: String,
    auth: Arc<SpotifyAuth>,
}

impl SpotifyClient {
    pub fn new(client: Client, auth: Arc<SpotifyAuth>) -> Self {
        Self {
            client,
            api_base: API_BASE.to_string(),
            auth,
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl PlaybackSource for SpotifyClient {
    async fn current_playback(&self) -> Result<Option<PlaybackSnapshot>> {
        let token = self.auth.access_token().await?;

        let resp = self
            .client
            .get(format!("{}/me/player/currently-playing", self.api_base))
            .bearer_auth(token)
            .send()
            .await?;

        // 204: no active device / session
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Error::from_response("Spotify", resp).await);
        }

        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        let current: CurrentlyPlaying = serde_json::from_str(&body)?;
        current.into_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<Option<PlaybackSnapshot>> {
        serde_json::from_value::<CurrentlyPlaying>(value)
            .unwrap()
            .into_snapshot()
    }

    fn track_json(id: serde_json::Value) -> serde_json::Value {
        json!({
            "id": id,
            "uri": "spotify:local:Artist:Album:Song:200",
            "name": "Song",
            "duration_ms": 200000,
            "artists": [{ "name": "First" }, { "name": "Second" }],
            "album": { "images": [{ "url": "https://i.scdn.co/large" }, { "url": "https://i.scdn.co/small" }] }
        })
    }

    #[test]
    fn test_snapshot_takes_first_artist_and_image() {
        let snapshot = parse(json!({
            "is_playing": true,
            "progress_ms": 1234,
            "item": track_json(json!("4uLU6hMCjMI75M1A2tKUQC"))
        }))
        .unwrap()
        .unwrap();

        assert_eq!(snapshot.track_id.as_str(), "4uLU6hMCjMI75M1A2tKUQC");
        assert_eq!(snapshot.artist_name, "First");
        assert_eq!(snapshot.album_art_url, "https://i.scdn.co/large");
        assert_eq!(snapshot.progress_ms, 1234);
        assert_eq!(snapshot.duration_ms, 200000);
        assert!(snapshot.is_playing);
    }

    #[test]
    fn test_local_file_falls_back_to_uri() {
        let snapshot = parse(json!({ "is_playing": true, "progress_ms": 0, "item": track_json(json!(null)) }))
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.track_id.as_str(), "spotify:local:Artist:Album:Song:200");
    }

    #[test]
    fn test_paused_without_item_is_nothing() {
        assert_eq!(parse(json!({ "is_playing": false, "item": null })).unwrap(), None);
    }

    #[test]
    fn test_playing_without_item_is_an_error() {
        let err = parse(json!({ "is_playing": true, "item": null })).unwrap_err();
        assert!(matches!(err, Error::MissingField(_)));
    }

    #[test]
    fn test_missing_album_art_is_an_error() {
        let mut item = track_json(json!("id"));
        item["album"]["images"] = json!([]);
        let err = parse(json!({ "is_playing": true, "progress_ms": 0, "item": item })).unwrap_err();
        assert!(matches!(err, Error::MissingField("album art")));
    }
}
