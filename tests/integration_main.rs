use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use live_lyrics::app::now_playing::{LYRICS_NOT_FOUND, NOT_PLAYING_MESSAGE};
use live_lyrics::app::{NowPlayingService, PollResponse};
use live_lyrics::artwork::ArtworkSource;
use live_lyrics::lyrics::LyricsSource;
use live_lyrics::player::{PlaybackSnapshot, PlaybackSource, TrackId};
use live_lyrics::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct FakePlayback {
    current: Mutex<Option<PlaybackSnapshot>>,
}

impl FakePlayback {
    fn set(&self, snapshot: Option<PlaybackSnapshot>) {
        *self.current.lock().unwrap() = snapshot;
    }
}

#[async_trait]
impl PlaybackSource for FakePlayback {
    async fn current_playback(&self) -> Result<Option<PlaybackSnapshot>> {
        Ok(self.current.lock().unwrap().clone())
    }
}

/// Lyrics keyed by title; counts every lookup.
#[derive(Default)]
struct FakeLyrics {
    by_title: Mutex<HashMap<String, Option<String>>>,
    calls: AtomicUsize,
    titles_asked: Mutex<Vec<String>>,
    fail: AtomicBool,
    delay: Option<Duration>,
}

impl FakeLyrics {
    fn with(self, title: &str, text: Option<&str>) -> Self {
        self.by_title
            .lock()
            .unwrap()
            .insert(title.to_string(), text.map(str::to_string));
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LyricsSource for FakeLyrics {
    async fn search_lyrics(&self, title: &str, _artist: &str) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.titles_asked.lock().unwrap().push(title.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Api {
                service: "Genius",
                status: 503,
                message: "Service Unavailable".into(),
            });
        }
        Ok(self.by_title.lock().unwrap().get(title).cloned().flatten())
    }
}

#[derive(Default)]
struct FakeArtwork {
    fail: AtomicBool,
    fetches: AtomicUsize,
}

#[async_trait]
impl ArtworkSource for FakeArtwork {
    async fn fetch_image(&self, _url: &str) -> Result<DynamicImage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Api {
                service: "Artwork",
                status: 404,
                message: "Not Found".into(),
            });
        }
        let img = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        Ok(DynamicImage::ImageRgba8(img))
    }
}

fn track(id: &str, title: &str) -> PlaybackSnapshot {
    PlaybackSnapshot {
        track_id: TrackId::new(id),
        track_name: title.to_string(),
        artist_name: "Artist".to_string(),
        album_art_url: format!("https://img.example/{}.jpg", id),
        duration_ms: 10000,
        progress_ms: 5000,
        is_playing: true,
    }
}

struct Harness {
    playback: Arc<FakePlayback>,
    lyrics: Arc<FakeLyrics>,
    artwork: Arc<FakeArtwork>,
    service: NowPlayingService,
}

fn harness(lyrics: FakeLyrics) -> Harness {
    let playback = Arc::new(FakePlayback::default());
    let lyrics = Arc::new(lyrics);
    let artwork = Arc::new(FakeArtwork::default());
    let service = NowPlayingService::new(playback.clone(), lyrics.clone(), artwork.clone(), 1);
    Harness {
        playback,
        lyrics,
        artwork,
        service,
    }
}

fn playing(response: PollResponse) -> live_lyrics::app::NowPlaying {
    match response {
        PollResponse::Playing(now) => now,
        PollResponse::Error { error } => panic!("expected a track, got error: {}", error),
    }
}

#[tokio::test]
async fn test_nothing_playing_returns_only_error_and_keeps_cache() {
    let h = harness(FakeLyrics::default().with("Song A", Some("Header\nla la")));

    // No session at all
    let response = h.service.poll().await;
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        serde_json::json!({ "error": NOT_PLAYING_MESSAGE })
    );
    assert_eq!(h.service.cached_track().await, None);

    // Fill the cache, then pause
    h.playback.set(Some(track("a", "Song A")));
    playing(h.service.poll().await);

    let mut paused = track("b", "Song B");
    paused.is_playing = false;
    h.playback.set(Some(paused));

    let response = h.service.poll().await;
    assert_eq!(response, PollResponse::error(NOT_PLAYING_MESSAGE));
    assert_eq!(h.service.cached_track().await, Some(TrackId::new("a")));
    assert_eq!(h.lyrics.calls(), 1);
}

#[tokio::test]
async fn test_same_track_fetches_lyrics_once() {
    let h = harness(FakeLyrics::default().with("Song A", Some("Header\nfirst\nsecond")));
    h.playback.set(Some(track("a", "Song A")));

    let first = playing(h.service.poll().await);
    let second = playing(h.service.poll().await);

    assert_eq!(h.lyrics.calls(), 1);
    assert_eq!(first.lyrics, vec!["first", "second"]);
    assert_eq!(second.lyrics, first.lyrics);
}

#[tokio::test]
async fn test_track_change_refetches_for_new_track() {
    let h = harness(
        FakeLyrics::default()
            .with("Song A", Some("Header\nfrom a"))
            .with("Song B", Some("Header\nfrom b")),
    );

    h.playback.set(Some(track("a", "Song A")));
    playing(h.service.poll().await);

    h.playback.set(Some(track("b", "Song B")));
    let now = playing(h.service.poll().await);

    assert_eq!(now.lyrics, vec!["from b"]);
    assert_eq!(h.lyrics.calls(), 2);
    assert_eq!(*h.lyrics.titles_asked.lock().unwrap(), vec!["Song A", "Song B"]);
    assert_eq!(h.service.cached_track().await, Some(TrackId::new("b")));
}

#[tokio::test]
async fn test_first_line_dropped_order_kept() {
    let body = "Song A Lyrics\n  one \ntwo\n\nthree\nfour";
    let h = harness(FakeLyrics::default().with("Song A", Some(body)));
    h.playback.set(Some(track("a", "Song A")));

    let now = playing(h.service.poll().await);
    assert_eq!(now.lyrics, vec!["one", "two", "three", "four"]);
}

#[tokio::test]
async fn test_missing_lyrics_cache_the_sentinel() {
    let h = harness(FakeLyrics::default().with("Song A", None));
    h.playback.set(Some(track("a", "Song A")));

    let first = playing(h.service.poll().await);
    let second = playing(h.service.poll().await);

    assert_eq!(first.lyrics, vec![LYRICS_NOT_FOUND]);
    assert_eq!(second.lyrics, vec![LYRICS_NOT_FOUND]);
    assert_eq!(h.lyrics.calls(), 1);
}

#[tokio::test]
async fn test_blank_lyrics_count_as_missing() {
    let h = harness(FakeLyrics::default().with("Song A", Some("  \n ")));
    h.playback.set(Some(track("a", "Song A")));

    let now = playing(h.service.poll().await);
    assert_eq!(now.lyrics, vec![LYRICS_NOT_FOUND]);
}

#[tokio::test]
async fn test_response_fields_and_highlighted_line() {
    let body = format!("Header\n{}", (0..10).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n"));
    let h = harness(FakeLyrics::default().with("Song A", Some(&body)));
    h.playback.set(Some(track("a", "Song A")));

    let now = playing(h.service.poll().await);
    assert_eq!(now.track_name, "Song A");
    assert_eq!(now.artist_name, "Artist");
    assert_eq!(now.album_image_url, "https://img.example/a.jpg");
    assert_eq!(now.duration_ms, 10000);
    assert_eq!(now.progress_ms, 5000);
    assert_eq!(now.dominant_color, "rgb(252, 4, 4)");
    assert_eq!(now.lyrics.len(), 10);
    assert_eq!(now.highlighted_line(), Some(5));
    assert_eq!(now.lyrics[5], "line 5");
}

#[tokio::test]
async fn test_artwork_failure_fails_whole_poll() {
    let h = harness(FakeLyrics::default().with("Song A", Some("Header\nla")));
    h.artwork.fail.store(true, Ordering::SeqCst);
    h.playback.set(Some(track("a", "Song A")));

    let response = h.service.poll().await;
    let json = serde_json::to_value(&response).unwrap();
    let object = json.as_object().unwrap();
    assert_eq!(object.len(), 1);
    assert!(object["error"].as_str().unwrap().contains("404"));

    // Color comes first, so the cache was never touched
    assert_eq!(h.lyrics.calls(), 0);
    assert_eq!(h.service.cached_track().await, None);
}

#[tokio::test]
async fn test_lyrics_failure_is_retried_next_poll() {
    let h = harness(FakeLyrics::default().with("Song A", Some("Header\nla")));
    h.lyrics.fail.store(true, Ordering::SeqCst);
    h.playback.set(Some(track("a", "Song A")));

    assert!(h.service.poll().await.is_error());
    assert_eq!(h.service.cached_track().await, None);

    h.lyrics.fail.store(false, Ordering::SeqCst);
    let now = playing(h.service.poll().await);
    assert_eq!(now.lyrics, vec!["la"]);
    assert_eq!(h.lyrics.calls(), 2);
}

#[tokio::test]
async fn test_each_poll_starts_fresh_after_error() {
    let h = harness(FakeLyrics::default().with("Song A", Some("Header\nla")));
    h.playback.set(Some(track("a", "Song A")));

    h.artwork.fail.store(true, Ordering::SeqCst);
    assert!(h.service.poll().await.is_error());

    h.artwork.fail.store(false, Ordering::SeqCst);
    assert!(!h.service.poll().await.is_error());
    assert_eq!(h.artwork.fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_polls_of_new_track_fetch_once() {
    let lyrics = FakeLyrics {
        delay: Some(Duration::from_millis(50)),
        ..FakeLyrics::default()
    }
    .with("Song A", Some("Header\nonly once"));
    let h = harness(lyrics);
    h.playback.set(Some(track("a", "Song A")));

    let (first, second) = tokio::join!(h.service.poll(), h.service.poll());

    assert_eq!(playing(first).lyrics, vec!["only once"]);
    assert_eq!(playing(second).lyrics, vec!["only once"]);
    assert_eq!(h.lyrics.calls(), 1);
}
