use crate::player::TrackId;

/// Remembers the lyrics of the last track seen, and nothing else.
///
/// One slot is enough: there is only one "now playing" per process. A new
/// track identity overwrites the slot wholesale; nothing else evicts it.
#[derive(Debug, Default)]
pub struct LyricsCache {
    entry: Option<CacheEntry>,
}

#[derive(Debug)]
struct CacheEntry {
    track_id: TrackId,
    lines: Vec<String>,
}

impl LyricsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines for `track_id`, if it is the track in the slot.
    pub fn lookup(&self, track_id: &TrackId) -> Option<&[String]> {
        self.entry
            .as_ref()
            .filter(|e| &e.track_id == track_id)
            .map(|e| e.lines.as_slice())
    }

    pub fn store(&mut self, track_id: TrackId, lines: Vec<String>) {
        self.entry = Some(CacheEntry { track_id, lines });
    }

    pub fn current_track(&self) -> Option<&TrackId> {
        self.entry.as_ref().map(|e| &e.track_id)
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }
}
