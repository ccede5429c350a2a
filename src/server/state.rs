use axum::extract::FromRef;
use std::sync::Arc;

use crate::app::NowPlayingService;
use crate::player::SpotifyAuth;

pub type SharedNowPlaying = Arc<NowPlayingService>;

#[derive(Clone)]
pub struct ServerState {
    pub now_playing: SharedNowPlaying,
    /// `None` when the playback side does not go through Spotify OAuth
    pub auth: Option<Arc<SpotifyAuth>>,
    /// Page HTML, rendered once at startup
    pub page: Arc<str>,
}

impl FromRef<ServerState> for SharedNowPlaying {
    fn from_ref(input: &ServerState) -> Self {
        input.now_playing.clone()
    }
}
