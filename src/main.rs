use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use live_lyrics::app::{Args, NowPlayingService};
use live_lyrics::artwork::ArtworkFetcher;
use live_lyrics::config::{load_env_file, AppConfig, DOTENV_FILE};
use live_lyrics::logging;
use live_lyrics::lyrics::GeniusFetcher;
use live_lyrics::player::{SpotifyAuth, SpotifyClient};
use live_lyrics::server::{self, ServerState};

#[tokio::main]
async fn main() -> Result<()> {
    human_panic::setup_panic!();
    let args = Args::parse();

    if args.generate_config {
        print!("{}", AppConfig::default().to_toml_string()?);
        return Ok(());
    }

    // .env sits below the real environment
    let dotenv_loaded = load_env_file(Path::new(DOTENV_FILE))?;
    let config = AppConfig::load(&args).context("Failed to load configuration")?;
    let _log_guard = logging::init(&config.log_level, config.log_dir.as_deref())?;
    if dotenv_loaded {
        debug!("Loaded variables from {}", DOTENV_FILE);
    }
    config.validate().context("Incomplete configuration")?;

    // One HTTP client for all three providers
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .user_agent(concat!("live-lyrics/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    // 1. Spotify 🎧
    let client_id = config.spotify.client_id.clone().context("SPOTIPY_CLIENT_ID is not set")?;
    let client_secret = config
        .spotify
        .client_secret
        .clone()
        .context("SPOTIPY_CLIENT_SECRET is not set")?;
    let mut auth = SpotifyAuth::new(client.clone(), client_id, client_secret, config.redirect_uri());
    if let Some(refresh_token) = config.spotify.refresh_token.clone() {
        auth = auth.with_refresh_token(refresh_token);
    }
    let auth = Arc::new(auth);
    let playback = SpotifyClient::new(client.clone(), auth.clone());

    // 2. Genius 📝
    let genius_token = config.genius.token.clone().context("GENIUS_TOKEN is not set")?;
    let lyrics = GeniusFetcher::new(client.clone(), genius_token);

    // 3. Album art 🎨
    let artwork = ArtworkFetcher::new(client);

    let service = NowPlayingService::new(
        Arc::new(playback),
        Arc::new(lyrics),
        Arc::new(artwork),
        config.color_quality,
    );

    if !auth.is_connected().await {
        warn!(
            "Spotify is not connected yet: open http://{}:{}/login (redirect URI {})",
            config.host,
            config.port,
            auth.redirect_uri()
        );
    }

    let state = ServerState {
        now_playing: Arc::new(service),
        auth: Some(auth),
        page: server::render_page(config.poll_interval_ms).into(),
    };

    info!(port = config.port, "Starting live-lyrics");
    server::run_server(&config.host, config.port, state).await?;
    Ok(())
}
