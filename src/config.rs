use crate::app::Args;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 5002;
pub const DOTENV_FILE: &str = ".env";

/// Load `KEY=value` pairs from `path` into the process environment.
/// Variables that are already set keep their value. Returns `false` when
/// there is no such file.
pub fn load_env_file(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(Error::config(format!("{}: {}", path.display(), e))),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotifyConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Defaults to this server's `/callback`
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Skip the browser login by starting from a known refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeniusConfig {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// How often the page polls `/now_playing`
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Pixel sampling step for the dominant color, 1 = every pixel
    #[serde(default = "default_color_quality")]
    pub color_quality: u32,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub genius: GeniusConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_color_quality() -> u32 {
    1
}

fn default_http_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            poll_interval_ms: default_poll_interval(),
            color_quality: default_color_quality(),
            http_timeout_secs: default_http_timeout(),
            log_level: default_log_level(),
            log_dir: None,
            spotify: SpotifyConfig::default(),
            genius: GeniusConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn get_config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("live-lyrics");
        path.push("config.toml");
        path
    }

    /// Defaults, then the config file, then the environment, then `args`.
    pub fn load(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Self::get_config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_args(args);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Overlay the process environment; `lookup` is `std::env::var` outside tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("GENIUS_TOKEN") {
            self.genius.token = Some(token);
        }
        if let Some(id) = get("SPOTIPY_CLIENT_ID") {
            self.spotify.client_id = Some(id);
        }
        if let Some(secret) = get("SPOTIPY_CLIENT_SECRET") {
            self.spotify.client_secret = Some(secret);
        }
        if let Some(uri) = get("SPOTIPY_REDIRECT_URI") {
            self.spotify.redirect_uri = Some(uri);
        }
        if let Some(token) = get("SPOTIPY_REFRESH_TOKEN") {
            self.spotify.refresh_token = Some(token);
        }
        if let Some(port) = get("PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| Error::config(format!("PORT is not a valid port: {:?}", port)))?;
        }
        Ok(())
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(host) = &args.host {
            self.host = host.clone();
        }
        if let Some(dir) = &args.log_dir {
            self.log_dir = Some(dir.clone());
        }
    }

    pub fn redirect_uri(&self) -> String {
        self.spotify
            .redirect_uri
            .clone()
            .unwrap_or_else(|| format!("http://127.0.0.1:{}/callback", self.port))
    }

    /// Fail early on settings every poll would trip over.
    pub fn validate(&self) -> Result<()> {
        let missing = [
            ("GENIUS_TOKEN", self.genius.token.is_none()),
            ("SPOTIPY_CLIENT_ID", self.spotify.client_id.is_none()),
            ("SPOTIPY_CLIENT_SECRET", self.spotify.client_secret.is_none()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| name)
        .collect::<Vec<_>>();

        if !missing.is_empty() {
            return Err(Error::config(format!("missing {}", missing.join(", "))));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::config("poll_interval_ms must be positive"));
        }
        Ok(())
    }
}
