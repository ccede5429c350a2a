use clap::Parser;
use std::path::PathBuf;

/// live-lyrics - lyrics for whatever Spotify is playing, live in your browser 🎵
#[derive(Parser, Debug, Default)]
#[command(name = "live-lyrics", version, about)]
pub struct Args {
    /// Port to listen on (overrides PORT, default: 5002)
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Address to bind (default: 127.0.0.1)
    #[arg(long)]
    pub host: Option<String>,

    /// Read settings from this config.toml instead of the default location
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Also write daily-rotated log files into this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Generate default config.toml to stdout
    #[arg(long)]
    pub generate_config: bool,
}
