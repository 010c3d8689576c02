//! Runtime configuration from CLI flags and environment.

use std::env;
use std::path::PathBuf;

use clap::Parser;

/// crate-server - self-hosted music library cataloger
#[derive(Parser, Debug, Default)]
#[command(name = "crate-server")]
#[command(about = "Catalogs a music library and reconciles it against MusicBrainz")]
pub struct Args {
    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on (falls back to PORT, then 4000)
    #[arg(long)]
    pub port: Option<u16>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Data directory for the embedded database (falls back to DATA_DIR,
    /// then /data)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Music library mount (falls back to MUSIC_DIR, then /music)
    #[arg(long)]
    pub music_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub data_dir: PathBuf,
    pub music_dir: PathBuf,
    pub version: String,
    pub git_sha: Option<String>,
}

impl Config {
    /// Flags beat environment variables beat defaults. APP_VERSION and
    /// GIT_SHA override what the binary reports about itself.
    pub fn resolve(args: Args) -> Self {
        let port = args
            .port
            .or_else(|| env::var("PORT").ok().and_then(|p| p.parse().ok()))
            .unwrap_or(4000);
        let data_dir = args
            .data_dir
            .or_else(|| env::var("DATA_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("/data"));
        let music_dir = args
            .music_dir
            .or_else(|| env::var("MUSIC_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("/music"));
        let version =
            env::var("APP_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());
        let git_sha = env::var("GIT_SHA").ok();

        Self {
            host: args.host,
            port,
            debug: args.debug,
            data_dir,
            music_dir,
            version,
            git_sha,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("crate.db")
    }
}
