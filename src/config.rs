//! Tool configuration, persisted as TOML under the user's config directory.
//!
//! The core consumes this surface read-only; the only mutations are the
//! watch-list edits, which write back through [`Config::persist`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NugsError, Result};
use crate::model::MediaType;

/// Fallback watch cadence when `watch_interval` is absent or unparsable.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(3600);

fn default_rclone_binary() -> String {
    "rclone".to_string()
}

fn default_rclone_transfers() -> u32 {
    4
}

fn default_watch_interval() -> String {
    "1h".to_string()
}

/// Read-mostly settings consumed by the mirror core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local base directory for audio shows.
    pub out_path: PathBuf,
    /// Local base directory for video shows; falls back to `out_path`.
    pub video_out_path: Option<PathBuf>,
    /// Media tier assumed when a command passes no explicit filter:
    /// "audio", "video" or "both".
    pub default_outputs: String,
    pub rclone_enabled: bool,
    pub rclone_binary: String,
    pub rclone_remote: String,
    pub rclone_path: String,
    pub rclone_video_path: String,
    pub rclone_transfers: u32,
    pub delete_after_upload: bool,
    /// Ordered artist IDs checked by the watch orchestrator. No duplicates.
    pub watched_artists: Vec<String>,
    /// Pause between watch cycles in daemon mode, e.g. "1h" or "30m".
    pub watch_interval: String,
    pub gotify_url: String,
    pub gotify_token: String,
    pub api_base: String,
    pub api_token: String,
    /// External program invoked per container to fetch media.
    pub downloader_command: String,

    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            out_path: PathBuf::from("."),
            video_out_path: None,
            default_outputs: String::new(),
            rclone_enabled: false,
            rclone_binary: default_rclone_binary(),
            rclone_remote: String::new(),
            rclone_path: String::new(),
            rclone_video_path: String::new(),
            rclone_transfers: default_rclone_transfers(),
            delete_after_upload: false,
            watched_artists: Vec::new(),
            watch_interval: default_watch_interval(),
            gotify_url: String::new(),
            gotify_token: String::new(),
            api_base: "https://streamapi.nugs.net".to_string(),
            api_token: String::new(),
            downloader_command: String::new(),
            path: None,
        }
    }
}

impl Config {
    /// Loads configuration from `explicit`, `$NUGS_CONFIG`, or the default
    /// location. A missing file yields defaults; a malformed one is an error.
    pub fn load(explicit: Option<PathBuf>) -> Result<Config> {
        let path = explicit
            .or_else(|| std::env::var_os("NUGS_CONFIG").map(PathBuf::from))
            .or_else(default_config_path);
        let mut cfg = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            _ => Config::default(),
        };
        cfg.path = path;
        Ok(cfg)
    }

    /// Re-reads the configuration from its backing file, picking up
    /// watch-list edits made by other processes.
    pub fn reload(&self) -> Result<Config> {
        Config::load(self.path.clone())
    }

    /// Writes the configuration back to the path it was loaded from.
    pub fn persist(&self) -> Result<PathBuf> {
        let target = self
            .path
            .clone()
            .or_else(default_config_path)
            .ok_or_else(|| {
                NugsError::Config("no config path; pass --config or set NUGS_CONFIG".into())
            })?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = toml::to_string_pretty(self)
            .map_err(|err| NugsError::Config(format!("serialize config: {err}")))?;
        fs::write(&target, serialized)?;
        Ok(target)
    }

    /// Local base directory for the video tier.
    pub fn video_base(&self) -> &Path {
        self.video_out_path.as_deref().unwrap_or(&self.out_path)
    }

    /// The media filter implied by `default_outputs`.
    pub fn default_media(&self) -> MediaType {
        MediaType::parse(&self.default_outputs)
    }

    /// Watch cadence; malformed values fall back to one hour with a warning.
    pub fn watch_interval(&self) -> Duration {
        match humantime::parse_duration(&self.watch_interval) {
            Ok(interval) => interval,
            Err(err) => {
                tracing::warn!(
                    value = %self.watch_interval,
                    %err,
                    "unparsable watch_interval, using 1h"
                );
                DEFAULT_WATCH_INTERVAL
            }
        }
    }

    /// Appends an artist to the watch list. Duplicates are forbidden.
    pub fn add_watched(&mut self, artist_id: &str) -> Result<()> {
        let artist_id = artist_id.trim();
        if artist_id.is_empty() {
            return Err(NugsError::InvalidArgument("empty artist id".into()));
        }
        if self.watched_artists.iter().any(|id| id == artist_id) {
            return Err(NugsError::InvalidArgument(format!(
                "artist {artist_id} is already watched"
            )));
        }
        self.watched_artists.push(artist_id.to_string());
        Ok(())
    }

    /// Removes an artist from the watch list, preserving order.
    pub fn remove_watched(&mut self, artist_id: &str) -> Result<()> {
        let before = self.watched_artists.len();
        self.watched_artists.retain(|id| id != artist_id.trim());
        if self.watched_artists.len() == before {
            return Err(NugsError::InvalidArgument(format!(
                "artist {artist_id} is not watched"
            )));
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    toml::from_str(&contents)
        .map_err(|err| NugsError::Config(format!("parse {}: {err}", path.display())))
}

/// `~/.config/nugs/config.toml` (per-OS config dir convention).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("nugs").join("config.toml"))
}
