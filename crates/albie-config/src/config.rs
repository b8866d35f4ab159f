/// Application configuration: load, save and sanitize.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Lowest and highest accepted checkpoint depth.
const MIN_HISTORY: usize = 1;
const MAX_HISTORY: usize = 1000;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Max checkpoints kept per editing session, baseline included.
    pub max_history: usize,
    /// Whether session histories are written to disk between requests.
    pub persist_history: bool,
    /// Directory for the history database. Empty = default location.
    pub data_dir: String,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_history: 50,
            persist_history: true,
            data_dir: String::new(),
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Returns the config file path: exe directory + `albie.json`.
    pub fn config_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.join("albie.json")))
            .unwrap_or_else(|| PathBuf::from("albie.json"))
    }

    /// Loads config from `path`, creating a default file if it doesn't exist.
    /// Returns defaults on any error (missing file, parse error, etc.).
    pub fn load_or_create(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
                    Ok(mut config) => {
                        config.sanitize();
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {}: {e}", path.display());
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {}: {e}", path.display());
                }
            }
            // Return defaults on error (don't overwrite broken file)
            Self::default()
        } else {
            let config = Self::default();
            if let Err(e) = config.save(path) {
                tracing::warn!("Failed to create default config at {}: {e}", path.display());
            }
            config
        }
    }

    /// Saves config to `path` as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Returns the configured history directory, if any.
    ///
    /// A leading `~/` expands to the user's home directory.
    pub fn resolve_data_dir(&self) -> Option<PathBuf> {
        let raw = self.data_dir.trim();
        if raw.is_empty() {
            return None;
        }
        if let Some(rest) = raw.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return Some(home.join(rest));
            }
        }
        Some(PathBuf::from(raw))
    }

    /// Clamps values to valid ranges and resets invalid fields.
    pub fn sanitize(&mut self) {
        self.max_history = self.max_history.clamp(MIN_HISTORY, MAX_HISTORY);
        if self.log_filter.trim().is_empty() {
            self.log_filter = "info".to_string();
        }
    }
}
