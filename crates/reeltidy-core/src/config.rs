use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scan::MEGABYTE;

const DEFAULT_CONFIG: &str = include_str!("../default.toml");

/// Environment variable that overrides `lookup.tmdb_api_key`.
pub const TMDB_KEY_ENV: &str = "TMDB_API_KEY";

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub scan: ScanSettings,
    pub lookup: LookupSettings,
    pub http: HttpSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    pub min_video_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupSettings {
    pub tmdb_api_key: String,
    pub language: String,
    pub max_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Settings {
    /// Load settings: `path` if given (must exist), else the user config file
    /// if present. Keys missing from the file keep their built-in value.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::config_path().filter(|p| p.exists()),
        };
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                Self::from_toml(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
            }
            None => Self::from_toml(""),
        }
    }

    /// Parse `text` layered over the built-in defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        let mut merged: toml::Table = toml::from_str(DEFAULT_CONFIG).map_err(|e| Error::Config(e.to_string()))?;
        let user: toml::Table = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        merge(&mut merged, user);
        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| Error::Config(e.to_string()))
    }

    /// Path to the user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "reeltidy").map(|d| d.config_dir().join("config.toml"))
    }

    pub fn min_video_bytes(&self) -> u64 {
        self.scan.min_video_mb.saturating_mul(MEGABYTE)
    }

    /// TMDB credential from the environment, else from the file. None if unset.
    pub fn tmdb_credential(&self) -> Option<String> {
        std::env::var(TMDB_KEY_ENV)
            .ok()
            .or_else(|| Some(self.lookup.tmdb_api_key.clone()))
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

impl Default for Settings {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

/// Overlay `overlay` onto `base`, table by table.
fn merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(nested) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge(existing, nested);
                continue;
            }
            base.insert(key, toml::Value::Table(nested));
        } else {
            base.insert(key, value);
        }
    }
}
