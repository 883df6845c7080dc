use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{bslog_debug, Error, Result};

fn default_refresh() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Refetch the project's boards after a confirmed update/delete/reorder.
    #[serde(default = "default_refresh")]
    pub refresh_after_mutation: bool,
    /// JSON file backing the memory store used by the CLI.
    pub data_file: Option<String>,
    /// Artificial latency added to every memory-store request.
    pub latency_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_after_mutation: true,
            data_file: None,
            latency_ms: None,
        }
    }
}

impl Config {
    pub fn app_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".boardsync"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::app_dir()?.join("boardsync.toml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        match &self.data_file {
            Some(file) => Ok(expand_tilde(file)),
            None => Ok(Self::app_dir()?.join("boards.json")),
        }
    }

    pub fn latency(&self) -> Option<Duration> {
        self.latency_ms.map(Duration::from_millis)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        bslog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            bslog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        bslog_debug!(
            "Config loaded: refresh_after_mutation={}, data_file={:?}, latency_ms={:?}",
            config.refresh_after_mutation,
            config.data_file,
            config.latency_ms
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        bslog_debug!("Config saved to {}", path.display());
        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
