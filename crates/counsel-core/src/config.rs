//! Client configuration.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. `config.json` in the config directory (every field optional)
//! 2. Environment: `COUNSEL_BACKEND_URL`, `COUNSEL_DATA_DIR`
//! 3. Command-line flags, applied by the binary
//!
//! ```json
//! {
//!   "backend": "public",
//!   "typewriter": true,
//!   "reveal_interval_ms": 30,
//!   "audio_player": "mpv --really-quiet",
//!   "follow_ups": [
//!     { "label": "More cases", "type": "prompt", "text": "Show three more similar cases." }
//!   ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths;
use crate::prompts::{default_follow_ups, FollowUp, FollowUpAction};
use crate::view::{ViewSettings, FALLBACK_MESSAGE};

pub const LOCAL_BACKEND_URL: &str = "http://127.0.0.1:8000";
pub const PUBLIC_BACKEND_URL: &str = "https://ai-helper-mvp.onrender.com";

pub const ENV_BACKEND_URL: &str = "COUNSEL_BACKEND_URL";
pub const ENV_DATA_DIR: &str = "COUNSEL_DATA_DIR";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown backend '{0}' (expected 'local', 'public' or an http(s) URL)")]
    UnknownBackend(String),

    #[error("Invalid setting: {0}")]
    Invalid(String),

    #[error("Cannot locate config directory: {0}")]
    NoConfigDir(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `local`, `public`, or a base URL.
    pub backend: String,
    /// Backend for speech synthesis; the chat backend when unset.
    pub speech_backend: Option<String>,
    pub request_timeout_secs: u64,
    pub typewriter: bool,
    pub reveal_interval_ms: u64,
    pub fallback_message: String,
    pub data_dir: Option<PathBuf>,
    /// External player command line; see [`crate::launcher::player_command`].
    pub audio_player: Option<String>,
    /// File receiving every backend request and response.
    pub transcript_log: Option<PathBuf>,
    pub follow_ups: Vec<FollowUp>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: "local".to_string(),
            speech_backend: None,
            request_timeout_secs: 120,
            typewriter: true,
            reveal_interval_ms: 30,
            fallback_message: FALLBACK_MESSAGE.to_string(),
            data_dir: None,
            audio_player: None,
            transcript_log: None,
            follow_ups: default_follow_ups(),
        }
    }
}

impl Config {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load from the default location.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::default_config_file().map_err(ConfigError::NoConfigDir)?;
        Self::load(&path)
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.trim().is_empty()) {
            self.backend = url;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        resolve_backend(&self.backend)?;
        if let Some(speech) = &self.speech_backend {
            resolve_backend(speech)?;
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.reveal_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "reveal_interval_ms must be positive".to_string(),
            ));
        }
        for follow_up in &self.follow_ups {
            if follow_up.label.trim().is_empty() {
                return Err(ConfigError::Invalid("follow-up label is empty".to_string()));
            }
            if let FollowUpAction::Prompt { text } = &follow_up.action {
                if text.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "follow-up '{}' has an empty prompt",
                        follow_up.label
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn backend_url(&self) -> Result<String, ConfigError> {
        resolve_backend(&self.backend)
    }

    pub fn speech_backend_url(&self) -> Result<String, ConfigError> {
        resolve_backend(self.speech_backend.as_deref().unwrap_or(&self.backend))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::default_data_dir().map_err(ConfigError::NoConfigDir),
        }
    }

    pub fn view_settings(&self) -> ViewSettings {
        ViewSettings {
            typewriter: self.typewriter,
            reveal_interval: Duration::from_millis(self.reveal_interval_ms),
            fallback_message: self.fallback_message.clone(),
            follow_ups: self.follow_ups.clone(),
        }
    }
}

/// Turn a backend name or URL into a base URL without a trailing slash.
pub fn resolve_backend(name: &str) -> Result<String, ConfigError> {
    let name = name.trim();
    match name {
        "local" => Ok(LOCAL_BACKEND_URL.to_string()),
        "public" => Ok(PUBLIC_BACKEND_URL.to_string()),
        url if url.starts_with("http://") || url.starts_with("https://") => {
            Ok(url.trim_end_matches('/').to_string())
        }
        other => Err(ConfigError::UnknownBackend(other.to_string())),
    }
}
