//! Well-known filesystem locations.
//!
//! ```text
//! ~/.config/counsel/              ($XDG_CONFIG_HOME/counsel when set)
//! ├── config.json                 # Optional settings
//! ├── transcript.log              # Backend traffic, when enabled
//! └── sessions/
//!     └── <session-id>/
//!         └── chatHistory.json    # Serialized conversation
//! ```

use std::env;
use std::path::PathBuf;

const APP_DIR: &str = "counsel";

/// Return the user's home directory path.
///
/// Uses HOME on Unix-like systems and USERPROFILE on Windows.
pub fn get_home_dir() -> Result<String, String> {
    for var in ["HOME", "USERPROFILE"] {
        if let Ok(value) = env::var(var) {
            if !value.is_empty() {
                return Ok(value);
            }
        }
    }

    Err("Home directory not set".to_string())
}

/// Directory holding the config file and, by default, all session data.
pub fn config_dir() -> Result<PathBuf, String> {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Ok(PathBuf::from(xdg).join(APP_DIR));
        }
    }
    Ok(PathBuf::from(get_home_dir()?).join(".config").join(APP_DIR))
}

pub fn default_config_file() -> Result<PathBuf, String> {
    Ok(config_dir()?.join("config.json"))
}

pub fn default_data_dir() -> Result<PathBuf, String> {
    config_dir()
}
