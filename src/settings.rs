use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::credentials::Credentials;
use crate::errors::{PlayerError, PlayerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    #[default]
    Light,
}

impl Theme {
    /// ANSI color used for the shell prompt
    pub fn prompt_color(&self) -> &'static str {
        match self {
            Theme::Dark => "\x1b[1;36m",
            Theme::Light => "\x1b[1;34m",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Dark => write!(f, "dark"),
            Theme::Light => write!(f, "light"),
        }
    }
}

impl FromStr for Theme {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(PlayerError::invalid_argument(format!(
                "Unknown theme '{}', expected dark or light",
                other
            ))),
        }
    }
}

/// Locally persisted login and display preferences.
///
/// The password is stored in plaintext, next to the server URL and user name.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub theme: Theme,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("theme", &self.theme)
            .finish()
    }
}

impl Settings {
    /// Reads settings from `path`. A missing file yields the defaults; a file
    /// that exists but cannot be parsed is an error.
    pub fn load(path: &Path) -> PlayerResult<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(settings_error(path, e)),
        };

        serde_json::from_str(&raw).map_err(|e| settings_error(path, e))
    }

    /// Writes pretty JSON to a sibling temp file and renames it over `path`
    pub fn save(&self, path: &Path) -> PlayerResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| settings_error(path, e))?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| settings_error(path, e))?;
        let tmp = temp_path(path);
        std::fs::write(&tmp, json).map_err(|e| settings_error(path, e))?;
        std::fs::rename(&tmp, path).map_err(|e| settings_error(path, e))?;

        info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Saved credentials, if all three fields are present
    pub fn credentials(&self) -> Option<Credentials> {
        if self.server_url.is_empty() || self.username.is_empty() || self.password.is_empty() {
            return None;
        }
        Some(Credentials::new(&self.server_url, &self.username, &self.password))
    }

    pub fn remember(&mut self, credentials: &Credentials) {
        self.server_url = credentials.server_url.clone();
        self.username = credentials.username.clone();
        self.password = credentials.password.clone();
    }

    /// Drops the secret but keeps the server URL and user name as a prefill
    pub fn forget_password(&mut self) {
        self.password.clear();
    }

    /// Drops user name and password; the server URL stays as a prefill
    pub fn forget_credentials(&mut self) {
        self.username.clear();
        self.password.clear();
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "settings".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn settings_error(path: &Path, e: impl fmt::Display) -> PlayerError {
    PlayerError::Settings {
        path: path.display().to_string(),
        details: e.to_string(),
    }
}
