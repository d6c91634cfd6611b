use anyhow::Result;
use std::env;
use std::path::PathBuf;

use crate::services::webdav::config::DEFAULT_TIMEOUT_SECONDS;

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub settings_path: PathBuf,
    pub timeout_seconds: u64,
    pub player_command: String,
    pub log_dir: PathBuf,
    /// Loopback port of the media proxy, 0 picks a free one
    pub proxy_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings_path: PathBuf::from("config.json"),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            player_command: "mpv".to_string(),
            log_dir: PathBuf::from("."),
            proxy_port: 0,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Config::default();

        let timeout_seconds = match env::var("DAVPLAY_TIMEOUT_SECONDS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|e| {
                    anyhow::anyhow!("DAVPLAY_TIMEOUT_SECONDS '{}' is not a number: {}", raw, e)
                })?,
            Err(_) => defaults.timeout_seconds,
        };
        let proxy_port = match env::var("DAVPLAY_PROXY_PORT") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("DAVPLAY_PROXY_PORT '{}' is not a port: {}", raw, e))?,
            Err(_) => defaults.proxy_port,
        };

        Ok(Config {
            settings_path: env::var("DAVPLAY_SETTINGS")
                .map(PathBuf::from)
                .unwrap_or(defaults.settings_path),
            timeout_seconds,
            player_command: env::var("DAVPLAY_PLAYER").unwrap_or(defaults.player_command),
            log_dir: env::var("DAVPLAY_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            proxy_port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.settings_path, PathBuf::from("config.json"));
        assert_eq!(config.timeout_seconds, 30);
        assert_eq!(config.player_command, "mpv");
        assert_eq!(config.proxy_port, 0);
    }
}
