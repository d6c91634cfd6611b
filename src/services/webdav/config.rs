use std::time::Duration;

use crate::credentials::Credentials;
use crate::errors::PlayerResult;

/// Path template of the Nextcloud files endpoint, relative to the server root
pub const NEXTCLOUD_FILES_PATH: &str = "remote.php/dav/files";

/// Default request timeout; a slow server blocks the shell until it fires
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// WebDAV server configuration
#[derive(Debug, Clone)]
pub struct WebDAVConfig {
    pub credentials: Credentials,
    pub timeout_seconds: u64,
}

impl WebDAVConfig {
    /// Creates a new WebDAV configuration
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> PlayerResult<()> {
        self.credentials.validate()
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    pub fn password(&self) -> &str {
        &self.credentials.password
    }

    /// Returns the base URL of the user's files, without trailing slash.
    /// Looks like: "https://cloud.example.com/remote.php/dav/files/alice"
    pub fn webdav_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.credentials.server_url.trim_end_matches('/'),
            NEXTCLOUD_FILES_PATH,
            urlencoding::encode(&self.credentials.username)
        )
    }

    /// Gets the timeout duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webdav_url_encodes_username() {
        let config = WebDAVConfig::new(Credentials::new(
            "https://cloud.example.com/",
            "john doe@example.com",
            "pw",
        ));
        assert_eq!(
            config.webdav_url(),
            "https://cloud.example.com/remote.php/dav/files/john%20doe%40example.com"
        );
    }

    #[test]
    fn test_webdav_url_without_trailing_slash() {
        let config =
            WebDAVConfig::new(Credentials::new("https://cloud.example.com", "alice", "pw"));
        assert_eq!(config.webdav_url(), "https://cloud.example.com/remote.php/dav/files/alice");
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }
}
