use url::Url;

use super::config::{WebDAVConfig, NEXTCLOUD_FILES_PATH};
use crate::errors::{PlayerError, PlayerResult};

/// Centralized URL and path management for WebDAV operations
///
/// Converts between the decoded relative paths used by the tree and the
/// percent-encoded URLs and hrefs spoken on the wire.
#[derive(Debug, Clone)]
pub struct WebDAVUrlManager {
    base_url: String,
    /// Decoded path component of `base_url`, with trailing slash
    base_path: String,
    username: String,
}

impl WebDAVUrlManager {
    pub fn new(config: &WebDAVConfig) -> PlayerResult<Self> {
        let base_url = config.webdav_url();
        let parsed = Url::parse(&base_url)
            .map_err(|e| PlayerError::invalid_argument(format!("Invalid server URL: {}", e)))?;

        let base_path = format!("{}/", decode_lossy(parsed.path()).trim_end_matches('/'));

        Ok(Self {
            base_url,
            base_path,
            username: config.username().to_string(),
        })
    }

    /// Get the base WebDAV URL for the configured user
    /// Returns something like: "https://cloud.example.com/remote.php/dav/files/alice"
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert relative path to full URL for WebDAV requests
    ///
    /// Input:  "Videos/My Clips/"
    /// Output: "https://cloud.example.com/remote.php/dav/files/alice/Videos/My%20Clips/"
    pub fn relative_path_to_url(&self, relative_path: &str) -> String {
        format!("{}/{}", self.base_url, encode_path(relative_path))
    }

    /// Convert a WebDAV href (from the XML response) to a decoded relative path
    ///
    /// Input:  "/remote.php/dav/files/alice/Videos/My%20Clips/"
    /// Output: "Videos/My Clips/"
    pub fn href_to_relative_path(&self, href: &str) -> String {
        let href_path = if href.starts_with("http://") || href.starts_with("https://") {
            Url::parse(href)
                .map(|u| u.path().to_string())
                .unwrap_or_else(|_| href.to_string())
        } else {
            href.to_string()
        };
        let decoded = decode_lossy(&href_path);

        if let Some(rest) = decoded.strip_prefix(&self.base_path) {
            return rest.to_string();
        }
        if decoded == self.base_path.trim_end_matches('/') {
            return String::new();
        }

        // Server behind a rewritten prefix: fall back to the files endpoint marker
        let marker = format!("/{}/{}/", NEXTCLOUD_FILES_PATH, self.username);
        if let Some(index) = decoded.find(&marker) {
            return decoded[index + marker.len()..].to_string();
        }

        decoded.trim_start_matches('/').to_string()
    }
}

/// Percent-encodes each segment of a relative path, keeping `/` separators
/// and the trailing slash of directories
pub fn encode_path(relative_path: &str) -> String {
    relative_path
        .trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn decode_lossy(input: &str) -> String {
    urlencoding::decode(input)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| input.to_string())
}
