use uuid::Uuid;

use crate::errors::PlayerResult;
use crate::services::webdav::WebDAVConnection;

/// What the media engine is given to open: a loopback URL that carries an
/// unguessable token instead of the user's credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSource {
    token: Uuid,
    url: String,
    relative_path: String,
    display_name: String,
}

impl MediaSource {
    pub fn new(token: Uuid, url: String, relative_path: &str, display_name: &str) -> Self {
        Self {
            token,
            url,
            relative_path: relative_path.to_string(),
            display_name: display_name.to_string(),
        }
    }

    pub fn token(&self) -> Uuid {
        self.token
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// A remote file readable through authenticated HTTP range requests
#[derive(Debug, Clone)]
pub struct AuthenticatedSource {
    connection: WebDAVConnection,
    relative_path: String,
}

impl AuthenticatedSource {
    pub fn new(connection: WebDAVConnection, relative_path: &str) -> Self {
        Self {
            connection,
            relative_path: relative_path.to_string(),
        }
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Fetches the file, or the requested byte range of it, with the Basic
    /// auth header attached
    pub async fn open_range(&self, range: Option<&str>) -> PlayerResult<reqwest::Response> {
        self.connection.get_media(&self.relative_path, range).await
    }
}
