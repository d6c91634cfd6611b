use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, RANGE};
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, error, info};

use super::config::WebDAVConfig;
use super::url_management::WebDAVUrlManager;
use crate::errors::{PlayerError, PlayerResult};

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
    <d:prop>
        <d:resourcetype/>
        <d:getcontentlength/>
        <d:getcontenttype/>
        <d:getlastmodified/>
    </d:prop>
</d:propfind>"#;

/// Authenticated HTTP access to one user's WebDAV files.
///
/// Requests are never retried: a failed listing is reported to the user,
/// who decides whether to try again.
#[derive(Debug, Clone)]
pub struct WebDAVConnection {
    client: Client,
    config: WebDAVConfig,
    urls: WebDAVUrlManager,
}

impl WebDAVConnection {
    pub fn new(config: WebDAVConfig) -> PlayerResult<Self> {
        config.validate()?;

        // Listings get a per-request timeout; media streams may run for hours
        let client = Client::builder()
            .connect_timeout(config.timeout())
            .build()
            .map_err(|e| PlayerError::transport(config.webdav_url(), e))?;
        let urls = WebDAVUrlManager::new(&config)?;

        Ok(Self { client, config, urls })
    }

    pub fn config(&self) -> &WebDAVConfig {
        &self.config
    }

    pub fn urls(&self) -> &WebDAVUrlManager {
        &self.urls
    }

    /// Checks the credentials with a depth-1 PROPFIND on the files root.
    /// Only a 207 Multi-Status counts as success.
    pub async fn validate_credentials(&self) -> PlayerResult<()> {
        info!("🔍 Validating credentials against: {}", self.urls.base_url());
        let body = self.propfind("").await?;
        debug!("Validation response body: {} bytes", body.len());
        info!("✅ Credentials accepted for user: {}", self.config.username());
        Ok(())
    }

    /// Issues `PROPFIND` with `Depth: 1` for a relative path and returns the
    /// Multi-Status body
    pub async fn propfind(&self, relative_path: &str) -> PlayerResult<String> {
        let url = self.urls.relative_path_to_url(relative_path);
        debug!("Requesting file list from: {}", url);

        let method = Method::from_bytes(b"PROPFIND").map_err(|e| PlayerError::transport(&url, e))?;

        let mut headers = HeaderMap::new();
        headers.insert("Depth", HeaderValue::from_static("1"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/xml"));

        let response = self
            .client
            .request(method, &url)
            .timeout(self.config.timeout())
            .basic_auth(self.config.username(), Some(self.config.password()))
            .headers(headers)
            .body(PROPFIND_BODY)
            .send()
            .await
            .map_err(|e| {
                error!("❌ Request failed: {}", e);
                PlayerError::transport(&url, e)
            })?;

        let status = response.status();
        debug!("Response status: {}", status);

        if status != StatusCode::MULTI_STATUS {
            error!("❌ Failed to get file list: {} {}", status.as_u16(), reason(status));
            return Err(PlayerError::AuthRejected {
                path: relative_path.to_string(),
                status: status.as_u16(),
                reason: reason(status),
            });
        }

        response
            .text()
            .await
            .map_err(|e| PlayerError::transport(&url, e))
    }

    /// Authenticated GET for media streaming. The optional `Range` header is
    /// forwarded as-is; 200 and 206 are both successful answers.
    pub async fn get_media(
        &self,
        relative_path: &str,
        range: Option<&str>,
    ) -> PlayerResult<reqwest::Response> {
        let url = self.urls.relative_path_to_url(relative_path);
        debug!("⬇️ Streaming {} (range: {:?})", relative_path, range);

        let mut request = self
            .client
            .get(&url)
            .basic_auth(self.config.username(), Some(self.config.password()));
        if let Some(range) = range {
            request = request.header(RANGE, range);
        }

        let response = request.send().await.map_err(|e| PlayerError::transport(&url, e))?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::RANGE_NOT_SATISFIABLE {
            return Err(PlayerError::AuthRejected {
                path: relative_path.to_string(),
                status: status.as_u16(),
                reason: reason(status),
            });
        }

        Ok(response)
    }
}

fn reason(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("Unknown").to_string()
}
