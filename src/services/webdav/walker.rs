use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::connection::WebDAVConnection;
use crate::errors::PlayerResult;
use crate::models::RemoteEntry;
use crate::webdav_xml_parser::{parse_propfind_response, PropFindResponse};

/// Source of one-level directory listings
#[async_trait]
pub trait DirectoryLister: Send + Sync {
    /// Lists the direct children of `relative_path` (empty for the root),
    /// excluding the directory itself
    async fn list(&self, relative_path: &str) -> PlayerResult<Vec<RemoteEntry>>;
}

/// Lists remote directories one level at a time with depth-1 PROPFIND
#[derive(Debug, Clone)]
pub struct WebDAVWalker {
    connection: WebDAVConnection,
}

impl WebDAVWalker {
    pub fn new(connection: WebDAVConnection) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &WebDAVConnection {
        &self.connection
    }

    /// Turns parsed response elements into child entries: hrefs become
    /// decoded relative paths, the self-reference and duplicates are dropped
    pub fn entries_from_responses(
        &self,
        requested_path: &str,
        responses: Vec<PropFindResponse>,
    ) -> Vec<RemoteEntry> {
        let requested = normalize(requested_path);
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(responses.len());

        for response in responses {
            let relative_path = self.connection.urls().href_to_relative_path(&response.href);
            let is_directory = response.is_directory();

            if normalize(&relative_path) == requested {
                continue;
            }

            let mut entry = RemoteEntry::from_relative_path(&relative_path, is_directory);
            if entry.display_name.trim_end_matches('/').is_empty() {
                warn!("Skipping entry with empty name: {}", response.href);
                continue;
            }
            if !seen.insert(entry.relative_path.clone()) {
                debug!("Skipping duplicate entry: {}", entry.relative_path);
                continue;
            }

            entry.content_length = response.content_length;
            entry.content_type = response.content_type;
            entry.last_modified = response.last_modified;
            entries.push(entry);
        }

        entries
    }
}

#[async_trait]
impl DirectoryLister for WebDAVWalker {
    async fn list(&self, relative_path: &str) -> PlayerResult<Vec<RemoteEntry>> {
        let body = self.connection.propfind(relative_path).await?;
        let responses = parse_propfind_response(&body)?;
        let entries = self.entries_from_responses(relative_path, responses);

        if entries.is_empty() {
            info!("No files found in '{}'", relative_path);
        } else {
            info!("📁 Listed {} entries in '{}'", entries.len(), relative_path);
        }

        Ok(entries)
    }
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}
