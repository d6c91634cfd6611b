use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One child of a remote directory, as returned by a single PROPFIND listing.
///
/// `relative_path` is percent-decoded, relative to the user's files root,
/// never starts with `/` and keeps a trailing `/` for directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub display_name: String,
    pub relative_path: String,
    pub is_directory: bool,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    /// Builds an entry from a decoded relative path. The display name is the
    /// last path segment, suffixed with `/` for directories.
    pub fn from_relative_path(relative_path: &str, is_directory: bool) -> Self {
        let trimmed = relative_path.trim_matches('/');
        let last_segment = trimmed.rsplit('/').next().unwrap_or(trimmed);

        let (display_name, relative_path) = if is_directory {
            (format!("{}/", last_segment), format!("{}/", trimmed))
        } else {
            (last_segment.to_string(), trimmed.to_string())
        };

        Self {
            display_name,
            relative_path,
            is_directory,
            content_length: None,
            content_type: None,
            last_modified: None,
        }
    }

    /// The virtual root of the user's files (empty relative path)
    pub fn root() -> Self {
        Self {
            display_name: "/".to_string(),
            relative_path: String::new(),
            is_directory: true,
            content_length: None,
            content_type: None,
            last_modified: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.is_directory && self.relative_path.is_empty()
    }

    /// Whether the entry looks like something the media engine can play.
    /// Prefers the server-reported content type, falling back to the extension.
    pub fn is_video(&self) -> bool {
        if self.is_directory {
            return false;
        }

        if let Some(ref content_type) = self.content_type {
            if content_type.starts_with("video/") {
                return true;
            }
        }

        mime_guess::from_path(&self.relative_path)
            .iter()
            .any(|mime| mime.type_() == mime_guess::mime::VIDEO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_display_name_keeps_marker() {
        let entry = RemoteEntry::from_relative_path("Videos/Clips/", true);
        assert_eq!(entry.display_name, "Clips/");
        assert_eq!(entry.relative_path, "Videos/Clips/");
    }

    #[test]
    fn test_file_display_name() {
        let entry = RemoteEntry::from_relative_path("Videos/Movie.mp4", false);
        assert_eq!(entry.display_name, "Movie.mp4");
        assert_eq!(entry.relative_path, "Videos/Movie.mp4");
        assert!(entry.is_video());
    }

    #[test]
    fn test_is_video_uses_content_type() {
        let mut entry = RemoteEntry::from_relative_path("recording.bin", false);
        assert!(!entry.is_video());
        entry.content_type = Some("video/x-matroska".to_string());
        assert!(entry.is_video());
    }

    #[test]
    fn test_root_entry() {
        let root = RemoteEntry::root();
        assert!(root.is_root());
        assert!(!RemoteEntry::from_relative_path("Videos/", true).is_root());
    }
}
