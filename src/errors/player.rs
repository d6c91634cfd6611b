use thiserror::Error;

use super::{AppError, ErrorCategory, ErrorSeverity};

pub type PlayerResult<T> = Result<T, PlayerError>;

/// Errors raised while browsing the remote server or controlling playback
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Request to '{url}' failed: {details}")]
    TransportFailure { url: String, details: String },

    #[error("Server rejected request for '{path}': {status} {reason}")]
    AuthRejected { path: String, status: u16, reason: String },

    #[error("Malformed WebDAV response: {details}")]
    MalformedResponse { details: String },

    #[error("Playback failed: {details}")]
    PlaybackFailure { details: String },

    /// The player process or its control channel is gone for good
    #[error("Player exited: {details}")]
    EngineExited { details: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("'{path}' is not a directory")]
    NotADirectory { path: String },

    #[error("No authenticated session")]
    NotAuthenticated,

    #[error("Playback session is closed")]
    SessionClosed,

    #[error("Settings error for '{path}': {details}")]
    Settings { path: String, details: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlayerError {
    pub fn transport<S: Into<String>>(url: S, err: impl std::fmt::Display) -> Self {
        Self::TransportFailure {
            url: url.into(),
            details: err.to_string(),
        }
    }

    pub fn malformed<S: Into<String>>(details: S) -> Self {
        Self::MalformedResponse { details: details.into() }
    }

    pub fn playback<S: Into<String>>(details: S) -> Self {
        Self::PlaybackFailure { details: details.into() }
    }

    pub fn engine_exited<S: Into<String>>(details: S) -> Self {
        Self::EngineExited { details: details.into() }
    }

    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument { message: message.into() }
    }
}

impl AppError for PlayerError {
    fn user_title(&self) -> &'static str {
        match self {
            PlayerError::TransportFailure { .. } => "Connection failed",
            PlayerError::AuthRejected { .. } => "Login failed",
            PlayerError::MalformedResponse { .. } => "Unexpected server response",
            PlayerError::PlaybackFailure { .. } => "Playback error",
            PlayerError::EngineExited { .. } => "Player exited",
            PlayerError::InvalidArgument { .. } => "Invalid input",
            PlayerError::NotADirectory { .. } => "Not a directory",
            PlayerError::NotAuthenticated => "Login required",
            PlayerError::SessionClosed => "Player closed",
            PlayerError::Settings { .. } | PlayerError::Io(_) => "Storage error",
        }
    }

    fn user_message(&self) -> String {
        match self {
            PlayerError::TransportFailure { .. } | PlayerError::AuthRejected { .. } => {
                "Login failed. Please check your server URL, username and password.".to_string()
            }
            PlayerError::MalformedResponse { .. } => {
                "The server returned a listing that could not be read".to_string()
            }
            PlayerError::PlaybackFailure { details } => {
                format!("Could not play the file: {}", details)
            }
            PlayerError::EngineExited { .. } => {
                "The video player was closed; the video has been stopped".to_string()
            }
            PlayerError::InvalidArgument { message } => message.clone(),
            PlayerError::NotADirectory { path } => {
                format!("'{}' is a file, not a directory", path)
            }
            PlayerError::NotAuthenticated => "Please log in first.".to_string(),
            PlayerError::SessionClosed => "No video is open".to_string(),
            PlayerError::Settings { details, .. } => {
                format!("Could not access settings: {}", details)
            }
            PlayerError::Io(e) => e.to_string(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            PlayerError::TransportFailure { .. } => "TRANSPORT_FAILURE",
            PlayerError::AuthRejected { .. } => "AUTH_REJECTED",
            PlayerError::MalformedResponse { .. } => "MALFORMED_RESPONSE",
            PlayerError::PlaybackFailure { .. } => "PLAYBACK_FAILURE",
            PlayerError::EngineExited { .. } => "ENGINE_EXITED",
            PlayerError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            PlayerError::NotADirectory { .. } => "NOT_A_DIRECTORY",
            PlayerError::NotAuthenticated => "NOT_AUTHENTICATED",
            PlayerError::SessionClosed => "SESSION_CLOSED",
            PlayerError::Settings { .. } => "SETTINGS_ERROR",
            PlayerError::Io(_) => "IO_ERROR",
        }
    }

    fn error_category(&self) -> ErrorCategory {
        match self {
            PlayerError::TransportFailure { .. } => ErrorCategory::Network,
            PlayerError::AuthRejected { .. } | PlayerError::NotAuthenticated => {
                ErrorCategory::Auth
            }
            PlayerError::MalformedResponse { .. } => ErrorCategory::Protocol,
            PlayerError::PlaybackFailure { .. }
            | PlayerError::EngineExited { .. }
            | PlayerError::SessionClosed => ErrorCategory::Playback,
            PlayerError::Settings { .. } | PlayerError::Io(_) => ErrorCategory::FileSystem,
            PlayerError::InvalidArgument { .. } | PlayerError::NotADirectory { .. } => {
                ErrorCategory::Usage
            }
        }
    }

    fn error_severity(&self) -> ErrorSeverity {
        match self {
            PlayerError::TransportFailure { .. }
            | PlayerError::AuthRejected { .. }
            | PlayerError::NotAuthenticated => ErrorSeverity::Critical,
            PlayerError::MalformedResponse { .. }
            | PlayerError::PlaybackFailure { .. }
            | PlayerError::EngineExited { .. }
            | PlayerError::Settings { .. }
            | PlayerError::Io(_) => ErrorSeverity::Important,
            PlayerError::InvalidArgument { .. }
            | PlayerError::NotADirectory { .. }
            | PlayerError::SessionClosed => ErrorSeverity::Minor,
        }
    }

    fn suggested_action(&self) -> Option<String> {
        match self {
            PlayerError::AuthRejected { status: 401, .. } => {
                Some("Check the username and password, then run 'login' again".to_string())
            }
            PlayerError::AuthRejected { status: 404, .. } => {
                Some("Check the server URL; it should point at the Nextcloud root".to_string())
            }
            PlayerError::TransportFailure { .. } => {
                Some("Check the network connection and that the server is reachable".to_string())
            }
            PlayerError::NotAuthenticated => Some("Run 'login' first".to_string()),
            _ => None,
        }
    }
}
