use serde::{Deserialize, Serialize};

/// How loudly an error should be surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Blocks the current workflow - show to user
    Critical,
    /// Affects a single feature - log and notify
    Important,
    /// Caller misuse or bad input - log and print a short hint
    Minor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Network, DNS and TLS problems
    Network,
    /// Server refused the credentials or the resource
    Auth,
    /// Server answered with something we could not understand
    Protocol,
    /// Media engine problems
    Playback,
    /// Settings file and local storage
    FileSystem,
    /// Invalid commands or arguments
    Usage,
}

/// Common trait for all custom error types in the application
pub trait AppError: std::error::Error + Send + Sync + 'static {
    /// Short title used as the heading of a user-facing notification
    fn user_title(&self) -> &'static str;

    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Stable code for log filtering
    fn error_code(&self) -> &'static str;

    fn error_category(&self) -> ErrorCategory;

    fn error_severity(&self) -> ErrorSeverity;

    /// Get optional suggested action for the user
    fn suggested_action(&self) -> Option<String> {
        None
    }
}

pub mod player;

pub use player::{PlayerError, PlayerResult};
