use serde::Serialize;

use crate::errors::{AppError, ErrorSeverity};

/// A blocking, user-facing message: the shell's stand-in for a dialog box
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub severity: ErrorSeverity,
    pub title: String,
    pub message: String,
    pub hint: Option<String>,
}

impl Notice {
    pub fn from_error<E: AppError>(error: &E) -> Self {
        Self {
            severity: error.error_severity(),
            title: error.user_title().to_string(),
            message: error.user_message(),
            hint: error.suggested_action(),
        }
    }
}

/// Surface for user-facing failure notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Prints notices to stderr, one block per notice
#[derive(Debug, Default)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, notice: Notice) {
        eprintln!("[{}] {}", notice.title, notice.message);
        if let Some(hint) = notice.hint {
            eprintln!("  hint: {}", hint);
        }
    }
}
