//! In-memory copy of the application log.
//!
//! [`LogBufferLayer`] is installed next to the regular `fmt` layer so every
//! event also lands in a shared, bounded [`LogBuffer`] that the shell can
//! show and export to a file.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local};
use tracing::field::{Field, Visit};
use tracing::{info, Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::errors::PlayerResult;

/// Lines kept before the oldest are dropped
pub const MAX_LOG_LINES: usize = 10_000;

const EXPORT_FILE_FORMAT: &str = "Nextcloud-Video-Player_%Y_%m_%d_%H_%M_%S.log";

#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOG_LINES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    /// Layer feeding this buffer
    pub fn layer(&self) -> LogBufferLayer {
        LogBufferLayer {
            buffer: self.clone(),
        }
    }

    pub fn push(&self, line: String) {
        let mut lines = self.guard();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    pub fn lines(&self) -> Vec<String> {
        self.guard().iter().cloned().collect()
    }

    /// The last `n` lines, oldest first
    pub fn tail(&self, n: usize) -> Vec<String> {
        let lines = self.guard();
        lines.iter().skip(lines.len().saturating_sub(n)).cloned().collect()
    }

    /// Writes every buffered line to `target`. A directory target gets a
    /// timestamped file name. Returns the path written.
    pub fn export(&self, target: &Path) -> PlayerResult<PathBuf> {
        let path = if target.is_dir() {
            target.join(default_file_name(Local::now()))
        } else {
            target.to_path_buf()
        };

        let mut contents = String::new();
        for line in self.guard().iter() {
            contents.push_str(line);
            contents.push('\n');
        }
        std::fs::write(&path, contents)?;

        info!("Log exported to {}", path.display());
        Ok(path)
    }

    fn guard(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub fn default_file_name(now: DateTime<Local>) -> String {
    now.format(EXPORT_FILE_FORMAT).to_string()
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

/// `tracing` layer appending `<timestamp> - <LEVEL> - <message>` lines
#[derive(Debug, Clone)]
pub struct LogBufferLayer {
    buffer: LogBuffer,
}

impl<S> Layer<S> for LogBufferLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let line = format!(
            "{} - {} - {}{}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            event.metadata().level(),
            visitor.message,
            visitor.fields
        );
        self.buffer.push(line);
    }
}
