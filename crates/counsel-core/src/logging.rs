//! Transcript logging for backend traffic.
//!
//! Diagnostics go through the `log` facade. This module is separate: it
//! appends every request and response body to a plain file so a conversation
//! with the backend can be inspected after the fact.

use chrono::{SecondsFormat, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Append-only transcript file. Disabled transcripts drop every line.
#[derive(Debug, Default)]
pub struct Transcript {
    file: Mutex<Option<File>>,
}

impl Transcript {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Open (or create) the transcript at `path`.
    ///
    /// Failing to open is not fatal: the transcript is disabled and a warning
    /// is logged.
    pub fn open(path: &Path) -> Self {
        let file = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| OpenOptions::new().create(true).append(true).open(path));

        match file {
            Ok(file) => Self {
                file: Mutex::new(Some(file)),
            },
            Err(e) => {
                log::warn!("Could not open transcript {}: {}", path.display(), e);
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.lock().map(|f| f.is_some()).unwrap_or(false)
    }

    /// Write a timestamped line, e.g. `[2026-02-04T10:15:30.123Z] POST /chat: {...}`.
    pub fn line(&self, direction: &str, data: &str) {
        if let Ok(mut guard) = self.file.lock() {
            if let Some(ref mut file) = *guard {
                let _ = writeln!(file, "[{}] {}: {}", timestamp(), direction, data);
                let _ = file.flush();
            }
        }
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
