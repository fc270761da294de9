//! Durable on-disk event queue.
//!
//! Events that cannot be delivered immediately are appended to a JSON array
//! on disk and drained later. The queue file moves between three states:
//! absent, empty, and populated. Absent and empty both mean "nothing to
//! flush"; a populated file is drained all-or-nothing, so a failed flush
//! leaves it untouched for the next attempt.
//!
//! Saving tolerates a corrupt queue file by discarding its contents and
//! starting a fresh array: tracking must never be blocked on corrupt local
//! state.

use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::sender::{Sender, SenderError};
use crate::types::Event;

/// Errors that can occur while reading or writing the queue.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Queue file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Queue file contents could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Delivery failed while draining the queue.
    #[error("send error: {0}")]
    Send(#[from] SenderError),
}

/// Append-only queue of unsent events, persisted as an indented JSON array.
#[derive(Debug, Clone)]
pub struct EventStore {
    path: PathBuf,
}

impl EventStore {
    /// Creates a store backed by the given file path.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Appends one event to the queue, creating parent directories and the
    /// file as needed.
    ///
    /// A corrupt existing file is discarded and replaced with a fresh
    /// single-element array.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` or `StoreError::Json` if the rewritten
    /// queue cannot be serialized or written.
    pub fn save(&self, event: &Event) -> Result<(), StoreError> {
        debug!(
            name = %event.name,
            timestamp = event.timestamp,
            "Saving event to queue"
        );

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut events = self.read_lenient();
        events.push(event.clone());

        self.write_events(&events)
    }

    /// Loads the full queue.
    ///
    /// An absent or empty file yields an empty vec.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Json` if the file exists but cannot be parsed.
    /// Unlike [`save`](Self::save), loading does not discard corrupt
    /// contents: a failed flush must leave the file as it found it.
    pub fn load(&self) -> Result<Vec<Event>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path)?;
        if contents.is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&contents)?)
    }

    /// Sends every queued event in insertion order, clearing the file only
    /// when all of them succeed.
    ///
    /// The first failure aborts the flush and leaves the queue untouched,
    /// so the whole batch is retried next time. Returns the number of
    /// events sent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Send` on the first delivery failure, or an I/O
    /// or parse error from reading the queue.
    pub async fn flush(&self, sender: &Sender) -> Result<usize, StoreError> {
        let events = self.load()?;
        if events.is_empty() {
            return Ok(0);
        }

        debug!(count = events.len(), "Sending saved events");

        for event in &events {
            sender.send(event).await?;
        }

        self.clear()?;

        debug!("Saved events sent and cleared");

        Ok(events.len())
    }

    /// Truncates the queue file to empty.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` on write failure.
    pub fn clear(&self) -> Result<(), StoreError> {
        fs::write(&self.path, "")?;
        Ok(())
    }

    /// Reads the queue, treating absent, empty, and corrupt files alike as
    /// an empty queue.
    fn read_lenient(&self) -> Vec<Event> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) if !c.is_empty() => c,
            _ => return Vec::new(),
        };

        match serde_json::from_str(&contents) {
            Ok(events) => events,
            Err(e) => {
                debug!(error = %e, "Discarding unparseable queue file");
                Vec::new()
            }
        }
    }

    fn write_events(&self, events: &[Event]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(events)?;
        fs::write(&self.path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms)?;
        }

        Ok(())
    }
}
