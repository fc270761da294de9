//! Event types for dxtrack analytics.
//!
//! This module defines the event schema shared by the sender and the on-disk
//! queue. An event is a `{name, timestamp, metadata}` triple; the queue file
//! is a JSON array of these triples, so the serialized field names here are
//! a stable format.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single metadata value.
///
/// Values are restricted to an explicit allow-list of scalar kinds so that
/// serialization stays deterministic and the wire format never grows nested
/// structures by accident. Serializes untagged, so JSON reads as plain
/// scalars: `true`, `42`, `1.5`, `"docker"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Event metadata.
///
/// A `BTreeMap` keeps key order stable across serializations.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Errors produced by event validation.
///
/// These indicate a caller bug and are the only tracking failures surfaced
/// unconditionally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Event name is empty.
    #[error("event name is required")]
    EmptyName,

    /// Timestamp is zero.
    #[error("event timestamp is required")]
    ZeroTimestamp,

    /// Metadata map is empty.
    #[error("event metadata is required")]
    EmptyMetadata,
}

/// A tracking event.
///
/// Immutable once constructed; removed from the durable queue only after a
/// confirmed successful delivery.
///
/// # Examples
///
/// ```
/// use dxtrack::types::{Event, Metadata};
///
/// let mut metadata = Metadata::new();
/// metadata.insert("success".to_string(), true.into());
/// metadata.insert("infra".to_string(), "docker".into());
///
/// let event = Event::now("cli.startup.result", metadata);
/// assert!(event.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name, e.g. `cli.startup.result`.
    pub name: String,

    /// Unix timestamp in seconds.
    pub timestamp: i64,

    /// Event metadata; must be non-empty.
    pub metadata: Metadata,
}

impl Event {
    /// Creates an event stamped with the current unix time.
    #[must_use]
    pub fn now(name: &str, metadata: Metadata) -> Self {
        Self {
            name: name.to_string(),
            timestamp: Utc::now().timestamp(),
            metadata,
        }
    }

    /// Checks the event against the input contract: non-empty name,
    /// non-zero timestamp, non-empty metadata.
    ///
    /// # Errors
    ///
    /// Returns the first violated [`ValidationError`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.timestamp == 0 {
            return Err(ValidationError::ZeroTimestamp);
        }
        if self.metadata.is_empty() {
            return Err(ValidationError::EmptyMetadata);
        }
        Ok(())
    }
}
