//! Error types for dxtrack.
//!
//! Each module defines its own error enum; this module aggregates them into
//! the crate-level [`TrackerError`] returned by the tracker facade.
//!
//! The overarching policy: tracking is best-effort and must never be the
//! reason a user-facing command fails. Validation errors are the exception,
//! because they indicate a caller bug.

use thiserror::Error;

use crate::config::ConfigError;
use crate::sender::SenderError;
use crate::store::StoreError;
use crate::types::ValidationError;

/// Errors surfaced by tracker operations.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Configuration error (environment or credentials cache).
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The event failed validation.
    #[error("invalid event: {0}")]
    Validation(#[from] ValidationError),

    /// Delivery failed and could not be recovered locally.
    #[error("send error: {0}")]
    Sender(#[from] SenderError),

    /// The durable queue could not be read or written.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The operation needs online mode.
    #[error("tracker is offline")]
    Offline,
}

/// A specialized `Result` type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
