//! dxtrack - best-effort developer analytics tracking.
//!
//! This crate records usage events from developer CLI tools and delivers
//! them to an analytics endpoint, with durable offline queueing when the
//! endpoint is unreachable or no credentials are available.
//!
//! # Overview
//!
//! A [`tracker::Tracker`] is resolved once at startup. Resolution checks a
//! per-user credentials cache, falls back to deriving credentials from an
//! authenticated GitHub CLI, and otherwise lands in offline mode where
//! events accumulate in a local JSON queue. Delivery failures in online
//! mode fall back to the same queue, which is drained on the next online
//! start.
//!
//! Tracking is a side-channel: apart from malformed event input, failures
//! are logged and recovered, never propagated into the host CLI's own
//! workflow.
//!
//! # Modules
//!
//! - [`types`]: Event and metadata types
//! - [`config`]: Environment flags and the credentials cache
//! - [`sender`]: HTTP delivery
//! - [`store`]: Durable on-disk event queue
//! - [`github`]: GitHub CLI credential bootstrapping
//! - [`tracker`]: Tracker facade and mode resolution
//! - [`error`]: Crate-level error type

pub mod config;
pub mod error;
pub mod github;
pub mod sender;
pub mod store;
pub mod tracker;
pub mod types;

pub use config::{ConfigError, Credentials, DataPaths, TrackingEnv};
pub use error::{Result, TrackerError};
pub use github::{CommandOutput, CommandRunner, GhCli, GhCliError, SystemRunner};
pub use sender::{Sender, SenderConfig, SenderError, DX_API_URL};
pub use store::{EventStore, StoreError};
pub use tracker::{resolve, tracker_from_env, DxTracker, Mode, NoOpTracker, Tracker, TrackerOptions};
pub use types::{Event, Metadata, MetadataValue, ValidationError};
