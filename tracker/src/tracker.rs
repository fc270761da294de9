//! Tracker facade and construction-time mode resolution.
//!
//! A [`Tracker`] is resolved once at startup and passed explicitly to
//! whatever needs to record events; there is no global instance. Resolution
//! picks one of two terminal modes:
//!
//! - **Online**: valid credentials were found (cached, or freshly derived
//!   from the `gh` CLI). Events are sent immediately and fall back to the
//!   durable queue on delivery failure.
//! - **Offline**: no usable credentials, or offline mode was forced. Events
//!   go straight to the durable queue.
//!
//! Resolving online also spawns a background task that drains any events
//! queued by previous offline runs. The task's handle is retained so
//! [`Tracker::shutdown`] can await it, which keeps teardown deterministic
//! for tests and short-lived CLI invocations.
//!
//! # Example
//!
//! ```no_run
//! use dxtrack::tracker::tracker_from_env;
//! use dxtrack::types::Metadata;
//!
//! #[tokio::main]
//! async fn main() {
//!     let tracker = tracker_from_env().expect("failed to resolve tracker");
//!
//!     let mut metadata = Metadata::new();
//!     metadata.insert("success".to_string(), true.into());
//!     metadata.insert("infra".to_string(), "docker".into());
//!
//!     if let Err(e) = tracker.track("cli.startup.result", metadata).await {
//!         eprintln!("failed to track startup: {e}");
//!     }
//!
//!     tracker.shutdown().await;
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{ConfigError, Credentials, DataPaths, TrackingEnv};
use crate::error::{Result, TrackerError};
use crate::github::{CommandRunner, GhCli, SystemRunner};
use crate::sender::{Sender, SenderConfig, DX_API_URL};
use crate::store::EventStore;
use crate::types::{Event, Metadata};

/// Delivery mode, decided once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Online,
    Offline,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Records events on behalf of a CLI.
///
/// Callers hold a `Box<dyn Tracker>` and never branch on whether tracking
/// is enabled or online; disabled tracking is just the no-op
/// implementation.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Records one event.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed input. Delivery failures
    /// are recovered by queuing and only surface when queuing fails too.
    async fn track(&self, name: &str, metadata: Metadata) -> Result<()>;

    /// Drains the durable queue, returning the number of events sent.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::Offline` when no credentials are available,
    /// or the first delivery/storage failure.
    async fn flush_queued(&self) -> Result<usize>;

    /// Waits for background work to finish. Call before process exit.
    async fn shutdown(&self);
}

/// Tracker that does nothing, used when tracking is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpTracker;

#[async_trait]
impl Tracker for NoOpTracker {
    async fn track(&self, _name: &str, _metadata: Metadata) -> Result<()> {
        Ok(())
    }

    async fn flush_queued(&self) -> Result<usize> {
        Ok(0)
    }

    async fn shutdown(&self) {}
}

/// Wiring for tracker resolution: file locations, endpoint, and the
/// command runner used to probe the `gh` CLI.
pub struct TrackerOptions {
    /// Credentials cache and queue file locations.
    pub paths: DataPaths,

    /// Analytics endpoint URL.
    pub api_url: String,

    /// Capability used to run the `gh` CLI.
    pub runner: Arc<dyn CommandRunner>,
}

impl TrackerOptions {
    /// Production wiring rooted at the user's home directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoHomeDirectory` if the home directory cannot
    /// be determined.
    pub fn from_home() -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(DataPaths::from_home()?))
    }

    /// Default endpoint and system command runner with explicit paths.
    #[must_use]
    pub fn new(paths: DataPaths) -> Self {
        Self {
            paths,
            api_url: DX_API_URL.to_string(),
            runner: Arc::new(SystemRunner),
        }
    }

    /// Overrides the analytics endpoint.
    #[must_use]
    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    /// Overrides the command runner.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }
}

/// Dual-mode tracker with durable offline queueing.
pub struct DxTracker {
    /// Present exactly when the tracker resolved online.
    sender: Option<Sender>,

    store: EventStore,

    /// Startup flush of previously queued events, retained so shutdown can
    /// await it.
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl DxTracker {
    /// Returns the resolved delivery mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        if self.sender.is_some() {
            Mode::Online
        } else {
            Mode::Offline
        }
    }
}

#[async_trait]
impl Tracker for DxTracker {
    async fn track(&self, name: &str, metadata: Metadata) -> Result<()> {
        let event = Event::now(name, metadata);
        event.validate()?;

        match &self.sender {
            Some(sender) => {
                if let Err(send_err) = sender.send(&event).await {
                    // Local persistence is the recovery path; if that fails
                    // too, the delivery error is the one worth reporting.
                    if let Err(save_err) = self.store.save(&event) {
                        debug!(error = %save_err, "failed to save event");
                        return Err(send_err.into());
                    }
                }
                Ok(())
            }
            None => {
                self.store.save(&event)?;
                Ok(())
            }
        }
    }

    async fn flush_queued(&self) -> Result<usize> {
        match &self.sender {
            Some(sender) => Ok(self.store.flush(sender).await?),
            None => Err(TrackerError::Offline),
        }
    }

    async fn shutdown(&self) {
        let handle = self.flush_task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                debug!(error = %e, "startup flush task failed");
            }
        }
    }
}

/// Resolves a tracker from explicit environment flags and wiring.
///
/// Must be called from within a Tokio runtime: resolving online spawns the
/// startup flush task.
///
/// # Errors
///
/// Returns a configuration error for an unparseable credentials cache.
/// GitHub CLI failures are not errors; they downgrade the mode to offline.
pub fn resolve(env: &TrackingEnv, options: TrackerOptions) -> Result<Box<dyn Tracker>> {
    debug!("Initializing tracker");

    if env.disabled {
        debug!("Tracking disabled by environment variable");
        return Ok(Box::new(NoOpTracker));
    }

    if env.test_mode {
        debug!("Tracking in test mode");
    }

    let stored = Credentials::load(&options.paths.config_path)?;

    let mut credentials = match stored {
        Some(c) if c.is_valid() => {
            debug!("Valid local credentials found");
            Some(c)
        }
        _ => {
            let gh = GhCli::new(Arc::clone(&options.runner));
            if gh.is_available() {
                match gh.derive_credentials(&options.paths.config_path) {
                    Ok(c) => {
                        debug!("Credentials created, setting mode to online");
                        Some(c)
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to build credentials with gh CLI");
                        None
                    }
                }
            } else {
                debug!("gh CLI not available, setting mode to offline");
                None
            }
        }
    };

    if env.force_offline {
        debug!("Tracking forced to offline by environment variable");
        credentials = None;
    }

    let store = EventStore::new(options.paths.events_path.clone());

    let tracker = match credentials {
        Some(c) => {
            let sender = Sender::new(
                SenderConfig::new(c.dx_api_token, c.github_username, env.test_mode)
                    .with_api_url(options.api_url),
            );

            let flush_store = store.clone();
            let flush_sender = sender.clone();
            let handle = tokio::spawn(async move {
                match flush_store.flush(&flush_sender).await {
                    Ok(sent) if sent > 0 => debug!(sent, "Flushed saved events"),
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, "Failed to send saved events"),
                }
            });

            DxTracker {
                sender: Some(sender),
                store,
                flush_task: Mutex::new(Some(handle)),
            }
        }
        None => DxTracker {
            sender: None,
            store,
            flush_task: Mutex::new(None),
        },
    };

    debug!(mode = %tracker.mode(), "Tracker initialized");

    Ok(Box::new(tracker))
}

/// Resolves a tracker from the process environment and home-directory
/// paths. The usual entry point for CLI binaries.
///
/// # Errors
///
/// Returns a configuration error for an unparseable `DX_LOG_LEVEL`, a
/// missing home directory, or a corrupt credentials cache.
pub fn tracker_from_env() -> Result<Box<dyn Tracker>> {
    let env = TrackingEnv::from_env()?;
    let options = TrackerOptions::from_home()?;
    resolve(&env, options)
}
