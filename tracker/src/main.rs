//! dxtrack - analytics tracking CLI.
//!
//! A thin command-line surface over the tracker library, mainly useful for
//! wiring tracking into shell scripts and for inspecting the local queue.
//!
//! # Commands
//!
//! - `dxtrack track <NAME> --meta key=value ...`: record one event
//! - `dxtrack flush`: drain the offline queue
//! - `dxtrack status`: report mode, credentials, and queue depth

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;

use dxtrack::config::{Credentials, DataPaths, TrackingEnv};
use dxtrack::store::EventStore;
use dxtrack::tracker::{resolve, TrackerOptions};
use dxtrack::types::{Metadata, MetadataValue};
use dxtrack::TrackerError;

/// dxtrack - best-effort developer analytics tracking.
#[derive(Parser, Debug)]
#[command(name = "dxtrack")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    DX_LOG_LEVEL            Log verbosity (default: info)
    DX_TEST_MODE            'true' tags outgoing events as test data
    DX_FORCE_OFFLINE_MODE   'true' forces offline mode
    DISABLE_DX_TRACKING     'true' disables tracking entirely

EXAMPLES:
    # Record an event
    dxtrack track cli.startup.result --meta success=true --meta infra=docker

    # Drain events queued while offline
    dxtrack flush

    # Inspect the current state
    dxtrack status
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Record one event.
    Track {
        /// Event name, e.g. `cli.startup.result`.
        name: String,

        /// Metadata entry as `key=value`; repeatable. Values are read as
        /// bool, integer, or float when they parse as one, else as string.
        #[arg(short, long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },

    /// Send all queued events, clearing the queue on full success.
    Flush,

    /// Report resolved flags, cached credentials, and queue depth.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env = TrackingEnv::from_env().context("failed to read tracking environment")?;
    init_logging(env.log_level);

    match cli.command {
        Command::Track { name, meta } => run_track(&env, &name, &meta).await,
        Command::Flush => run_flush(&env).await,
        Command::Status => run_status(&env),
    }
}

/// Records a single event through a freshly resolved tracker.
async fn run_track(env: &TrackingEnv, name: &str, meta: &[String]) -> Result<()> {
    let metadata = parse_metadata(meta)?;

    let options = TrackerOptions::from_home().context("failed to resolve data paths")?;
    let tracker = resolve(env, options).context("failed to resolve tracker")?;

    tracker
        .track(name, metadata)
        .await
        .context("failed to track event")?;
    tracker.shutdown().await;

    println!("Tracked '{name}'");
    Ok(())
}

/// Drains the offline queue.
async fn run_flush(env: &TrackingEnv) -> Result<()> {
    let options = TrackerOptions::from_home().context("failed to resolve data paths")?;
    let tracker = resolve(env, options).context("failed to resolve tracker")?;

    // The startup flush may be draining concurrently; wait for it first so
    // the count below reflects what this invocation actually sent.
    tracker.shutdown().await;

    match tracker.flush_queued().await {
        Ok(0) => println!("Queue is empty"),
        Ok(sent) => println!("Sent {sent} queued events"),
        Err(TrackerError::Offline) => {
            println!("Tracker is offline; queued events were left in place");
        }
        Err(e) => return Err(e).context("failed to flush queued events"),
    }

    Ok(())
}

/// Prints the resolved flags, credential presence, and queue depth.
fn run_status(env: &TrackingEnv) -> Result<()> {
    let paths = DataPaths::from_home().context("failed to resolve data paths")?;

    println!("Tracking disabled:  {}", env.disabled);
    println!("Test mode:          {}", env.test_mode);
    println!("Forced offline:     {}", env.force_offline);

    match Credentials::load(&paths.config_path) {
        Ok(Some(c)) if c.is_valid() => {
            println!("Credentials:        cached for '{}'", c.github_username);
        }
        Ok(Some(_)) => println!("Credentials:        cached but incomplete"),
        Ok(None) => println!("Credentials:        none"),
        Err(e) => println!("Credentials:        unreadable ({e})"),
    }

    match EventStore::new(paths.events_path).load() {
        Ok(events) => println!("Queued events:      {}", events.len()),
        Err(e) => println!("Queued events:      unreadable ({e})"),
    }

    Ok(())
}

/// Parses repeated `key=value` pairs into event metadata.
fn parse_metadata(pairs: &[String]) -> Result<Metadata> {
    let mut metadata = Metadata::new();

    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("invalid metadata entry '{pair}', expected key=value");
        };
        if key.is_empty() {
            bail!("invalid metadata entry '{pair}', key is empty");
        }
        metadata.insert(key.to_string(), sniff_value(value));
    }

    Ok(metadata)
}

/// Reads a metadata value as the narrowest kind it parses as.
fn sniff_value(value: &str) -> MetadataValue {
    if let Ok(b) = value.parse::<bool>() {
        return MetadataValue::Bool(b);
    }
    if let Ok(i) = value.parse::<i64>() {
        return MetadataValue::Int(i);
    }
    if let Ok(f) = value.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    MetadataValue::Str(value.to_string())
}

/// Initializes the logging subsystem at the level from `DX_LOG_LEVEL`.
fn init_logging(level: Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_value_kinds() {
        assert_eq!(sniff_value("true"), MetadataValue::Bool(true));
        assert_eq!(sniff_value("42"), MetadataValue::Int(42));
        assert_eq!(sniff_value("1.5"), MetadataValue::Float(1.5));
        assert_eq!(
            sniff_value("docker"),
            MetadataValue::Str("docker".to_string())
        );
    }

    #[test]
    fn parse_metadata_collects_pairs() {
        let pairs = vec!["success=true".to_string(), "infra=docker".to_string()];
        let metadata = parse_metadata(&pairs).unwrap();

        assert_eq!(metadata.get("success"), Some(&MetadataValue::Bool(true)));
        assert_eq!(
            metadata.get("infra"),
            Some(&MetadataValue::Str("docker".to_string()))
        );
    }

    #[test]
    fn parse_metadata_rejects_missing_separator() {
        let pairs = vec!["success".to_string()];
        assert!(parse_metadata(&pairs).is_err());
    }

    #[test]
    fn parse_metadata_rejects_empty_key() {
        let pairs = vec!["=true".to_string()];
        assert!(parse_metadata(&pairs).is_err());
    }

    #[test]
    fn value_with_equals_keeps_remainder() {
        let pairs = vec!["error=exit=1".to_string()];
        let metadata = parse_metadata(&pairs).unwrap();
        assert_eq!(
            metadata.get("error"),
            Some(&MetadataValue::Str("exit=1".to_string()))
        );
    }
}
