//! GitHub CLI credential bootstrapping.
//!
//! When no credentials cache exists, the tracker derives credentials from
//! an authenticated `gh` CLI: the username comes from `gh api user` and the
//! API token from a variable in the project's config repository. Process
//! execution goes through the [`CommandRunner`] capability so tests can
//! script the CLI without spawning anything.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use regex::Regex;
use semver::Version;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ConfigError, Credentials};

/// Minimum supported `gh` CLI version.
pub const MIN_GH_CLI_VERSION: &str = "2.50.0";

/// Repository variable holding the analytics API token.
const TOKEN_VARIABLE: &str = "DX_API_TOKEN";

/// Repository whose variable store carries the token.
const TOKEN_REPO: &str = "dxtrack/dx-tracking";

/// Captured result of running an external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// The process exited with status zero.
    pub success: bool,

    /// Captured standard output.
    pub stdout: String,
}

/// Capability for running external commands.
///
/// Injected into [`GhCli`] so credential derivation can be exercised in
/// tests with scripted outputs.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` and captures its output.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the process cannot be spawned.
    fn output(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput>;
}

/// [`CommandRunner`] backed by `std::process::Command`.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn output(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
        let output = Command::new(program).args(args).output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

/// Errors that can occur during credential derivation.
#[derive(Error, Debug)]
pub enum GhCliError {
    /// The CLI could not be spawned.
    #[error("failed to run gh CLI: {0}")]
    Spawn(#[from] std::io::Error),

    /// The CLI ran but exited unsuccessfully.
    #[error("command failed: {command}")]
    CommandFailed { command: String },

    /// `gh api user` produced no username.
    #[error("GitHub username not found")]
    EmptyUsername,

    /// The token variable was empty.
    #[error("DX API token not found")]
    EmptyToken,

    /// Derived credentials could not be persisted.
    #[error("failed to save credentials: {0}")]
    Config(#[from] ConfigError),
}

/// Thin wrapper over the `gh` CLI.
pub struct GhCli {
    runner: Arc<dyn CommandRunner>,
}

impl GhCli {
    /// Creates a wrapper using the given command runner.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Checks that the CLI is present, authenticated, and at least
    /// [`MIN_GH_CLI_VERSION`].
    ///
    /// Failures are warnings, never errors: an unusable CLI just means the
    /// tracker resolves offline.
    #[must_use]
    pub fn is_available(&self) -> bool {
        if self.run(&["auth", "status"]).is_err() {
            debug!("gh CLI is not available or not authenticated");
            return false;
        }

        let version_output = match self.run(&["--version"]) {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "failed to get gh CLI version");
                return false;
            }
        };

        let Some(version) = parse_gh_version(&version_output) else {
            warn!(
                output = %version_output.trim(),
                "failed to parse gh CLI version"
            );
            return false;
        };

        let minimum =
            Version::parse(MIN_GH_CLI_VERSION).expect("minimum gh CLI version is valid semver");
        if version < minimum {
            warn!(
                %version,
                minimum = MIN_GH_CLI_VERSION,
                "gh CLI version is too old, please update"
            );
            return false;
        }

        debug!(%version, "gh CLI version found");
        true
    }

    /// Fetches the authenticated GitHub username.
    ///
    /// # Errors
    ///
    /// Returns `GhCliError::EmptyUsername` if the CLI reports no login, or
    /// a spawn/exit failure.
    pub fn username(&self) -> Result<String, GhCliError> {
        let output = self.run(&["api", "user", "--jq", ".login"])?;

        let username = output.trim().to_string();
        if username.is_empty() {
            return Err(GhCliError::EmptyUsername);
        }

        debug!(%username, "GitHub username found");
        Ok(username)
    }

    /// Fetches the analytics API token from the config repository's
    /// variable store.
    ///
    /// # Errors
    ///
    /// Returns `GhCliError::EmptyToken` if the variable is empty, or a
    /// spawn/exit failure.
    pub fn api_token(&self) -> Result<String, GhCliError> {
        let output = self.run(&["variable", "get", TOKEN_VARIABLE, "--repo", TOKEN_REPO])?;

        let token = output.trim().to_string();
        if token.is_empty() {
            return Err(GhCliError::EmptyToken);
        }

        debug!("DX API token found");
        Ok(token)
    }

    /// Derives credentials from the CLI and persists them to `config_path`.
    ///
    /// # Errors
    ///
    /// Returns the first failure from username lookup, token lookup, or
    /// saving.
    pub fn derive_credentials(&self, config_path: &Path) -> Result<Credentials, GhCliError> {
        let credentials = Credentials {
            github_username: self.username()?,
            dx_api_token: self.api_token()?,
        };

        credentials.save(config_path)?;

        Ok(credentials)
    }

    fn run(&self, args: &[&str]) -> Result<String, GhCliError> {
        let output = self.runner.output("gh", args)?;
        if !output.success {
            return Err(GhCliError::CommandFailed {
                command: format!("gh {}", args.join(" ")),
            });
        }
        Ok(output.stdout)
    }
}

/// Extracts the semantic version from `gh --version` output.
fn parse_gh_version(output: &str) -> Option<Version> {
    let re = Regex::new(r"gh version (\d+\.\d+\.\d+)").ok()?;
    let captures = re.captures(output)?;
    Version::parse(captures.get(1)?.as_str()).ok()
}
