//! Run configuration for tlsinspect.
//!
//! There is no configuration file: everything comes from the command line.
//! [`Config::from_cli_args`] turns the parsed flags into a [`Config`],
//! filling the defaults below for anything not given.
//!
//! # Defaults
//!
//! - `port`: `"443"`
//! - `policy`: [`FailurePolicy::Advisory`]
//! - `label_width`: [`LABEL_WIDTH`]
//! - `timeout`: 30 seconds

use std::time::Duration;
use strum_macros::Display;
use thiserror::Error;

use crate::presenter::LABEL_WIDTH;

/// Port dialled when none is given.
pub const DEFAULT_PORT: &str = "443";

/// Connect, read and write timeout for the single connection attempt.
pub const TIMEOUT: Duration = Duration::from_secs(30);

/// The server to inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub hostname: String,
    pub port: String,
}

impl Target {
    /// Builds a target, using [`DEFAULT_PORT`] when `port` is `None` or empty.
    pub fn new(hostname: impl Into<String>, port: Option<String>) -> Self {
        Target {
            hostname: hostname.into(),
            port: port
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_PORT.to_string()),
        }
    }

    /// The `host:port` string handed to the resolver.
    pub fn dial_address(&self) -> String {
        if self.hostname.contains(':') && !self.hostname.starts_with('[') {
            format!("[{}]:{}", self.hostname, self.port)
        } else {
            format!("{}:{}", self.hostname, self.port)
        }
    }
}

/// How handshake and hostname verification failures are treated.
///
/// The same severity applies to both kinds of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum FailurePolicy {
    /// Log a warning and keep printing whatever was obtained
    Advisory,
    /// Stop at the first failure before printing anything
    Fatal,
}

/// Everything one inspection run needs.
#[derive(Debug, Clone)]
pub struct Config {
    pub target: Target,
    pub policy: FailurePolicy,
    pub label_width: usize,
    pub timeout: Duration,
}

impl Config {
    /// Creates a configuration for `target` with default settings.
    pub fn new(target: Target) -> Self {
        Config {
            target,
            policy: FailurePolicy::Advisory,
            label_width: LABEL_WIDTH,
            timeout: TIMEOUT,
        }
    }

    /// Creates a Config from command-line arguments.
    ///
    /// # Arguments
    ///
    /// * `hostname` - Target hostname, required
    /// * `port` - Target port, [`DEFAULT_PORT`] when absent
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Configuration with defaults for everything else
    /// * `Err(ConfigError::MissingHostname)` - hostname absent or empty
    pub fn from_cli_args(hostname: Option<String>, port: Option<String>) -> Result<Self, ConfigError> {
        let hostname = hostname
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::MissingHostname)?;
        Ok(Config::new(Target::new(hostname, port)))
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Errors that can occur while building the configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `--hostname` was not given or was empty
    #[error("a hostname is required")]
    MissingHostname,
}
