//! Error handling for synthboot.
use std::{io, time::Duration};

use thiserror::Error;

/// Errors that stop the boot sequence or the supervisor loop.
#[derive(Debug, Error)]
pub enum BootError {
    /// Error reading or accessing a configuration file.
    #[error("Failed to read config file: {0}")]
    ConfigReadError(#[from] io::Error),

    /// Error parsing YAML configuration.
    #[error("Invalid YAML format: {0}")]
    ConfigParseError(#[from] serde_yaml::Error),

    /// A `${VAR}` reference in the config names an unset variable.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// A duration field could not be parsed.
    #[error("Invalid duration value: '{0}'")]
    InvalidDuration(String),

    /// The config file declares a version this build does not understand.
    #[error("Unsupported config version '{0}'")]
    UnsupportedVersion(String),

    /// The supervised command could not be spawned.
    #[error("Failed to launch '{command}': {source}")]
    LaunchError {
        /// Command line that failed to start.
        command: String,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },

    /// Configuration could not be reloaded before a relaunch.
    #[error("Configuration reload failed before relaunch: {0}")]
    ReloadFailed(Box<BootError>),
}

/// Failure of a best-effort external collaborator.
///
/// These are logged by the caller and never abort the boot sequence.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The external program could not be started.
    #[error("Failed to run '{program}': {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },

    /// The external program exited with a non-zero status.
    #[error("'{program}' exited with status {status:?}")]
    Failed {
        /// Program name.
        program: String,
        /// Exit code, `None` when killed by a signal.
        status: Option<i32>,
    },

    /// The external program did not finish in time and was killed.
    #[error("'{program}' timed out after {timeout:?}")]
    TimedOut {
        /// Program name.
        program: String,
        /// Time allowed.
        timeout: Duration,
    },

    /// Local I/O performed by a collaborator failed.
    #[error("Collaborator I/O failed: {0}")]
    Io(#[from] io::Error),
}
