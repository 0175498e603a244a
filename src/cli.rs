//! Command-line interface for synthboot.
use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::{
    constants::DEFAULT_CONFIG_FILE,
    exit_code::{RequestSignal, requested_status_for_signal},
};

/// Log levels in verbosity order; the index is the numeric shorthand.
const LOG_LEVELS: [(LevelFilter, &str); 6] = [
    (LevelFilter::OFF, "off"),
    (LevelFilter::ERROR, "error"),
    (LevelFilter::WARN, "warn"),
    (LevelFilter::INFO, "info"),
    (LevelFilter::DEBUG, "debug"),
    (LevelFilter::TRACE, "trace"),
];

/// `--log-level` value: a level name, a common alias, or 0-5.
#[derive(Clone, Copy, Debug)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    /// Directive for `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        LOG_LEVELS
            .iter()
            .find(|(level, _)| *level == self.0)
            .map(|(_, name)| *name)
            .unwrap_or("info")
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("log level cannot be empty".into());
        }

        if let Ok(number) = trimmed.parse::<usize>() {
            return LOG_LEVELS
                .get(number)
                .map(|(level, _)| LogLevelArg(*level))
                .ok_or_else(|| format!("unsupported log level number '{number}' (expected 0-5)"));
        }

        let name = match trimmed.to_ascii_lowercase().as_str() {
            "err" => "error".to_string(),
            "warning" => "warn".to_string(),
            "information" => "info".to_string(),
            other => other.to_string(),
        };
        LOG_LEVELS
            .iter()
            .find(|(_, candidate)| *candidate == name)
            .map(|(level, _)| LogLevelArg(*level))
            .ok_or_else(|| format!("invalid log level '{trimmed}'"))
    }
}

/// Exit status given either as a number or as the signal the UI traps
/// ("SIGQUIT", "hup", ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusArg {
    pub status: i32,
    pub signal: Option<RequestSignal>,
}

impl FromStr for StatusArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if let Ok(status) = trimmed.parse::<i32>() {
            return Ok(StatusArg {
                status,
                signal: None,
            });
        }

        let signal = RequestSignal::from_str(trimmed).map_err(|_| {
            format!("invalid status '{trimmed}' (expected a number or SIGHUP/SIGINT/SIGQUIT/SIGTERM)")
        })?;
        Ok(StatusArg {
            status: requested_status_for_signal(signal),
            signal: Some(signal),
        })
    }
}

/// Command-line interface for synthboot.
#[derive(Parser)]
#[command(name = "synthboot", version, author)]
#[command(about = "Boot-time supervisor for an embedded audio workstation", long_about = None)]
pub struct Cli {
    /// Override the logging verbosity for this invocation only.
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for synthboot.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the boot checks and supervise the UI until it requests a terminal action.
    Run {
        /// Path to the configuration file (defaults to `synthboot.yaml`).
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,
    },

    /// Show what the supervisor does for a given exit status.
    Explain {
        /// Exit status (e.g. `139`) or trapped signal name (e.g. `SIGQUIT`).
        #[arg(allow_negative_numbers = true)]
        status: StatusArg,
    },

    /// Load the configuration and print the resolved settings.
    Check {
        /// Path to the configuration file (defaults to `synthboot.yaml`).
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,
    },
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
