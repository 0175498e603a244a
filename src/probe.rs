//! One-shot hardware self-test.
use std::{fmt, time::Duration};

use tracing::{debug, warn};

use crate::{error::CollaboratorError, shell::run_program};

/// Hardware tests may exercise slow peripherals.
const PROBE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Ok,
    Fail,
}

/// Outcome of a hardware probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub status: ProbeStatus,
    /// Short diagnostic suitable for a splash line.
    pub message: String,
}

impl ProbeReport {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Ok,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Fail,
            message: message.into(),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == ProbeStatus::Ok
    }
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.status {
            ProbeStatus::Ok => "OK",
            ProbeStatus::Fail => "FAIL",
        };
        write!(f, "{}: {}", status, self.message)
    }
}

/// Runs a hardware diagnostic against a target.
pub trait HardwareProber {
    fn probe(&self, target: &str) -> ProbeReport;
}

/// Prober backed by an external test program called as `<program> <target>`.
///
/// Exit status 0 means pass. The last non-empty line of stdout becomes the
/// report message.
#[derive(Debug, Clone)]
pub struct CommandProber {
    program: String,
}

impl CommandProber {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

fn last_line(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(str::to_string)
}

impl HardwareProber for CommandProber {
    fn probe(&self, target: &str) -> ProbeReport {
        debug!("Running hardware test '{}' on '{}'", self.program, target);
        match run_program(&self.program, &[target], None, PROBE_TIMEOUT) {
            Ok(output) => ProbeReport::ok(
                last_line(&output).unwrap_or_else(|| format!("{target} passed")),
            ),
            Err(CollaboratorError::Failed { status, .. }) => {
                ProbeReport::fail(format!("{target} failed (status {status:?})"))
            }
            Err(err) => {
                warn!("Hardware test could not run: {}", err);
                ProbeReport::fail(format!("{target}: {err}"))
            }
        }
    }
}
