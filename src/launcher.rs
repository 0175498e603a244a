//! Launching the supervised UI/engine process.
#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;
use std::{
    fmt,
    process::{Command, ExitStatus},
    sync::{
        Arc,
        atomic::{AtomicI32, Ordering},
    },
};

use nix::{
    sys::signal::{self, Signal},
    unistd::Pid,
};
use tracing::{debug, info, warn};

use crate::{
    config::BootConfig,
    constants::{DEFAULT_SHELL, SHELL_COMMAND_FLAG, SIGNAL_STATUS_OFFSET},
    error::BootError,
};

/// How the supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit code if the process exited normally.
    pub code: Option<i32>,
    /// Signal number if the process was killed by a signal.
    pub signal: Option<i32>,
}

impl ExitOutcome {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signaled(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// Single integer status, shell style: signal deaths become `128 + N`.
    pub fn status(&self) -> i32 {
        match (self.code, self.signal) {
            (Some(code), _) => code,
            (None, Some(signal)) => SIGNAL_STATUS_OFFSET + signal,
            (None, None) => SIGNAL_STATUS_OFFSET,
        }
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            #[cfg(unix)]
            signal: status.signal(),
            #[cfg(not(unix))]
            signal: None,
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(sig)) => match Signal::try_from(sig) {
                Ok(name) => write!(f, "signal {name} ({sig})"),
                Err(_) => write!(f, "signal {sig}"),
            },
            (None, None) => f.write_str("unknown termination"),
        }
    }
}

/// Starts the supervised process and blocks until it exits.
pub trait ProcessLauncher {
    fn run(&mut self, config: &BootConfig) -> Result<ExitOutcome, BootError>;
}

/// Shared slot holding the PID of the running child, `0` when none.
#[derive(Debug, Clone, Default)]
pub struct ChildSlot(Arc<AtomicI32>);

impl ChildSlot {
    pub fn current(&self) -> Option<i32> {
        match self.0.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }

    fn set(&self, pid: Option<i32>) {
        self.0.store(pid.unwrap_or(0), Ordering::SeqCst);
    }

    /// Sends SIGTERM to the running child, if any.
    pub fn terminate(&self) {
        if let Some(pid) = self.current() {
            debug!("Forwarding SIGTERM to supervised pid {}", pid);
            if let Err(err) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
                warn!("Failed to signal supervised pid {}: {}", pid, err);
            }
        }
    }
}

/// Runs the UI command through `sh -c` with the configured environment.
#[derive(Debug, Default, Clone)]
pub struct ShellLauncher {
    child: ChildSlot,
}

impl ShellLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle used by signal handlers to reach the running child.
    pub fn child_slot(&self) -> ChildSlot {
        self.child.clone()
    }
}

impl ProcessLauncher for ShellLauncher {
    fn run(&mut self, config: &BootConfig) -> Result<ExitOutcome, BootError> {
        let mut cmd = Command::new(DEFAULT_SHELL);
        cmd.arg(SHELL_COMMAND_FLAG)
            .arg(&config.ui.command)
            .current_dir(&config.ui.working_dir)
            .envs(config.child_env());

        let launch_error = |source| BootError::LaunchError {
            command: config.ui.command.clone(),
            source,
        };

        let mut child = cmd.spawn().map_err(launch_error)?;
        let pid = child.id() as i32;
        self.child.set(Some(pid));
        info!("Started '{}' with pid {}", config.ui.command, pid);

        let status = child.wait();
        self.child.set(None);
        let outcome = ExitOutcome::from(status.map_err(launch_error)?);

        info!("'{}' finished with {}", config.ui.command, outcome);
        Ok(outcome)
    }
}
