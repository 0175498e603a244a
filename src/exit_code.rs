//! Translation of supervised-process exit statuses into supervisor actions.
//!
//! The mapping is a fixed table: the four reserved codes select a terminal or
//! restart action, every other status selects the recovery fallback with a
//! short fault label that is shown on the diagnostic splash.
use std::fmt;

use nix::sys::signal::Signal;
use strum_macros::{AsRefStr, EnumString};

use crate::constants::{
    EXIT_CLEAN, EXIT_REBOOT, EXIT_RESTART_UI, EXIT_SHUTDOWN, SIGNAL_STATUS_OFFSET,
};

/// Known fault codes and their on-screen mnemonics.
const FAULT_LABELS: &[(i32, &str)] = &[
    (1, "Software"),
    (139, "SegFault"),
    (200, "Zyncore"),
    (201, "Control I/O"),
    (202, "Audio/MIDI"),
    (203, "CV/Gate"),
];

/// Short human-readable label for a fault status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultLabel(String);

impl FaultLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FaultLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the label for `status`. Total: unknown codes render as `ErrCode N`.
pub fn fault_label(status: i32) -> FaultLabel {
    let label = FAULT_LABELS
        .iter()
        .find(|(code, _)| *code == status)
        .map(|(_, label)| (*label).to_string())
        .unwrap_or_else(|| format!("ErrCode {status}"));
    FaultLabel(label)
}

/// What the supervisor does after the supervised process exits.
#[derive(Debug, Clone, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    /// Power the appliance off.
    Shutdown,
    /// Reboot the appliance.
    Reboot,
    /// Stop supervising without relaunching.
    Exit,
    /// Relaunch the UI after a pause.
    RestartUi,
    /// Show a diagnostic splash, raise the recovery network and relaunch.
    RecoveryFallback(FaultLabel),
}

impl Action {
    /// Maps a raw exit status to its action. Pure and total.
    pub fn from_status(status: i32) -> Self {
        match status {
            EXIT_SHUTDOWN => Action::Shutdown,
            EXIT_REBOOT => Action::Reboot,
            EXIT_CLEAN => Action::Exit,
            EXIT_RESTART_UI => Action::RestartUi,
            other => Action::RecoveryFallback(fault_label(other)),
        }
    }

    /// Whether this action ends the supervision session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Action::Shutdown | Action::Reboot | Action::Exit)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::RecoveryFallback(label) => {
                write!(f, "{} ({})", self.as_ref(), label)
            }
            _ => f.write_str(self.as_ref()),
        }
    }
}

/// Signals the UI process traps and turns into a requested exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum RequestSignal {
    #[strum(serialize = "SIGHUP", serialize = "HUP")]
    Hangup,
    #[strum(serialize = "SIGINT", serialize = "INT")]
    Interrupt,
    #[strum(serialize = "SIGQUIT", serialize = "QUIT")]
    Quit,
    #[strum(serialize = "SIGTERM", serialize = "TERM")]
    Terminate,
}

/// Exit status the UI reports after trapping `signal`.
///
/// Hang-up powers off, interrupt reboots, quit restarts the UI and terminate
/// exits without relaunch.
pub fn requested_status_for_signal(signal: RequestSignal) -> i32 {
    match signal {
        RequestSignal::Hangup => EXIT_SHUTDOWN,
        RequestSignal::Interrupt => EXIT_REBOOT,
        RequestSignal::Quit => EXIT_RESTART_UI,
        RequestSignal::Terminate => EXIT_CLEAN,
    }
}

/// Signal encoded in a shell-style status (`128 + N`), if any.
pub fn signal_from_status(status: i32) -> Option<Signal> {
    if status <= SIGNAL_STATUS_OFFSET {
        return None;
    }
    Signal::try_from(status - SIGNAL_STATUS_OFFSET).ok()
}
