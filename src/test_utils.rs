//! In-memory collaborators for exercising the boot sequence and the
//! supervisor loop without touching the display, the network or the power
//! state of the machine.
//!
//! Every fake appends to a shared [`EventLog`] so tests can assert on the
//! order of side effects across collaborators.
use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    path::Path,
    rc::Rc,
    time::Duration,
};

use crate::{
    clock::Clock,
    config::{BootConfig, ConfigSource, SplashSettings, parse_config},
    constants::EXIT_CLEAN,
    error::{BootError, CollaboratorError},
    launcher::{ExitOutcome, ProcessLauncher},
    network::{HostAddress, RecoveryNetwork},
    power::PowerControl,
    probe::{HardwareProber, ProbeReport},
    splash::{SplashPresenter, SplashRequest},
};

/// A side effect observed by one of the fakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Launch(usize),
    Splash(SplashRequest),
    Reload,
    NetworkQuery,
    NetworkActivate(String),
    Sleep(Duration),
    Probe(String),
    PowerOff,
    Reboot,
    BacklightOff,
}

/// Shared, ordered record of side effects.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.0.borrow().iter().filter(|e| predicate(e)).count()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Minimal config rooted at `dir` with the given UI command.
pub fn sample_config(dir: &Path, command: &str) -> BootConfig {
    let yaml = format!(
        r#"
version: "1"
paths:
  config_dir: {root}/config
  ui_dir: {root}/ui
  runtime_dir: {root}/run
ui:
  command: '{command}'
"#,
        root = dir.display(),
    );
    match parse_config(&yaml, dir) {
        Ok(config) => config,
        Err(err) => panic!("sample config must parse: {err}"),
    }
}

/// Records sleeps instead of blocking.
#[derive(Debug, Clone)]
pub struct FakeClock {
    log: EventLog,
    slept: Cell<Duration>,
}

impl FakeClock {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            slept: Cell::new(Duration::ZERO),
        }
    }

    /// Total virtual time spent sleeping.
    pub fn total_slept(&self) -> Duration {
        self.slept.get()
    }
}

impl Clock for FakeClock {
    fn sleep(&self, duration: Duration) {
        self.slept.set(self.slept.get() + duration);
        self.log.push(Event::Sleep(duration));
    }
}

/// Records splash requests; optionally fails every one of them.
#[derive(Debug, Clone)]
pub struct RecordingSplash {
    log: EventLog,
    fail: bool,
}

impl RecordingSplash {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            fail: false,
        }
    }

    pub fn failing(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            fail: true,
        }
    }
}

impl SplashPresenter for RecordingSplash {
    fn present(
        &self,
        request: &SplashRequest,
        _settings: &SplashSettings,
    ) -> Result<(), CollaboratorError> {
        self.log.push(Event::Splash(request.clone()));
        if self.fail {
            return Err(CollaboratorError::Failed {
                program: "xloadimage".into(),
                status: Some(1),
            });
        }
        Ok(())
    }
}

/// Network with a mutable list of active connections.
#[derive(Debug, Clone)]
pub struct FakeNetwork {
    log: EventLog,
    active: RefCell<Vec<String>>,
}

impl FakeNetwork {
    pub fn new(log: &EventLog, active: &[&str]) -> Self {
        Self {
            log: log.clone(),
            active: RefCell::new(active.iter().map(|s| s.to_string()).collect()),
        }
    }

    pub fn active(&self) -> Vec<String> {
        self.active.borrow().clone()
    }
}

impl RecoveryNetwork for FakeNetwork {
    fn active_connections(&self) -> Result<Vec<String>, CollaboratorError> {
        self.log.push(Event::NetworkQuery);
        Ok(self.active.borrow().clone())
    }

    fn activate(&self, connection: &str) -> Result<(), CollaboratorError> {
        self.log.push(Event::NetworkActivate(connection.to_string()));
        let mut active = self.active.borrow_mut();
        if !active.iter().any(|c| c == connection) {
            active.push(connection.to_string());
        }
        Ok(())
    }
}

/// Always reports the same address.
#[derive(Debug, Clone)]
pub struct FixedAddress(pub String);

impl HostAddress for FixedAddress {
    fn current_address(&self) -> String {
        self.0.clone()
    }
}

/// Records power actions; `power_off` can be made to fail.
#[derive(Debug, Clone)]
pub struct RecordingPower {
    log: EventLog,
    refuse_power_off: bool,
}

impl RecordingPower {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            refuse_power_off: false,
        }
    }

    /// `power_off` is recorded but reports failure, as when not run as root.
    pub fn refusing_power_off(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            refuse_power_off: true,
        }
    }
}

impl PowerControl for RecordingPower {
    fn power_off(&self) -> Result<(), CollaboratorError> {
        self.log.push(Event::PowerOff);
        if self.refuse_power_off {
            return Err(CollaboratorError::Failed {
                program: "poweroff".into(),
                status: Some(1),
            });
        }
        Ok(())
    }

    fn reboot(&self) -> Result<(), CollaboratorError> {
        self.log.push(Event::Reboot);
        Ok(())
    }

    fn backlight_off(&self, _bl_power: Option<&Path>) -> Result<(), CollaboratorError> {
        self.log.push(Event::BacklightOff);
        Ok(())
    }
}

/// Returns pre-programmed outcomes, then a clean exit once exhausted.
#[derive(Debug)]
pub struct ScriptedLauncher {
    log: EventLog,
    outcomes: VecDeque<ExitOutcome>,
    launches: usize,
}

impl ScriptedLauncher {
    pub fn new(log: &EventLog, statuses: &[i32]) -> Self {
        Self::with_outcomes(log, statuses.iter().map(|s| ExitOutcome::exited(*s)))
    }

    pub fn with_outcomes(log: &EventLog, outcomes: impl IntoIterator<Item = ExitOutcome>) -> Self {
        Self {
            log: log.clone(),
            outcomes: outcomes.into_iter().collect(),
            launches: 0,
        }
    }

    pub fn launches(&self) -> usize {
        self.launches
    }
}

impl ProcessLauncher for ScriptedLauncher {
    fn run(&mut self, _config: &BootConfig) -> Result<ExitOutcome, BootError> {
        self.launches += 1;
        self.log.push(Event::Launch(self.launches));
        Ok(self
            .outcomes
            .pop_front()
            .unwrap_or_else(|| ExitOutcome::exited(EXIT_CLEAN)))
    }
}

/// Hands out clones of a fixed config, optionally failing after `fail_after` loads.
#[derive(Debug)]
pub struct StaticConfigSource {
    log: EventLog,
    config: BootConfig,
    loads: Cell<usize>,
    fail_after: Option<usize>,
}

impl StaticConfigSource {
    pub fn new(log: &EventLog, config: BootConfig) -> Self {
        Self {
            log: log.clone(),
            config,
            loads: Cell::new(0),
            fail_after: None,
        }
    }

    pub fn failing_after(mut self, loads: usize) -> Self {
        self.fail_after = Some(loads);
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.get()
    }
}

impl ConfigSource for StaticConfigSource {
    fn load(&self) -> Result<BootConfig, BootError> {
        self.log.push(Event::Reload);
        let loads = self.loads.get() + 1;
        self.loads.set(loads);
        if let Some(limit) = self.fail_after
            && loads > limit
        {
            return Err(BootError::InvalidDuration("broken".into()));
        }
        Ok(self.config.clone())
    }
}

/// Prober with a fixed verdict.
#[derive(Debug, Clone)]
pub struct FakeProber {
    log: EventLog,
    report: ProbeReport,
}

impl FakeProber {
    pub fn new(log: &EventLog, report: ProbeReport) -> Self {
        Self {
            log: log.clone(),
            report,
        }
    }
}

impl HardwareProber for FakeProber {
    fn probe(&self, target: &str) -> ProbeReport {
        self.log.push(Event::Probe(target.to_string()));
        self.report.clone()
    }
}
