//! Exit-status driven supervisor loop.
//!
//! The loop launches the UI, waits for it, maps its status to an [`Action`]
//! and performs that action's side effects before either terminating the
//! session or relaunching. Side effects of one iteration always finish before
//! the next launch, so the splash on screen belongs to the latest failure.
use strum_macros::AsRefStr;
use tracing::{debug, error, info, warn};

use crate::{
    clock::Clock,
    config::{BootConfig, ConfigSource},
    constants::EXIT_LAUNCH_FAILURE,
    error::BootError,
    exit_code::{Action, FaultLabel, signal_from_status},
    launcher::ProcessLauncher,
    network::{HostAddress, RecoveryNetwork, ensure_fallback_network},
    power::PowerControl,
    splash::{SplashMessage, SplashPresenter, SplashRequest, present_best_effort},
};

/// Mutable record owned by the loop for one supervision session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorState {
    /// Status of the most recent child, `None` before the first exit.
    pub last_exit_status: Option<i32>,
    /// First-boot provisioning ran in this session.
    pub first_boot: bool,
    /// A hardware test was requested in this session.
    pub hw_test_requested: bool,
    /// Number of relaunches so far.
    pub restarts: u32,
}

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum LoopPhase {
    Starting,
    Running,
    Deciding,
    Restarting,
    Terminated,
}

/// How the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Termination {
    Shutdown,
    Reboot,
    Exit,
}

/// External capabilities the loop drives.
pub struct Collaborators<'a> {
    pub config_source: &'a dyn ConfigSource,
    pub launcher: &'a mut dyn ProcessLauncher,
    pub splash: &'a dyn SplashPresenter,
    pub network: &'a dyn RecoveryNetwork,
    pub address: &'a dyn HostAddress,
    pub power: &'a dyn PowerControl,
    pub clock: &'a dyn Clock,
}

/// The supervisor loop. Single-threaded; one child at a time.
pub struct Supervisor<'a> {
    deps: Collaborators<'a>,
    config: BootConfig,
    state: SupervisorState,
    phase: LoopPhase,
    ended: Option<Termination>,
}

impl<'a> Supervisor<'a> {
    /// Creates a supervisor in the `Starting` phase with an already loaded config.
    pub fn new(deps: Collaborators<'a>, config: BootConfig, state: SupervisorState) -> Self {
        Self {
            deps,
            config,
            state,
            phase: LoopPhase::Starting,
            ended: None,
        }
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    /// Runs until a terminal exit status is seen.
    ///
    /// Only a failed configuration reload ends the loop with an error.
    pub fn run(&mut self) -> Result<Termination, BootError> {
        info!("Supervisor starting");
        loop {
            if let Some(termination) = self.step()? {
                return Ok(termination);
            }
        }
    }

    /// Performs one launch/decide cycle.
    ///
    /// Returns `Some` when the session has terminated. Once terminated, the
    /// child is never launched again.
    pub fn step(&mut self) -> Result<Option<Termination>, BootError> {
        if self.phase == LoopPhase::Terminated {
            return Ok(self.ended);
        }

        self.enter(LoopPhase::Running);
        let status = self.launch();
        self.state.last_exit_status = Some(status);

        self.enter(LoopPhase::Deciding);
        let action = Action::from_status(status);
        info!("UI exited with status {} -> {}", status, action);

        let termination = match action {
            Action::Shutdown => Some(Termination::Shutdown),
            Action::Reboot => Some(Termination::Reboot),
            Action::Exit => Some(Termination::Exit),
            Action::RestartUi => {
                self.enter(LoopPhase::Restarting);
                self.restart_ui()?;
                None
            }
            Action::RecoveryFallback(label) => {
                self.enter(LoopPhase::Restarting);
                self.recover(status, &label)?;
                None
            }
        };

        match termination {
            Some(termination) => {
                self.terminate(termination);
                Ok(Some(termination))
            }
            None => {
                self.state.restarts += 1;
                Ok(None)
            }
        }
    }

    fn enter(&mut self, phase: LoopPhase) {
        debug!("Supervisor phase {} -> {}", self.phase.as_ref(), phase.as_ref());
        self.phase = phase;
    }

    fn launch(&mut self) -> i32 {
        match self.deps.launcher.run(&self.config) {
            Ok(outcome) => outcome.status(),
            Err(err) => {
                error!("{}", err);
                EXIT_LAUNCH_FAILURE
            }
        }
    }

    fn reload(&mut self) -> Result<(), BootError> {
        match self.deps.config_source.load() {
            Ok(config) => {
                self.config = config;
                debug!("Configuration reloaded");
                Ok(())
            }
            Err(err) => {
                error!("Configuration reload failed: {}", err);
                Err(BootError::ReloadFailed(Box::new(err)))
            }
        }
    }

    fn pause(&self) {
        let delay = self.config.timings.restart_delay;
        debug!("Waiting {:?} before relaunch", delay);
        self.deps.clock.sleep(delay);
    }

    fn restart_ui(&mut self) -> Result<(), BootError> {
        info!("Restart requested; relaunching UI");
        present_best_effort(self.deps.splash, &SplashRequest::Last, &self.config.splash);
        self.reload()?;
        self.pause();
        Ok(())
    }

    fn recover(&mut self, status: i32, label: &FaultLabel) -> Result<(), BootError> {
        match signal_from_status(status) {
            Some(signal) => warn!("UI killed by {} ({}); entering recovery", signal, label),
            None => warn!("UI failed with status {} ({}); entering recovery", status, label),
        }

        let address = self.deps.address.current_address();
        let message = SplashMessage::fault(address, label.as_str());
        present_best_effort(
            self.deps.splash,
            &SplashRequest::Message(message),
            &self.config.splash,
        );
        self.reload()?;
        let outcome = ensure_fallback_network(self.deps.network, &self.config.network);
        debug!("Recovery network: {:?}", outcome);
        self.pause();
        Ok(())
    }

    fn terminate(&mut self, termination: Termination) {
        present_best_effort(self.deps.splash, &SplashRequest::Last, &self.config.splash);

        let backlight = self.config.backlight.as_deref();
        if matches!(termination, Termination::Shutdown | Termination::Exit)
            && let Err(err) = self.deps.power.backlight_off(backlight)
        {
            error!("Switching the backlight off failed: {}", err);
        }

        let result = match termination {
            Termination::Shutdown => self.deps.power.power_off(),
            Termination::Reboot => self.deps.power.reboot(),
            Termination::Exit => Ok(()),
        };
        if let Err(err) = result {
            error!("System action '{}' failed: {}", termination.as_ref(), err);
        }

        self.ended = Some(termination);
        self.enter(LoopPhase::Terminated);
        info!("Supervision ended: {}", termination.as_ref());
    }
}
