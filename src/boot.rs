//! One-shot checks that run before the supervisor loop is entered.
//!
//! Order: native driver build, first-boot provisioning, hardware test. The
//! last two can end the session early with a [`Halt`].
use std::time::Duration;

use tracing::{error, info, warn};

use crate::{
    clock::Clock,
    config::BootConfig,
    constants::{
        CONFIGURING_MESSAGE, DEFAULT_SHELL, PROVISIONING_FAILED_MESSAGE,
        SHELL_COMMAND_FLAG, WAIT_MESSAGE,
    },
    probe::{HardwareProber, ProbeReport},
    shell::run_program,
    splash::{Background, SplashMessage, SplashPresenter, SplashRequest, present_best_effort},
    supervisor::SupervisorState,
};

/// Driver builds compile C code on slow boards.
const DRIVER_BUILD_TIMEOUT: Duration = Duration::from_secs(1800);

/// Why the session stopped before the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    /// First-boot provisioning did not finish within its window.
    ProvisioningTimeout,
    /// The hardware test failed and no control-board test was requested.
    HardwareTestFailed(ProbeReport),
}

/// What the process does after a halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltDisposition {
    /// Keep the error on screen until an operator reboots.
    BlockForever,
    /// Exit the supervisor.
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Halt {
    pub reason: HaltReason,
    pub disposition: HaltDisposition,
}

/// Result of the pre-loop gating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Proceed,
    Halt(Halt),
}

/// Result of the driver artifact check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverOutcome {
    NotConfigured,
    Present,
    Built,
    BuildFailed,
}

/// Runs the pre-loop checks against the given collaborators.
pub struct BootSequence<'a> {
    splash: &'a dyn SplashPresenter,
    prober: &'a dyn HardwareProber,
    clock: &'a dyn Clock,
}

impl<'a> BootSequence<'a> {
    pub fn new(
        splash: &'a dyn SplashPresenter,
        prober: &'a dyn HardwareProber,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            splash,
            prober,
            clock,
        }
    }

    /// Runs every gate in order and records what happened in `state`.
    pub fn prepare(&self, config: &BootConfig, state: &mut SupervisorState) -> Gate {
        self.ensure_driver(config);

        if let Some(halt) = self.await_first_boot(config, state) {
            return Gate::Halt(halt);
        }

        if let Some(halt) = self.run_hardware_test(config, state) {
            return Gate::Halt(halt);
        }

        Gate::Proceed
    }

    /// Builds the native driver if its artifact is missing.
    pub fn ensure_driver(&self, config: &BootConfig) -> DriverOutcome {
        let Some(driver) = &config.driver else {
            return DriverOutcome::NotConfigured;
        };
        if driver.artifact.exists() {
            return DriverOutcome::Present;
        }

        info!(
            "Driver artifact {} missing; building it",
            driver.artifact.display()
        );
        present_best_effort(
            self.splash,
            &SplashRequest::Message(SplashMessage::text(WAIT_MESSAGE).on(Background::Wait)),
            &config.splash,
        );

        match run_program(
            DEFAULT_SHELL,
            &[SHELL_COMMAND_FLAG, driver.build_command.as_str()],
            Some(driver.working_dir.as_path()),
            DRIVER_BUILD_TIMEOUT,
        ) {
            Ok(_) if driver.artifact.exists() => {
                info!("Driver built at {}", driver.artifact.display());
                DriverOutcome::Built
            }
            Ok(_) => {
                error!(
                    "Driver build finished but {} is still missing",
                    driver.artifact.display()
                );
                DriverOutcome::BuildFailed
            }
            Err(err) => {
                error!("Driver build failed: {}", err);
                DriverOutcome::BuildFailed
            }
        }
    }

    /// Waits for first-boot provisioning when its marker is present.
    ///
    /// Provisioning is done when the marker disappears. If it is still there
    /// after the window, the error splash is shown and the session halts.
    pub fn await_first_boot(
        &self,
        config: &BootConfig,
        state: &mut SupervisorState,
    ) -> Option<Halt> {
        let marker = &config.first_boot_marker;
        if !marker.exists() {
            return None;
        }

        state.first_boot = true;
        info!("First boot detected ({}); waiting for provisioning", marker.display());
        present_best_effort(
            self.splash,
            &SplashRequest::Message(
                SplashMessage::text(CONFIGURING_MESSAGE).on(Background::Configuring),
            ),
            &config.splash,
        );

        let window = config.timings.first_boot_window;
        let poll = config.timings.first_boot_poll.max(Duration::from_secs(1));
        let mut waited = Duration::ZERO;
        while waited < window {
            let step = poll.min(window - waited);
            self.clock.sleep(step);
            waited += step;
            if !marker.exists() {
                info!("Provisioning finished after {:?}", waited);
                return None;
            }
        }

        error!("Provisioning did not finish within {:?}", window);
        present_best_effort(
            self.splash,
            &SplashRequest::Message(
                SplashMessage::text(PROVISIONING_FAILED_MESSAGE).on(Background::Error),
            ),
            &config.splash,
        );
        Some(Halt {
            reason: HaltReason::ProvisioningTimeout,
            disposition: HaltDisposition::BlockForever,
        })
    }

    /// Runs the hardware test when one is requested.
    pub fn run_hardware_test(
        &self,
        config: &BootConfig,
        state: &mut SupervisorState,
    ) -> Option<Halt> {
        let target = config.hw_test.as_deref()?;
        state.hw_test_requested = true;

        let report = self.prober.probe(target);
        if report.passed() {
            info!("Hardware test '{}' passed: {}", target, report.message);
            return None;
        }

        error!("Hardware test '{}' failed: {}", target, report.message);
        let diagnostic = SplashMessage {
            text: Some(report.message.clone()),
            address: None,
            error_label: Some(format!("HW test {target}")),
            background: Background::Error,
        };
        present_best_effort(self.splash, &SplashRequest::Message(diagnostic), &config.splash);

        if config.control_test {
            warn!("Control-board test requested; starting the UI despite the failure");
            return None;
        }

        self.clock.sleep(config.timings.hw_test_cooldown);
        Some(Halt {
            reason: HaltReason::HardwareTestFailed(report),
            disposition: HaltDisposition::Exit,
        })
    }
}
