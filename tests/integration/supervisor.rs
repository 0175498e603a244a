#[path = "common/mod.rs"]
mod common;

use std::{fs, time::Duration};

use common::{Fakes, HOST_ADDRESS, config_in};
use synthboot::{
    config::BootConfig,
    error::BootError,
    launcher::{ExitOutcome, ProcessLauncher, ShellLauncher},
    splash::{SplashMessage, SplashRequest},
    supervisor::{Collaborators, LoopPhase, Supervisor, SupervisorState, Termination},
    test_utils::{
        Event, FakeNetwork, RecordingPower, RecordingSplash, ScriptedLauncher, StaticConfigSource,
        sample_config,
    },
};
use tempfile::tempdir;

const RESTART_DELAY: Duration = Duration::from_secs(10);

#[test]
fn shutdown_status_powers_off_without_relaunch() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = config_in(temp.path());
    let fakes = Fakes::new(&config);
    let mut launcher = ScriptedLauncher::new(&fakes.log, &[0]);

    let mut supervisor =
        Supervisor::new(fakes.collaborators(&mut launcher), config, SupervisorState::default());
    assert_eq!(supervisor.run().unwrap(), Termination::Shutdown);
    assert_eq!(supervisor.phase(), LoopPhase::Terminated);
    assert_eq!(supervisor.state().last_exit_status, Some(0));

    // A terminated supervisor never launches again.
    assert_eq!(supervisor.step().unwrap(), Some(Termination::Shutdown));
    drop(supervisor);

    assert_eq!(
        fakes.log.events(),
        vec![
            Event::Launch(1),
            Event::Splash(SplashRequest::Last),
            Event::BacklightOff,
            Event::PowerOff,
        ]
    );
}

#[test]
fn backlight_goes_off_even_when_power_off_fails() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = config_in(temp.path());
    let mut fakes = Fakes::new(&config);
    fakes.power = RecordingPower::refusing_power_off(&fakes.log);
    let mut launcher = ScriptedLauncher::new(&fakes.log, &[0]);

    let mut supervisor =
        Supervisor::new(fakes.collaborators(&mut launcher), config, SupervisorState::default());
    assert_eq!(supervisor.run().unwrap(), Termination::Shutdown);
    assert_eq!(supervisor.phase(), LoopPhase::Terminated);
    drop(supervisor);

    assert_eq!(fakes.log.count(|e| *e == Event::BacklightOff), 1);
    assert_eq!(fakes.log.count(|e| *e == Event::PowerOff), 1);
    assert_eq!(fakes.launches(), 1);
}

#[test]
fn restart_request_reloads_pauses_and_relaunches() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = config_in(temp.path());
    let fakes = Fakes::new(&config);
    let mut launcher = ScriptedLauncher::new(&fakes.log, &[102, 101]);

    let mut supervisor =
        Supervisor::new(fakes.collaborators(&mut launcher), config, SupervisorState::default());
    assert_eq!(supervisor.run().unwrap(), Termination::Exit);
    assert_eq!(supervisor.state().restarts, 1);
    drop(supervisor);

    assert_eq!(
        fakes.log.events(),
        vec![
            Event::Launch(1),
            Event::Splash(SplashRequest::Last),
            Event::Reload,
            Event::Sleep(RESTART_DELAY),
            Event::Launch(2),
            Event::Splash(SplashRequest::Last),
            Event::BacklightOff,
        ]
    );
}

#[test]
fn labelled_fault_shows_diagnostic_and_raises_recovery_network() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = config_in(temp.path());
    let fakes = Fakes::new(&config);
    let mut launcher = ScriptedLauncher::new(&fakes.log, &[203, 101]);

    let mut supervisor =
        Supervisor::new(fakes.collaborators(&mut launcher), config, SupervisorState::default());
    assert_eq!(supervisor.run().unwrap(), Termination::Exit);
    drop(supervisor);

    let events = fakes.log.events();
    assert_eq!(
        &events[..6],
        &[
            Event::Launch(1),
            Event::Splash(SplashRequest::Message(SplashMessage::fault(
                HOST_ADDRESS,
                "CV/Gate"
            ))),
            Event::Reload,
            Event::NetworkQuery,
            Event::NetworkActivate("recovery-ap".into()),
            Event::Sleep(RESTART_DELAY),
        ]
    );
    assert_eq!(events[6], Event::Launch(2));
    assert_eq!(fakes.network.active(), vec!["eth0", "recovery-ap"]);
}

#[test]
fn unmapped_status_takes_recovery_path_with_generic_label() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = config_in(temp.path());
    let fakes = Fakes::new(&config);
    let mut launcher = ScriptedLauncher::new(&fakes.log, &[7]);

    let mut supervisor =
        Supervisor::new(fakes.collaborators(&mut launcher), config, SupervisorState::default());
    assert_eq!(supervisor.step().unwrap(), None);
    assert_eq!(supervisor.phase(), LoopPhase::Restarting);
    assert_eq!(supervisor.state().last_exit_status, Some(7));
    drop(supervisor);

    assert_eq!(
        fakes.splashes(),
        vec![SplashRequest::Message(SplashMessage::fault(
            HOST_ADDRESS,
            "ErrCode 7"
        ))]
    );
    assert_eq!(fakes.log.count(|e| *e == Event::Reload), 1);
    assert_eq!(
        fakes
            .log
            .count(|e| matches!(e, Event::NetworkActivate(_))),
        1
    );
    assert_eq!(fakes.sleeps(), vec![RESTART_DELAY]);
}

#[test]
fn signal_death_is_reported_as_segfault() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = config_in(temp.path());
    let fakes = Fakes::new(&config);
    let mut launcher = ScriptedLauncher::with_outcomes(
        &fakes.log,
        [ExitOutcome::signaled(11), ExitOutcome::exited(101)],
    );

    let mut supervisor =
        Supervisor::new(fakes.collaborators(&mut launcher), config, SupervisorState::default());
    supervisor.run().unwrap();
    drop(supervisor);

    assert_eq!(
        fakes.splashes()[0],
        SplashRequest::Message(SplashMessage::fault(HOST_ADDRESS, "SegFault"))
    );
}

#[test]
fn terminal_statuses_never_touch_recovery() {
    for (status, expected) in [
        (0, Termination::Shutdown),
        (100, Termination::Reboot),
        (101, Termination::Exit),
    ] {
        let temp = tempdir().expect("failed to create tempdir");
        let config = config_in(temp.path());
        let fakes = Fakes::new(&config);
        let mut launcher = ScriptedLauncher::new(&fakes.log, &[status]);

        let mut supervisor = Supervisor::new(
            fakes.collaborators(&mut launcher),
            config,
            SupervisorState::default(),
        );
        assert_eq!(supervisor.run().unwrap(), expected);
        drop(supervisor);

        assert_eq!(fakes.launches(), 1, "status {status}");
        assert_eq!(fakes.log.count(|e| *e == Event::Reload), 0);
        assert_eq!(fakes.log.count(|e| *e == Event::NetworkQuery), 0);
        assert!(fakes.sleeps().is_empty());
    }
}

#[test]
fn reboot_status_reboots_once() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = config_in(temp.path());
    let fakes = Fakes::new(&config);
    let mut launcher = ScriptedLauncher::new(&fakes.log, &[100]);

    let mut supervisor =
        Supervisor::new(fakes.collaborators(&mut launcher), config, SupervisorState::default());
    supervisor.run().unwrap();
    drop(supervisor);

    assert_eq!(fakes.log.count(|e| *e == Event::Reboot), 1);
    assert_eq!(fakes.log.count(|e| *e == Event::PowerOff), 0);
}

#[test]
fn every_fault_status_reloads_and_checks_network() {
    for status in [1, 7, 127, 139, 200, 201, 202, 255, -1] {
        let temp = tempdir().expect("failed to create tempdir");
        let config = config_in(temp.path());
        let fakes = Fakes::new(&config);
        let mut launcher = ScriptedLauncher::new(&fakes.log, &[status]);

        let mut supervisor = Supervisor::new(
            fakes.collaborators(&mut launcher),
            config,
            SupervisorState::default(),
        );
        assert_eq!(supervisor.step().unwrap(), None, "status {status}");
        drop(supervisor);

        assert_eq!(fakes.log.count(|e| *e == Event::Reload), 1, "status {status}");
        assert_eq!(
            fakes.log.count(|e| *e == Event::NetworkQuery),
            1,
            "status {status}"
        );
    }
}

#[test]
fn recovery_network_is_raised_only_once() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = config_in(temp.path());
    let fakes = Fakes::new(&config);
    let mut launcher = ScriptedLauncher::new(&fakes.log, &[203, 1, 139, 101]);

    let mut supervisor =
        Supervisor::new(fakes.collaborators(&mut launcher), config, SupervisorState::default());
    supervisor.run().unwrap();
    assert_eq!(supervisor.state().restarts, 3);
    drop(supervisor);

    assert_eq!(fakes.log.count(|e| *e == Event::NetworkQuery), 3);
    assert_eq!(
        fakes
            .log
            .count(|e| matches!(e, Event::NetworkActivate(_))),
        1
    );
}

#[test]
fn recovery_network_stays_down_when_enough_links_are_up() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = config_in(temp.path());
    let mut fakes = Fakes::new(&config);
    fakes.network = FakeNetwork::new(&fakes.log, &["eth0", "wlan0"]);
    let mut launcher = ScriptedLauncher::new(&fakes.log, &[1]);

    let mut supervisor =
        Supervisor::new(fakes.collaborators(&mut launcher), config, SupervisorState::default());
    supervisor.run().unwrap();
    drop(supervisor);

    assert_eq!(
        fakes
            .log
            .count(|e| matches!(e, Event::NetworkActivate(_))),
        0
    );
}

#[test]
fn reloaded_config_applies_to_the_next_pause() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = config_in(temp.path());
    let mut fakes = Fakes::new(&config);

    let mut reloaded = config.clone();
    reloaded.timings.restart_delay = Duration::from_secs(2);
    reloaded.ui.command = "./ui_next".into();
    fakes.source = StaticConfigSource::new(&fakes.log, reloaded);
    let mut launcher = ScriptedLauncher::new(&fakes.log, &[102, 101]);

    let mut supervisor =
        Supervisor::new(fakes.collaborators(&mut launcher), config, SupervisorState::default());
    supervisor.run().unwrap();
    assert_eq!(supervisor.config().ui.command, "./ui_next");
    drop(supervisor);

    assert_eq!(fakes.sleeps(), vec![Duration::from_secs(2)]);
}

#[test]
fn failed_reload_is_fatal() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = config_in(temp.path());
    let mut fakes = Fakes::new(&config);
    fakes.source = StaticConfigSource::new(&fakes.log, config.clone()).failing_after(0);
    let mut launcher = ScriptedLauncher::new(&fakes.log, &[202]);

    let mut supervisor =
        Supervisor::new(fakes.collaborators(&mut launcher), config, SupervisorState::default());
    let err = supervisor.run().unwrap_err();
    assert!(matches!(err, BootError::ReloadFailed(_)));
    drop(supervisor);

    assert_eq!(fakes.launches(), 1);
    assert!(fakes.sleeps().is_empty());
}

#[test]
fn splash_failures_do_not_stop_the_loop() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = config_in(temp.path());
    let mut fakes = Fakes::new(&config);
    fakes.splash = RecordingSplash::failing(&fakes.log);
    let mut launcher = ScriptedLauncher::new(&fakes.log, &[203, 0]);

    let mut supervisor =
        Supervisor::new(fakes.collaborators(&mut launcher), config, SupervisorState::default());
    assert_eq!(supervisor.run().unwrap(), Termination::Shutdown);
    drop(supervisor);

    assert_eq!(fakes.launches(), 2);
    assert_eq!(fakes.log.count(|e| *e == Event::PowerOff), 1);
}

struct FailingOnceLauncher {
    failed: bool,
}

impl ProcessLauncher for FailingOnceLauncher {
    fn run(&mut self, config: &BootConfig) -> Result<ExitOutcome, BootError> {
        if !self.failed {
            self.failed = true;
            return Err(BootError::LaunchError {
                command: config.ui.command.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            });
        }
        Ok(ExitOutcome::exited(101))
    }
}

#[test]
fn launch_failure_is_treated_as_a_fault() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = config_in(temp.path());
    let fakes = Fakes::new(&config);
    let mut launcher = FailingOnceLauncher { failed: false };

    let mut supervisor = Supervisor::new(
        Collaborators {
            config_source: &fakes.source,
            launcher: &mut launcher,
            splash: &fakes.splash,
            network: &fakes.network,
            address: &fakes.address,
            power: &fakes.power,
            clock: &fakes.clock,
        },
        config,
        SupervisorState::default(),
    );
    assert_eq!(supervisor.step().unwrap(), None);
    assert_eq!(supervisor.state().last_exit_status, Some(127));
    assert_eq!(supervisor.run().unwrap(), Termination::Exit);
    drop(supervisor);

    assert_eq!(
        fakes.splashes()[0],
        SplashRequest::Message(SplashMessage::fault(HOST_ADDRESS, "ErrCode 127"))
    );
}

#[test]
fn shell_launcher_drives_the_loop_end_to_end() {
    let temp = tempdir().expect("failed to create tempdir");
    fs::create_dir_all(temp.path().join("ui")).expect("failed to create ui dir");
    let counter = temp.path().join("ui").join("runs");
    // First run asks for a restart, second run exits cleanly.
    let config = sample_config(
        temp.path(),
        "if [ -f runs ]; then echo again >> runs; exit 101; else echo first > runs; exit 102; fi",
    );

    let fakes = Fakes::new(&config);
    let mut launcher = ShellLauncher::new();
    let mut supervisor = Supervisor::new(
        Collaborators {
            config_source: &fakes.source,
            launcher: &mut launcher,
            splash: &fakes.splash,
            network: &fakes.network,
            address: &fakes.address,
            power: &fakes.power,
            clock: &fakes.clock,
        },
        config,
        SupervisorState::default(),
    );
    assert_eq!(supervisor.run().unwrap(), Termination::Exit);
    assert_eq!(supervisor.state().restarts, 1);
    assert_eq!(supervisor.state().last_exit_status, Some(101));
    drop(supervisor);

    let runs = fs::read_to_string(&counter).expect("ui did not run");
    assert_eq!(runs.lines().collect::<Vec<_>>(), vec!["first", "again"]);
    assert_eq!(fakes.log.count(|e| *e == Event::Reload), 1);
    assert_eq!(fakes.clock.total_slept(), RESTART_DELAY);
}
