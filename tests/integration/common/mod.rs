#![allow(dead_code)]

use std::{fs, path::Path, time::Duration};

use synthboot::{
    config::BootConfig,
    splash::SplashRequest,
    supervisor::Collaborators,
    test_utils::{
        Event, EventLog, FakeClock, FakeNetwork, FixedAddress, RecordingPower,
        RecordingSplash, ScriptedLauncher, StaticConfigSource, sample_config,
    },
};

pub const HOST_ADDRESS: &str = "192.168.1.23";

/// Every fake the supervisor needs, sharing one event log.
pub struct Fakes {
    pub log: EventLog,
    pub source: StaticConfigSource,
    pub splash: RecordingSplash,
    pub network: FakeNetwork,
    pub address: FixedAddress,
    pub power: RecordingPower,
    pub clock: FakeClock,
}

impl Fakes {
    pub fn new(config: &BootConfig) -> Self {
        let log = EventLog::default();
        Self {
            source: StaticConfigSource::new(&log, config.clone()),
            splash: RecordingSplash::new(&log),
            network: FakeNetwork::new(&log, &["eth0"]),
            address: FixedAddress(HOST_ADDRESS.into()),
            power: RecordingPower::new(&log),
            clock: FakeClock::new(&log),
            log,
        }
    }

    pub fn collaborators<'a>(&'a self, launcher: &'a mut ScriptedLauncher) -> Collaborators<'a> {
        Collaborators {
            config_source: &self.source,
            launcher,
            splash: &self.splash,
            network: &self.network,
            address: &self.address,
            power: &self.power,
            clock: &self.clock,
        }
    }

    pub fn splashes(&self) -> Vec<SplashRequest> {
        self.log
            .events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Splash(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn launches(&self) -> usize {
        self.log.count(|e| matches!(e, Event::Launch(_)))
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.log
            .events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Sleep(duration) => Some(duration),
                _ => None,
            })
            .collect()
    }
}

/// Config rooted in `dir` with the config and ui directories created.
pub fn config_in(dir: &Path) -> BootConfig {
    fs::create_dir_all(dir.join("config")).expect("failed to create config dir");
    fs::create_dir_all(dir.join("ui")).expect("failed to create ui dir");
    sample_config(dir, "true")
}

/// Writes a synthboot.yaml running `command` into `dir` and returns its path.
pub fn write_config(dir: &Path, command: &str, extra: &str) -> std::path::PathBuf {
    fs::create_dir_all(dir.join("config")).expect("failed to create config dir");
    fs::create_dir_all(dir.join("ui")).expect("failed to create ui dir");
    let path = dir.join("synthboot.yaml");
    fs::write(
        &path,
        format!(
            r#"version: "1"
paths:
  config_dir: config
  ui_dir: ui
  runtime_dir: run
ui:
  command: "{command}"
{extra}"#
        ),
    )
    .expect("failed to write config");
    path
}
