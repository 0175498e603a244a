//! Configuration management for synthboot.
//!
//! The config file is read into a raw serde model and then resolved into a
//! [`BootConfig`]: relative paths are anchored, durations parsed and the
//! environment of the supervised process assembled. A fresh `BootConfig` is
//! built on every reload; nothing here mutates the supervisor's own
//! environment.
use regex::Regex;
use serde::Deserialize;
use std::{
    collections::{BTreeMap, HashMap},
    env, fs,
    path::{Path, PathBuf},
    sync::OnceLock,
    time::Duration,
};
use tracing::{debug, error, warn};

use crate::{
    constants::{
        DEFAULT_CONFIG_FILE, DEFAULT_DISPLAY_PROGRAM, DEFAULT_FIRST_BOOT_POLL,
        DEFAULT_FIRST_BOOT_WINDOW, DEFAULT_HW_TEST_COOLDOWN,
        DEFAULT_MAX_ACTIVE_CONNECTIONS, DEFAULT_RECOVERY_CONNECTION,
        DEFAULT_RENDER_PROGRAM, DEFAULT_RESTART_DELAY, DEFAULT_SPLASH_FONT,
        DEFAULT_SPLASH_POINT_SIZE, ENV_CONFIG_DIR, ENV_CONTROL_TEST, ENV_DATA_DIR,
        ENV_LOG_LEVEL, ENV_MIDI_PROFILE, ENV_RAISE_EXCEPTIONS, ENV_RUNTIME_DIR,
        ENV_UI_DIR, MESSAGE_IMAGE_NAME, MIDI_PROFILE_DIR, MIDI_PROFILE_EXTENSION,
    },
    error::BootError,
};

const SUPPORTED_VERSION: &str = "1";

// ----------------------------------------------------------------------------
// Raw file model
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawConfig {
    version: String,
    paths: RawPaths,
    env: Option<EnvConfig>,
    midi_profile: Option<String>,
    ui: RawUi,
    verbosity: Option<String>,
    raise_exceptions: Option<bool>,
    hw_test: Option<String>,
    #[serde(default)]
    control_test: bool,
    restart_delay: Option<String>,
    hw_test_cooldown: Option<String>,
    #[serde(default)]
    splash: RawSplash,
    #[serde(default)]
    network: RawNetwork,
    #[serde(default)]
    first_boot: RawFirstBoot,
    driver: Option<RawDriver>,
    #[serde(default)]
    hardware: RawHardware,
    backlight: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawPaths {
    config_dir: PathBuf,
    ui_dir: PathBuf,
    data_dir: Option<PathBuf>,
    runtime_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawUi {
    command: String,
    working_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSplash {
    enabled: Option<bool>,
    boot_image: Option<PathBuf>,
    error_image: Option<PathBuf>,
    configuring_image: Option<PathBuf>,
    wait_image: Option<PathBuf>,
    render_program: Option<String>,
    display_program: Option<String>,
    font: Option<String>,
    point_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RawNetwork {
    recovery_connection: Option<String>,
    max_active_connections: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFirstBoot {
    marker: Option<PathBuf>,
    window: Option<String>,
    poll: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDriver {
    artifact: PathBuf,
    build_command: String,
    working_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RawHardware {
    test_command: Option<String>,
}

/// Environment variables handed to the supervised process.
#[derive(Debug, Deserialize, Clone)]
pub struct EnvConfig {
    /// Optional path to an env file.
    pub file: Option<String>,
    /// Key-value pairs of environment variables.
    pub vars: Option<HashMap<String, String>>,
}

impl EnvConfig {
    /// Resolves the full path to the env file based on a base directory.
    pub fn path(&self, base: &Path) -> Option<PathBuf> {
        self.file.as_ref().map(|f| resolve(base, Path::new(f)))
    }
}

// ----------------------------------------------------------------------------
// Resolved model
// ----------------------------------------------------------------------------

/// Directories the appliance software lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub config_dir: PathBuf,
    pub ui_dir: PathBuf,
    pub data_dir: PathBuf,
    /// Scratch directory for generated splash artifacts.
    pub runtime_dir: PathBuf,
}

/// How the supervised UI process is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiLaunch {
    /// Shell command line.
    pub command: String,
    pub working_dir: PathBuf,
}

/// Fixed pauses and windows used by the boot sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Pause between relaunches of the UI.
    pub restart_delay: Duration,
    /// Pause after a failed hardware test before exiting.
    pub hw_test_cooldown: Duration,
    /// Maximum time first-boot provisioning may take.
    pub first_boot_window: Duration,
    /// Interval between first-boot marker checks.
    pub first_boot_poll: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            restart_delay: DEFAULT_RESTART_DELAY,
            hw_test_cooldown: DEFAULT_HW_TEST_COOLDOWN,
            first_boot_window: DEFAULT_FIRST_BOOT_WINDOW,
            first_boot_poll: DEFAULT_FIRST_BOOT_POLL,
        }
    }
}

/// Images and programs used by the framebuffer splash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplashSettings {
    pub enabled: bool,
    pub boot_image: PathBuf,
    pub error_image: PathBuf,
    pub configuring_image: PathBuf,
    pub wait_image: PathBuf,
    /// Where the last rendered message is written.
    pub message_image: PathBuf,
    pub render_program: String,
    pub display_program: String,
    pub font: String,
    pub point_size: u32,
}

/// Recovery access point settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    /// NetworkManager profile raised in recovery.
    pub recovery_connection: String,
    /// The profile is only raised while fewer connections than this are active.
    pub max_active_connections: usize,
}

/// One-time build of the native driver library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSettings {
    /// File whose absence triggers the build.
    pub artifact: PathBuf,
    pub build_command: String,
    pub working_dir: PathBuf,
}

/// Fully resolved boot configuration.
#[derive(Debug, Clone)]
pub struct BootConfig {
    /// Directory relative paths were resolved against.
    pub project_dir: PathBuf,
    pub paths: Paths,
    pub ui: UiLaunch,
    pub midi_profile: Option<String>,
    /// Hardware-test target; `None` skips the test.
    pub hw_test: Option<String>,
    /// Whether the UI runs its control-board test on start.
    pub control_test: bool,
    pub timings: Timings,
    pub splash: SplashSettings,
    pub network: NetworkSettings,
    pub first_boot_marker: PathBuf,
    pub driver: Option<DriverSettings>,
    /// Program that performs the hardware test; receives the target as argument.
    pub hw_test_command: Option<String>,
    /// sysfs `bl_power` file of the display backlight.
    pub backlight: Option<PathBuf>,
    child_env: BTreeMap<String, String>,
}

impl BootConfig {
    /// Environment variables for the supervised process.
    pub fn child_env(&self) -> &BTreeMap<String, String> {
        &self.child_env
    }
}

/// Anything that can produce a fresh [`BootConfig`].
pub trait ConfigSource {
    fn load(&self) -> Result<BootConfig, BootError>;
}

/// Config loaded from a YAML file on disk.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for ConfigFile {
    fn load(&self) -> Result<BootConfig, BootError> {
        load_config(Some(&self.path))
    }
}

// ----------------------------------------------------------------------------
// Loading
// ----------------------------------------------------------------------------

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var pattern")
    })
}

/// Expands `${VAR}` references from the process environment.
fn expand_env_vars(input: &str) -> Result<String, BootError> {
    let pattern = env_var_pattern();
    if let Some(missing) = pattern
        .captures_iter(input)
        .map(|caps| caps[1].to_string())
        .find(|name| env::var(name).is_err())
    {
        return Err(BootError::MissingEnvVar(missing));
    }

    let result = pattern.replace_all(input, |caps: &regex::Captures| {
        env::var(&caps[1]).unwrap_or_default()
    });
    Ok(result.into_owned())
}

/// Parses `KEY=VALUE` lines of an env file into `target`.
///
/// Blank lines and `#` comments are skipped, a leading `export` is accepted
/// and matching single or double quotes around the value are stripped.
fn read_env_file(path: &Path, target: &mut BTreeMap<String, String>) {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            error!("Failed to read env file {}: {}", path.display(), err);
            return;
        }
    };

    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line).trim_start();

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim().to_string();
            let mut value = value.trim();

            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            target.insert(key, value.to_string());
        } else {
            warn!(
                "Ignoring malformed line in env file {}: {}",
                path.display(),
                line
            );
        }
    }
}

/// Parses a user-facing duration string in the format `<number>[s|m|h]`.
pub fn parse_duration(raw: &str) -> Result<Duration, BootError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(BootError::InvalidDuration(raw.to_string()));
    }

    let (amount_str, multiplier) = if let Some(stripped) = value.strip_suffix('s') {
        (stripped.trim(), 1)
    } else if let Some(stripped) = value.strip_suffix('m') {
        (stripped.trim(), 60)
    } else if let Some(stripped) = value.strip_suffix('h') {
        (stripped.trim(), 3600)
    } else {
        (value, 1)
    };

    let amount: u64 = amount_str
        .parse()
        .map_err(|_| BootError::InvalidDuration(raw.to_string()))?;

    Ok(Duration::from_secs(amount.saturating_mul(multiplier)))
}

fn duration_or(raw: Option<&str>, default: Duration) -> Result<Duration, BootError> {
    raw.map(parse_duration).transpose().map(|d| d.unwrap_or(default))
}

/// Parses config `content` and resolves it against `base`.
pub fn parse_config(content: &str, base: &Path) -> Result<BootConfig, BootError> {
    let expanded = expand_env_vars(content)?;
    let raw: RawConfig = serde_yaml::from_str(&expanded)?;

    if raw.version != SUPPORTED_VERSION {
        return Err(BootError::UnsupportedVersion(raw.version));
    }

    let config_dir = resolve(base, &raw.paths.config_dir);
    let ui_dir = resolve(base, &raw.paths.ui_dir);
    let data_dir = raw
        .paths
        .data_dir
        .as_deref()
        .map(|p| resolve(base, p))
        .unwrap_or_else(|| config_dir.clone());
    let runtime_dir = raw
        .paths
        .runtime_dir
        .as_deref()
        .map(|p| resolve(base, p))
        .unwrap_or_else(|| env::temp_dir().join("synthboot"));
    let paths = Paths {
        config_dir,
        ui_dir,
        data_dir,
        runtime_dir,
    };

    let timings = Timings {
        restart_delay: duration_or(raw.restart_delay.as_deref(), DEFAULT_RESTART_DELAY)?,
        hw_test_cooldown: duration_or(
            raw.hw_test_cooldown.as_deref(),
            DEFAULT_HW_TEST_COOLDOWN,
        )?,
        first_boot_window: duration_or(
            raw.first_boot.window.as_deref(),
            DEFAULT_FIRST_BOOT_WINDOW,
        )?,
        first_boot_poll: duration_or(
            raw.first_boot.poll.as_deref(),
            DEFAULT_FIRST_BOOT_POLL,
        )?,
    };

    let img = |custom: Option<&Path>, default: &str| {
        custom
            .map(|p| resolve(base, p))
            .unwrap_or_else(|| paths.ui_dir.join("img").join(default))
    };
    let splash = SplashSettings {
        enabled: raw.splash.enabled.unwrap_or(true),
        boot_image: img(raw.splash.boot_image.as_deref(), "splash_boot.png"),
        error_image: img(raw.splash.error_image.as_deref(), "splash_error.png"),
        configuring_image: img(
            raw.splash.configuring_image.as_deref(),
            "splash_configuring.png",
        ),
        wait_image: img(raw.splash.wait_image.as_deref(), "splash_wait.png"),
        message_image: paths.runtime_dir.join(MESSAGE_IMAGE_NAME),
        render_program: raw
            .splash
            .render_program
            .unwrap_or_else(|| DEFAULT_RENDER_PROGRAM.to_string()),
        display_program: raw
            .splash
            .display_program
            .unwrap_or_else(|| DEFAULT_DISPLAY_PROGRAM.to_string()),
        font: raw
            .splash
            .font
            .unwrap_or_else(|| DEFAULT_SPLASH_FONT.to_string()),
        point_size: raw.splash.point_size.unwrap_or(DEFAULT_SPLASH_POINT_SIZE),
    };

    let network = NetworkSettings {
        recovery_connection: raw
            .network
            .recovery_connection
            .unwrap_or_else(|| DEFAULT_RECOVERY_CONNECTION.to_string()),
        max_active_connections: raw
            .network
            .max_active_connections
            .unwrap_or(DEFAULT_MAX_ACTIVE_CONNECTIONS),
    };

    let first_boot_marker = raw
        .first_boot
        .marker
        .as_deref()
        .map(|p| resolve(base, p))
        .unwrap_or_else(|| paths.config_dir.join(".first_boot"));

    let driver = raw.driver.map(|driver| DriverSettings {
        artifact: resolve(base, &driver.artifact),
        build_command: driver.build_command,
        working_dir: driver
            .working_dir
            .as_deref()
            .map(|p| resolve(base, p))
            .unwrap_or_else(|| paths.ui_dir.clone()),
    });

    let ui = UiLaunch {
        command: raw.ui.command,
        working_dir: raw
            .ui
            .working_dir
            .as_deref()
            .map(|p| resolve(base, p))
            .unwrap_or_else(|| paths.ui_dir.clone()),
    };

    let mut child_env = BTreeMap::new();
    if let Some(env_config) = &raw.env
        && let Some(file) = env_config.path(base)
    {
        read_env_file(&file, &mut child_env);
    }

    let midi_profile_path = raw.midi_profile.as_ref().map(|name| {
        paths
            .data_dir
            .join(MIDI_PROFILE_DIR)
            .join(format!("{name}.{MIDI_PROFILE_EXTENSION}"))
    });
    if let Some(profile) = &midi_profile_path {
        if profile.exists() {
            read_env_file(profile, &mut child_env);
        } else {
            warn!("MIDI profile {} not found; using defaults", profile.display());
        }
    }

    if let Some(vars) = raw.env.as_ref().and_then(|e| e.vars.as_ref()) {
        for (key, value) in vars {
            child_env.insert(key.clone(), value.clone());
        }
    }

    let dir_string = |p: &Path| p.to_string_lossy().into_owned();
    child_env.insert(ENV_CONFIG_DIR.into(), dir_string(&paths.config_dir));
    child_env.insert(ENV_UI_DIR.into(), dir_string(&paths.ui_dir));
    child_env.insert(ENV_DATA_DIR.into(), dir_string(&paths.data_dir));
    child_env.insert(ENV_RUNTIME_DIR.into(), dir_string(&paths.runtime_dir));
    if let Some(profile) = &midi_profile_path {
        child_env.insert(ENV_MIDI_PROFILE.into(), dir_string(profile));
    }
    if let Some(level) = &raw.verbosity {
        child_env.insert(ENV_LOG_LEVEL.into(), level.clone());
    }
    if let Some(raise) = raw.raise_exceptions {
        child_env.insert(ENV_RAISE_EXCEPTIONS.into(), raise.to_string());
    }
    if raw.control_test {
        child_env.insert(ENV_CONTROL_TEST.into(), "1".into());
    }

    debug!("Resolved {} environment variables for the UI", child_env.len());

    Ok(BootConfig {
        project_dir: base.to_path_buf(),
        paths,
        ui,
        midi_profile: raw.midi_profile,
        hw_test: raw.hw_test.filter(|t| !t.trim().is_empty()),
        control_test: raw.control_test,
        timings,
        splash,
        network,
        first_boot_marker,
        driver,
        hw_test_command: raw.hardware.test_command,
        backlight: raw.backlight.as_deref().map(|p| resolve(base, p)),
        child_env,
    })
}

/// Loads and resolves the configuration file.
pub fn load_config(config_path: Option<&Path>) -> Result<BootConfig, BootError> {
    let config_path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

    let content = fs::read_to_string(config_path).map_err(|e| {
        BootError::ConfigReadError(std::io::Error::new(
            e.kind(),
            format!("{} ({})", e, config_path.display()),
        ))
    })?;

    let base_path = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    parse_config(&content, &base_path)
}
