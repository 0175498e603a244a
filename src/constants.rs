//! Constants and default values for the boot supervisor.
//!
//! Exit codes, timing defaults and environment variable names used across the
//! crate live here so the restart policy and the supervised UI agree on them.

use std::time::Duration;

// ============================================================================
// Supervised Process Exit Codes
// ============================================================================

/// Clean shutdown requested by the UI. The appliance powers off.
pub const EXIT_SHUTDOWN: i32 = 0;

/// Reboot requested by the UI.
pub const EXIT_REBOOT: i32 = 100;

/// Clean exit: the supervisor stops without relaunching.
pub const EXIT_CLEAN: i32 = 101;

/// The UI asked to be restarted.
pub const EXIT_RESTART_UI: i32 = 102;

/// Status recorded when the supervised command could not be spawned at all.
/// Mirrors the shell's "command not found" status.
pub const EXIT_LAUNCH_FAILURE: i32 = 127;

/// Offset added to a signal number when a process is killed by that signal.
pub const SIGNAL_STATUS_OFFSET: i32 = 128;

// ============================================================================
// Timing Defaults
// ============================================================================

/// Pause between two launches of the supervised process.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(10);

/// Time allowed for first-boot provisioning before giving up.
pub const DEFAULT_FIRST_BOOT_WINDOW: Duration = Duration::from_secs(1800);

/// Interval between checks of the first-boot marker.
pub const DEFAULT_FIRST_BOOT_POLL: Duration = Duration::from_secs(10);

/// Cool-down after a failed hardware test before the supervisor exits.
pub const DEFAULT_HW_TEST_COOLDOWN: Duration = Duration::from_secs(3600);

/// Upper bound for any external collaborator command (renderer, nmcli, ...).
pub const COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(15);

/// Interval used while parking the supervisor after an unrecoverable halt.
pub const PARK_INTERVAL: Duration = Duration::from_secs(3600);

/// Polling interval while waiting on a child with a timeout.
pub const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ============================================================================
// Network Defaults
// ============================================================================

/// The recovery access point is only raised below this many active connections.
pub const DEFAULT_MAX_ACTIVE_CONNECTIONS: usize = 2;

/// NetworkManager connection profile brought up in recovery mode.
pub const DEFAULT_RECOVERY_CONNECTION: &str = "recovery-ap";

/// Address reported when no non-loopback IPv4 address is configured.
pub const FALLBACK_ADDRESS: &str = "127.0.0.1";

// ============================================================================
// Shell Execution Constants
// ============================================================================

/// Default shell used for the supervised command and build scripts.
pub const DEFAULT_SHELL: &str = "sh";

/// Shell argument flag for executing command strings.
pub const SHELL_COMMAND_FLAG: &str = "-c";

// ============================================================================
// Configuration
// ============================================================================

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "synthboot.yaml";

/// Directory below `data_dir` holding MIDI profile env files.
pub const MIDI_PROFILE_DIR: &str = "midi-profiles";

/// Extension of MIDI profile env files.
pub const MIDI_PROFILE_EXTENSION: &str = "sh";

/// Hardware-test program used when `hardware.test_command` is not set.
pub const DEFAULT_HW_TEST_PROGRAM: &str = "synth-hwtest";

// ============================================================================
// Child Environment Variables
// ============================================================================

pub const ENV_CONFIG_DIR: &str = "SYNTH_CONFIG_DIR";
pub const ENV_UI_DIR: &str = "SYNTH_UI_DIR";
pub const ENV_DATA_DIR: &str = "SYNTH_DATA_DIR";
pub const ENV_RUNTIME_DIR: &str = "SYNTH_RUNTIME_DIR";
pub const ENV_MIDI_PROFILE: &str = "SYNTH_MIDI_PROFILE";
pub const ENV_LOG_LEVEL: &str = "SYNTH_LOG_LEVEL";
pub const ENV_RAISE_EXCEPTIONS: &str = "SYNTH_RAISE_EXCEPTIONS";
pub const ENV_CONTROL_TEST: &str = "SYNTH_CONTROL_TEST";

// ============================================================================
// Splash Defaults
// ============================================================================

/// File name of the rendered message image inside `runtime_dir`.
pub const MESSAGE_IMAGE_NAME: &str = "splash_message.png";

/// Default ImageMagick renderer.
pub const DEFAULT_RENDER_PROGRAM: &str = "convert";

/// Default framebuffer image viewer.
pub const DEFAULT_DISPLAY_PROGRAM: &str = "xloadimage";

pub const DEFAULT_SPLASH_FONT: &str = "Audiowide";
pub const DEFAULT_SPLASH_POINT_SIZE: u32 = 24;

/// Text shown while the native driver is built.
pub const WAIT_MESSAGE: &str = "Building native driver, please wait...";

/// Text shown while first-boot provisioning runs.
pub const CONFIGURING_MESSAGE: &str = "Configuring your device, please wait...";

/// Text shown when first-boot provisioning never finished.
pub const PROVISIONING_FAILED_MESSAGE: &str = "Provisioning failed. Please reboot.";
