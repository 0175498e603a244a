//! Synthboot is the boot-time supervisor of an embedded audio workstation. It
//! prepares the splash display, builds the native driver when needed, handles
//! first-boot provisioning and the optional hardware test, then keeps the UI
//! process running and reacts to its exit status: power off, reboot, restart
//! the UI, or fall back to a recovery access point with a diagnostic splash.

/// Pre-loop gating: driver build, first boot, hardware test.
pub mod boot;

/// CLI interface.
pub mod cli;

/// Time source for fixed pauses.
pub mod clock;

/// Configuration management.
pub mod config;

/// Constants and defaults.
pub mod constants;

/// Error handling.
pub mod error;

/// Exit status to action mapping.
pub mod exit_code;

/// Supervised process launching.
pub mod launcher;

/// Recovery network and host address.
pub mod network;

/// Power and backlight control.
pub mod power;

/// Hardware self-test.
pub mod probe;

/// External program execution helpers.
pub mod shell;

/// Framebuffer splash screens.
pub mod splash;

/// Supervisor loop.
pub mod supervisor;

/// Fakes for tests.
pub mod test_utils;
