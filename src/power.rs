//! System power actions issued when the supervision session ends.
use std::{fs, path::Path};

use tracing::info;

use crate::{constants::COLLABORATOR_TIMEOUT, error::CollaboratorError, shell::run_program};

/// Power and display control of the appliance.
pub trait PowerControl {
    fn power_off(&self) -> Result<(), CollaboratorError>;
    fn reboot(&self) -> Result<(), CollaboratorError>;
    /// Switches the display backlight off. `None` means the display has no
    /// controllable backlight.
    fn backlight_off(&self, bl_power: Option<&Path>) -> Result<(), CollaboratorError>;
}

/// Uses the `poweroff`/`reboot` commands and the sysfs backlight file.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPower;

impl PowerControl for SystemPower {
    fn power_off(&self) -> Result<(), CollaboratorError> {
        info!("Powering off");
        run_program::<&str>("poweroff", &[], None, COLLABORATOR_TIMEOUT)?;
        Ok(())
    }

    fn reboot(&self) -> Result<(), CollaboratorError> {
        info!("Rebooting");
        run_program::<&str>("reboot", &[], None, COLLABORATOR_TIMEOUT)?;
        Ok(())
    }

    fn backlight_off(&self, bl_power: Option<&Path>) -> Result<(), CollaboratorError> {
        if let Some(path) = bl_power {
            // bl_power: 0 = on, anything else = off.
            fs::write(path, "1")?;
        }
        Ok(())
    }
}
