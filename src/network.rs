//! Recovery access point and host address lookup.
use std::net::IpAddr;

use sysinfo::Networks;
use tracing::{debug, info, warn};

use crate::{
    config::NetworkSettings,
    constants::{COLLABORATOR_TIMEOUT, FALLBACK_ADDRESS},
    error::CollaboratorError,
    shell::run_program,
};

/// Control over the fallback wireless access point.
pub trait RecoveryNetwork {
    /// Names of the currently active connections.
    fn active_connections(&self) -> Result<Vec<String>, CollaboratorError>;

    /// Brings the named connection up.
    fn activate(&self, connection: &str) -> Result<(), CollaboratorError>;
}

/// Result of [`ensure_fallback_network`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// The recovery connection was brought up.
    Activated,
    /// The recovery connection was already active.
    AlreadyActive,
    /// Enough other links are up; recovery not needed.
    Skipped { active: usize },
    /// Querying or activating failed; logged and ignored.
    Failed,
}

/// Raises the recovery access point unless enough links are already active.
///
/// Idempotent: a second call finds the recovery connection among the active
/// ones and does nothing. Never returns an error.
pub fn ensure_fallback_network(
    network: &dyn RecoveryNetwork,
    settings: &NetworkSettings,
) -> FallbackOutcome {
    let active = match network.active_connections() {
        Ok(active) => active,
        Err(err) => {
            warn!("Unable to list active network connections: {}", err);
            return FallbackOutcome::Failed;
        }
    };

    if active.iter().any(|name| name == &settings.recovery_connection) {
        debug!(
            "Recovery connection '{}' already active",
            settings.recovery_connection
        );
        return FallbackOutcome::AlreadyActive;
    }

    if active.len() >= settings.max_active_connections {
        debug!(
            "{} connections active; not raising '{}'",
            active.len(),
            settings.recovery_connection
        );
        return FallbackOutcome::Skipped {
            active: active.len(),
        };
    }

    match network.activate(&settings.recovery_connection) {
        Ok(()) => {
            info!(
                "Recovery access point '{}' enabled",
                settings.recovery_connection
            );
            FallbackOutcome::Activated
        }
        Err(err) => {
            warn!(
                "Failed to enable recovery access point '{}': {}",
                settings.recovery_connection, err
            );
            FallbackOutcome::Failed
        }
    }
}

/// NetworkManager backend driven through `nmcli`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NmcliNetwork;

/// Parses `nmcli -t -f NAME connection show --active` output.
fn parse_active_connections(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != "lo")
        .map(|line| line.replace("\\:", ":"))
        .collect()
}

impl RecoveryNetwork for NmcliNetwork {
    fn active_connections(&self) -> Result<Vec<String>, CollaboratorError> {
        let output = run_program(
            "nmcli",
            &["-t", "-f", "NAME", "connection", "show", "--active"],
            None,
            COLLABORATOR_TIMEOUT,
        )?;
        Ok(parse_active_connections(&output))
    }

    fn activate(&self, connection: &str) -> Result<(), CollaboratorError> {
        run_program(
            "nmcli",
            &["connection", "up", connection],
            None,
            COLLABORATOR_TIMEOUT,
        )?;
        Ok(())
    }
}

/// Source of the address shown on diagnostic splashes.
pub trait HostAddress {
    fn current_address(&self) -> String;
}

/// First non-loopback IPv4 address of any interface.
#[derive(Debug, Default, Clone, Copy)]
pub struct InterfaceAddress;

impl HostAddress for InterfaceAddress {
    fn current_address(&self) -> String {
        let networks = Networks::new_with_refreshed_list();
        let mut names: Vec<&String> = networks.list().keys().collect();
        names.sort();

        names
            .into_iter()
            .filter_map(|name| networks.list().get(name))
            .flat_map(|data| data.ip_networks().iter())
            .find_map(|net| match net.addr {
                IpAddr::V4(v4) if !v4.is_loopback() && !v4.is_unspecified() => {
                    Some(v4.to_string())
                }
                _ => None,
            })
            .unwrap_or_else(|| FALLBACK_ADDRESS.to_string())
    }
}
