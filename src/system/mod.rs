//! System utilities module

mod check_result;
mod database;
mod dependencies;
mod helpers;
mod network;
mod provider;
pub mod providers;
mod runner;

// Public exports
pub use check_result::{CheckItem, CheckStatus, DependencyCheckResult};
pub use database::{PostgresAdmin, SetupOutcome, SetupReport};
pub use dependencies::{check_dependencies, check_dependencies_data, ensure_preconditions};
pub use helpers::{clear_input_buffer, press_any_key_to_with_interrupt};
pub use network::NetworkUtils;
pub use provider::{
    FirewallAction, ServiceManagerKind, ServiceStatus, SystemProvider, SystemProviderFactory,
};
pub use runner::{CommandOutput, CommandRunner, SystemRunner, describe, failed};

#[cfg(test)]
pub(crate) use runner::fake::FakeRunner;

/// Whether the process runs with an effective uid of 0
#[cfg(unix)]
pub fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}

/// Name of the invoking user, for operator messages
#[cfg(unix)]
pub fn current_username() -> String {
    users::get_current_username()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| format!("uid {}", users::get_current_uid()))
}

#[cfg(not(unix))]
pub fn current_username() -> String {
    "unknown".to_string()
}
