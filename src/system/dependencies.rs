//! System dependency and precondition checks

use anyhow::Result;
use gitea_deploy_common::DeployConfig;
use gitea_deploy_common::release::Platform;

use super::check_result::{CheckItem, DependencyCheckResult};
use super::runner::CommandRunner;
use crate::cli::InstallTarget;

/// Tools the tool installs or only needs for optional steps
const OPTIONAL_TOOLS: [(&str, &str); 5] = [
    ("git", "installed with the binary target"),
    ("certbot", "required only for CA-issued certificates"),
    ("crontab", "required only for certificate renewal"),
    ("ufw", "firewall rules must be opened manually without it"),
    ("pg_dump", "required for backups of a binary install"),
];

/// Check system dependencies and return structured data
pub fn check_dependencies_data(
    runner: &dyn CommandRunner,
    config: &DeployConfig,
    target: Option<InstallTarget>,
) -> DependencyCheckResult {
    let mut result = DependencyCheckResult::new();

    match Platform::detect() {
        Ok(platform) => result.add_item(CheckItem::ok("Platform", platform.asset_suffix())),
        Err(e) => result.add_item(CheckItem::error("Platform", e.to_string())),
    }

    if super::is_root() {
        result.add_item(CheckItem::ok("Privileges", "running as root"));
    } else if runner.command_exists("sudo") {
        result.add_item(CheckItem::warning(
            "Privileges",
            format!(
                "running as '{}'; privileged steps will use sudo",
                super::current_username()
            ),
        ));
    } else {
        result.add_item(CheckItem::error(
            "Privileges",
            "not root and sudo is not available",
        ));
    }

    if config.env_file.is_file() {
        result.add_item(CheckItem::ok(
            "Environment file",
            config.env_file.display().to_string(),
        ));
    } else {
        result.add_item(CheckItem::error(
            "Environment file",
            format!(
                "{} not found (POSTGRES_USER, POSTGRES_PASSWORD, POSTGRES_DB are required)",
                config.env_file.display()
            ),
        ));
    }

    let needs_host_stack = target != Some(InstallTarget::Docker);
    let (package_manager, service_manager) = if cfg!(target_os = "macos") {
        ("brew", "launchctl")
    } else {
        ("apt-get", "systemctl")
    };
    for (name, command) in [
        ("Package manager", package_manager),
        ("Service manager", service_manager),
    ] {
        let item = if runner.command_exists(command) {
            CheckItem::ok(name, command)
        } else if needs_host_stack {
            CheckItem::error(name, format!("{command} (missing)"))
        } else {
            CheckItem::warning(name, format!("{command} (missing, not needed for docker)"))
        };
        result.add_item(item);
    }

    let compose_ok = runner
        .run("docker", &["compose", "version"])
        .map(|o| o.success())
        .unwrap_or(false);
    result.add_item(match (compose_ok, target) {
        (true, _) => CheckItem::ok("Docker Compose", "docker compose"),
        (false, Some(InstallTarget::Docker)) => {
            CheckItem::error("Docker Compose", "docker compose (missing)")
        }
        (false, _) => CheckItem::warning("Docker Compose", "missing, needed for the docker target"),
    });

    for (tool, note) in OPTIONAL_TOOLS {
        if runner.command_exists(tool) {
            result.add_item(CheckItem::ok("Command", tool));
        } else {
            result.add_item(CheckItem::warning("Command", format!("{tool} ({note})")));
        }
    }

    result
}

/// Print the dependency report
pub fn check_dependencies(runner: &dyn CommandRunner, config: &DeployConfig) -> Result<()> {
    let result = check_dependencies_data(runner, config, None);
    result.print();
    Ok(())
}

/// Fail on any precondition error
pub fn ensure_preconditions(
    runner: &dyn CommandRunner,
    config: &DeployConfig,
    target: InstallTarget,
) -> Result<()> {
    let result = check_dependencies_data(runner, config, Some(target));
    let errors: Vec<String> = result
        .errors()
        .map(|item| format!("{}: {}", item.name, item.message))
        .collect();
    if errors.is_empty() {
        return Ok(());
    }
    result.print();
    Err(crate::error::Error::precondition(errors.join("; ")).into())
}
