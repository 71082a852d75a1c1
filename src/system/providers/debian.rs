//! Debian/Ubuntu 系统提供者实现
//!
//! 实现基于 apt 包管理器、systemd 和 ufw 的 Debian 系发行版支持

use anyhow::{Context, Result};
use gitea_deploy_common::RetryPolicy;
use std::path::Path;
use std::sync::Arc;

use crate::system::provider::{FirewallAction, ServiceManagerKind, ServiceStatus, SystemProvider};
use crate::system::runner::{CommandOutput, CommandRunner, failed};

const SYSTEMD_UNIT_DIR: &str = "/etc/systemd/system";

/// Debian/Ubuntu 系统提供者
pub struct DebianProvider {
    runner: Arc<dyn CommandRunner>,
    lock_retry: RetryPolicy,
    use_sudo: bool,
}

impl DebianProvider {
    pub fn new(runner: Arc<dyn CommandRunner>, lock_retry: RetryPolicy, use_sudo: bool) -> Self {
        Self {
            runner,
            lock_retry,
            use_sudo,
        }
    }

    fn elevate(&self, program: &str, args: &[&str]) -> (String, Vec<String>) {
        if self.use_sudo {
            let mut full = vec![program.to_string()];
            full.extend(args.iter().map(|a| a.to_string()));
            ("sudo".to_string(), full)
        } else {
            (
                program.to_string(),
                args.iter().map(|a| a.to_string()).collect(),
            )
        }
    }

    fn systemctl(&self, action: &str, service_name: &str) -> Result<()> {
        self.privileged("systemctl", &[action, service_name])
            .with_context(|| format!("Failed to {} service: {}", action, service_name))?;
        Ok(())
    }
}

impl SystemProvider for DebianProvider {
    fn name(&self) -> &'static str {
        "Debian/Ubuntu"
    }

    fn description(&self) -> &'static str {
        "Debian-based Linux distribution (Ubuntu, Debian, Mint, etc.)"
    }

    fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    fn privileged(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let (program, args) = self.elevate(program, args);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        Ok(self.runner.run_checked(&program, &args)?)
    }

    fn privileged_with_input(&self, program: &str, args: &[&str], input: &str) -> Result<()> {
        let (program, args) = self.elevate(program, args);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.runner.run_with_input(&program, &args, input)?;
        if output.success() {
            Ok(())
        } else {
            Err(failed(&program, &args, &output).into())
        }
    }

    // ========== 包管理 ==========
    fn has_package_manager(&self) -> bool {
        self.runner.command_exists("apt-get")
    }

    fn install_packages(&self, packages: &[&str]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }

        println!("🔄 Installing packages: {}", packages.join(", "));

        // dpkg 锁可能被无关的系统活动（自动更新等）持有
        let operation = format!("apt-get install {}", packages.join(" "));
        self.lock_retry
            .run_blocking(&operation, |_| {
                self.privileged("apt-get", &["update"])?;
                let mut args = vec!["-y", "install"];
                args.extend(packages);
                self.privileged("apt-get", &args)
            })
            .map_err(|exhausted| {
                exhausted.last_error.context(format!(
                    "Failed to install packages after {} attempts: {}",
                    exhausted.attempts,
                    packages.join(", ")
                ))
            })?;

        println!("✅ Packages installed successfully");
        Ok(())
    }

    fn is_package_installed(&self, package: &str) -> bool {
        self.runner
            .run("dpkg", &["-s", package])
            .map(|output| output.success())
            .unwrap_or(false)
    }

    fn required_packages(&self) -> &'static [&'static str] {
        &["git", "postgresql", "postgresql-contrib"]
    }

    // ========== 数据库 ==========
    fn postgres_admin_command(&self) -> Vec<String> {
        ["sudo", "-u", "postgres", "psql"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn postgres_dump_command(&self) -> Vec<String> {
        ["sudo", "-u", "postgres", "pg_dump"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn start_database(&self) -> Result<()> {
        self.privileged("systemctl", &["enable", "--now", "postgresql"])
            .context("Failed to start PostgreSQL")?;
        Ok(())
    }

    // ========== 用户管理 ==========
    fn create_system_user(&self, username: &str, home_dir: &Path) -> Result<()> {
        if self.user_exists(username) {
            println!("✅ User '{}' already exists", username);
            return Ok(());
        }

        println!("🔄 Creating system user: {}", username);

        let home = home_dir.to_string_lossy();
        self.privileged(
            "adduser",
            &[
                "--system",
                "--shell",
                "/bin/bash",
                "--gecos",
                "Git Version Control",
                "--group",
                "--disabled-password",
                "--home",
                &home,
                username,
            ],
        )
        .with_context(|| format!("Failed to create user: {}", username))?;

        println!("✅ User '{}' created successfully", username);
        Ok(())
    }

    fn user_exists(&self, username: &str) -> bool {
        self.runner
            .run("id", &[username])
            .map(|output| output.success())
            .unwrap_or(false)
    }

    // ========== 服务管理 ==========
    fn service_manager(&self) -> ServiceManagerKind {
        ServiceManagerKind::Systemd
    }

    fn install_service(&self, service_name: &str, content: &str) -> Result<()> {
        let service_path = format!("{}/{}.service", SYSTEMD_UNIT_DIR, service_name);

        println!("🔄 Installing systemd service: {}", service_name);

        self.write_file(Path::new(&service_path), content)
            .with_context(|| format!("Failed to write service file: {}", service_path))?;

        self.privileged("systemctl", &["daemon-reload"])
            .context("Failed to reload systemd daemon")?;

        println!("✅ Service '{}' installed successfully", service_name);
        Ok(())
    }

    fn enable_service(&self, service_name: &str) -> Result<()> {
        self.systemctl("enable", service_name)
    }

    fn start_service(&self, service_name: &str) -> Result<()> {
        self.systemctl("start", service_name)
    }

    fn stop_service(&self, service_name: &str) -> Result<()> {
        self.systemctl("stop", service_name)
    }

    fn restart_service(&self, service_name: &str) -> Result<()> {
        self.systemctl("restart", service_name)
    }

    fn service_status(&self, service_name: &str) -> ServiceStatus {
        let Ok(output) = self.runner.run("systemctl", &["is-active", service_name]) else {
            return ServiceStatus::Unknown;
        };

        match output.stdout.trim() {
            "active" => ServiceStatus::Running,
            "inactive" => ServiceStatus::Stopped,
            "activating" | "reloading" => ServiceStatus::Activating,
            "failed" => {
                let reason = self
                    .runner
                    .run(
                        "systemctl",
                        &["show", "-p", "Result", "--value", service_name],
                    )
                    .map(|o| o.stdout.trim().to_string())
                    .unwrap_or_default();
                ServiceStatus::Failed(reason)
            }
            _ if output.stderr.contains("could not be found") => ServiceStatus::NotFound,
            _ => ServiceStatus::Unknown,
        }
    }

    fn service_logs(&self, service_name: &str, lines: usize) -> String {
        let lines = lines.to_string();
        self.runner
            .run(
                "journalctl",
                &["-u", service_name, "-n", &lines, "--no-pager"],
            )
            .map(|o| o.stdout)
            .unwrap_or_else(|e| format!("(journalctl unavailable: {e})"))
    }

    // ========== 网络和防火墙 ==========
    fn configure_firewall(&self, port: u16, action: FirewallAction) -> Result<bool> {
        if !self.runner.command_exists("ufw") {
            println!(
                "⚠️  No supported firewall found (ufw); {} port {}/tcp manually if a firewall is active",
                action.verb(),
                port
            );
            return Ok(false);
        }

        let rule = format!("{}/tcp", port);
        let args: Vec<&str> = match action {
            FirewallAction::Allow => vec!["allow", rule.as_str()],
            FirewallAction::Delete => vec!["delete", "allow", rule.as_str()],
        };

        self.privileged("ufw", &args)
            .with_context(|| format!("Failed to {} firewall port {}", action.verb(), port))?;

        tracing::info!(port, action = action.verb(), "firewall rule applied");
        Ok(true)
    }

    // ========== 系统信息 ==========
    fn system_version(&self) -> String {
        std::fs::read_to_string("/etc/os-release")
            .unwrap_or_default()
            .lines()
            .find(|line| line.starts_with("PRETTY_NAME="))
            .and_then(|line| line.split_once('='))
            .map(|(_, name)| name.trim_matches('"').to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::runner::fake::FakeRunner;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn provider(runner: Arc<FakeRunner>, use_sudo: bool) -> DebianProvider {
        DebianProvider::new(runner, RetryPolicy::new(5, Duration::ZERO), use_sudo)
    }

    #[test]
    fn test_install_retries_on_lock_contention() {
        let installs = Arc::new(AtomicU32::new(0));
        let counter = installs.clone();
        let runner = Arc::new(FakeRunner::new(move |line, _| {
            if line.starts_with("apt-get -y install") {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    return FakeRunner::fail(
                        "E: Could not get lock /var/lib/dpkg/lock-frontend. It is held by process 1234 (unattended-upgr)",
                    );
                }
            }
            FakeRunner::ok("")
        }));

        provider(runner.clone(), false)
            .install_packages(&["git", "postgresql"])
            .unwrap();
        assert_eq!(installs.load(Ordering::SeqCst), 3);
        assert_eq!(
            runner.calls().last().unwrap(),
            "apt-get -y install git postgresql"
        );
    }

    #[test]
    fn test_install_gives_up_at_ceiling() {
        let runner = Arc::new(FakeRunner::new(|line, _| {
            if line.starts_with("apt-get -y install") {
                FakeRunner::fail("E: Could not get lock /var/lib/dpkg/lock")
            } else {
                FakeRunner::ok("")
            }
        }));

        let err = provider(runner.clone(), false)
            .install_packages(&["git"])
            .unwrap_err();
        assert!(format!("{err:#}").contains("Could not get lock"));
        let installs = runner
            .calls()
            .iter()
            .filter(|c| c.starts_with("apt-get -y install"))
            .count();
        assert_eq!(installs, 5);
    }

    #[test]
    fn test_sudo_prefix_when_not_root() {
        let runner = Arc::new(FakeRunner::succeeding());
        let provider = provider(runner.clone(), true);
        provider.restart_service("gitea").unwrap();
        provider.install_service("gitea", "[Unit]\n").unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0], "sudo systemctl restart gitea");
        assert_eq!(calls[1], "sudo tee /etc/systemd/system/gitea.service");
        assert_eq!(calls[2], "sudo systemctl daemon-reload");
        assert_eq!(runner.inputs(), vec!["[Unit]\n"]);
    }

    #[test]
    fn test_firewall_rules() {
        let runner = Arc::new(FakeRunner::succeeding());
        let provider = provider(runner.clone(), false);
        assert!(provider.configure_firewall(80, FirewallAction::Allow).unwrap());
        assert!(provider.configure_firewall(80, FirewallAction::Delete).unwrap());

        let calls = runner.calls();
        assert!(calls.contains(&"ufw allow 80/tcp".to_string()));
        assert!(calls.contains(&"ufw delete allow 80/tcp".to_string()));
    }

    #[test]
    fn test_firewall_skipped_without_ufw() {
        let runner = Arc::new(FakeRunner::new(|line, _| {
            if line == "which ufw" {
                FakeRunner::fail("")
            } else {
                FakeRunner::ok("")
            }
        }));
        assert!(
            !provider(runner, false)
                .configure_firewall(443, FirewallAction::Allow)
                .unwrap()
        );
    }

    #[test]
    fn test_service_status_parsing() {
        let runner = Arc::new(FakeRunner::new(|line, _| match line {
            "systemctl is-active gitea" => FakeRunner::ok("active\n"),
            "systemctl is-active broken" => CommandOutput {
                status: 3,
                stdout: "failed\n".to_string(),
                stderr: String::new(),
            },
            "systemctl show -p Result --value broken" => FakeRunner::ok("exit-code\n"),
            _ => FakeRunner::fail("Unit missing.service could not be found."),
        }));
        let provider = provider(runner, false);
        assert_eq!(provider.service_status("gitea"), ServiceStatus::Running);
        assert_eq!(
            provider.service_status("broken"),
            ServiceStatus::Failed("exit-code".to_string())
        );
        assert_eq!(provider.service_status("missing"), ServiceStatus::NotFound);
    }
}
