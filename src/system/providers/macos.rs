//! macOS 系统提供者实现
//!
//! Homebrew 安装依赖，launchd 管理服务；没有自动防火墙配置

use anyhow::{Context, Result};
use gitea_deploy_common::RetryPolicy;
use std::path::Path;
use std::sync::Arc;

use crate::system::provider::{ServiceManagerKind, ServiceStatus, SystemProvider};
use crate::system::runner::{CommandOutput, CommandRunner, failed};

const LAUNCH_DAEMON_DIR: &str = "/Library/LaunchDaemons";
/// launchd 守护进程的标准输出与错误输出
pub const LAUNCHD_LOG_FILE: &str = "/usr/local/var/log/gitea.log";

/// launchd 标签
pub fn launchd_label(service_name: &str) -> String {
    format!("io.gitea.{}", service_name)
}

fn plist_path(service_name: &str) -> String {
    format!("{}/{}.plist", LAUNCH_DAEMON_DIR, launchd_label(service_name))
}

/// macOS 系统提供者
pub struct MacOsProvider {
    runner: Arc<dyn CommandRunner>,
    lock_retry: RetryPolicy,
    use_sudo: bool,
}

impl MacOsProvider {
    pub fn new(runner: Arc<dyn CommandRunner>, lock_retry: RetryPolicy, use_sudo: bool) -> Self {
        Self {
            runner,
            lock_retry,
            use_sudo,
        }
    }

    fn elevated_args<'a>(&self, program: &'a str, args: &[&'a str]) -> (&'a str, Vec<&'a str>) {
        if self.use_sudo {
            let mut full = vec![program];
            full.extend_from_slice(args);
            ("sudo", full)
        } else {
            (program, args.to_vec())
        }
    }

    fn launchctl(&self, args: &[&str]) -> Result<()> {
        self.privileged("launchctl", args)?;
        Ok(())
    }

    fn service_target(service_name: &str) -> String {
        format!("system/{}", launchd_label(service_name))
    }
}

impl SystemProvider for MacOsProvider {
    fn name(&self) -> &'static str {
        "macOS"
    }

    fn description(&self) -> &'static str {
        "macOS with Homebrew and launchd"
    }

    fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    fn privileged(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let (program, args) = self.elevated_args(program, args);
        Ok(self.runner.run_checked(program, &args)?)
    }

    fn privileged_with_input(&self, program: &str, args: &[&str], input: &str) -> Result<()> {
        let (program, args) = self.elevated_args(program, args);
        let output = self.runner.run_with_input(program, &args, input)?;
        if output.success() {
            Ok(())
        } else {
            Err(failed(program, &args, &output).into())
        }
    }

    // ========== 包管理 ==========
    fn has_package_manager(&self) -> bool {
        self.runner.command_exists("brew")
    }

    fn install_packages(&self, packages: &[&str]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }

        println!("🔄 Installing packages: {}", packages.join(", "));

        // Homebrew 拒绝以 root 运行，这里不提升权限
        let operation = format!("brew install {}", packages.join(" "));
        self.lock_retry
            .run_blocking(&operation, |_| {
                let mut args = vec!["install"];
                args.extend(packages);
                self.runner.run_checked("brew", &args)
            })
            .map_err(|exhausted| {
                anyhow::Error::from(exhausted.last_error).context(format!(
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
            .run("brew", &["list", "--versions", package])
            .map(|output| output.success() && !output.stdout.trim().is_empty())
            .unwrap_or(false)
    }

    fn required_packages(&self) -> &'static [&'static str] {
        &["git", "postgresql@16"]
    }

    // ========== 数据库 ==========
    fn postgres_admin_command(&self) -> Vec<String> {
        // Homebrew 的 PostgreSQL 以当前用户为超级用户
        vec!["psql".to_string(), "-d".to_string(), "postgres".to_string()]
    }

    fn postgres_dump_command(&self) -> Vec<String> {
        vec!["pg_dump".to_string()]
    }

    fn start_database(&self) -> Result<()> {
        self.runner
            .run_checked("brew", &["services", "start", "postgresql@16"])
            .context("Failed to start PostgreSQL")?;
        Ok(())
    }

    // ========== 用户管理 ==========
    fn create_system_user(&self, username: &str, _home_dir: &Path) -> Result<()> {
        if self.user_exists(username) {
            println!("✅ User '{}' already exists", username);
            return Ok(());
        }
        anyhow::bail!(
            "User '{}' does not exist. On macOS create it in System Settings or set service.run_user to an existing account",
            username
        )
    }

    fn user_exists(&self, username: &str) -> bool {
        self.runner
            .run("id", &[username])
            .map(|output| output.success())
            .unwrap_or(false)
    }

    // ========== 服务管理 ==========
    fn service_manager(&self) -> ServiceManagerKind {
        ServiceManagerKind::Launchd
    }

    fn install_service(&self, service_name: &str, content: &str) -> Result<()> {
        let path = plist_path(service_name);

        println!("🔄 Installing launchd daemon: {}", launchd_label(service_name));

        self.write_file(Path::new(&path), content)
            .with_context(|| format!("Failed to write plist: {}", path))?;

        println!("✅ Daemon '{}' installed successfully", launchd_label(service_name));
        Ok(())
    }

    fn enable_service(&self, service_name: &str) -> Result<()> {
        self.launchctl(&["enable", &Self::service_target(service_name)])
    }

    fn start_service(&self, service_name: &str) -> Result<()> {
        // bootstrap 失败通常意味着已加载，改用 kickstart
        let path = plist_path(service_name);
        if self.launchctl(&["bootstrap", "system", &path]).is_err() {
            self.launchctl(&["kickstart", &Self::service_target(service_name)])?;
        }
        Ok(())
    }

    fn stop_service(&self, service_name: &str) -> Result<()> {
        self.launchctl(&["bootout", &Self::service_target(service_name)])
    }

    fn restart_service(&self, service_name: &str) -> Result<()> {
        self.launchctl(&["kickstart", "-k", &Self::service_target(service_name)])
    }

    fn service_status(&self, service_name: &str) -> ServiceStatus {
        let target = Self::service_target(service_name);
        let (program, args) = self.elevated_args("launchctl", &["print", &target]);
        let Ok(output) = self.runner.run(program, &args) else {
            return ServiceStatus::Unknown;
        };
        if !output.success() {
            return ServiceStatus::NotFound;
        }
        let state = output
            .stdout
            .lines()
            .find_map(|line| line.trim().strip_prefix("state = "))
            .unwrap_or("");
        match state {
            "running" => ServiceStatus::Running,
            "spawn scheduled" | "xpcproxy" => ServiceStatus::Activating,
            "not running" | "waiting" => ServiceStatus::Stopped,
            _ => ServiceStatus::Unknown,
        }
    }

    fn service_logs(&self, _service_name: &str, lines: usize) -> String {
        let lines = lines.to_string();
        self.runner
            .run("tail", &["-n", &lines, LAUNCHD_LOG_FILE])
            .map(|o| o.stdout)
            .unwrap_or_else(|e| format!("(log unavailable: {e})"))
    }

    // ========== 系统信息 ==========
    fn system_version(&self) -> String {
        self.runner
            .run("sw_vers", &["-productVersion"])
            .map(|o| format!("macOS {}", o.stdout.trim()))
            .unwrap_or_else(|_| "macOS".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::runner::fake::FakeRunner;
    use std::time::Duration;

    fn provider(runner: Arc<FakeRunner>) -> MacOsProvider {
        MacOsProvider::new(runner, RetryPolicy::new(2, Duration::ZERO), true)
    }

    #[test]
    fn test_brew_runs_without_sudo() {
        let runner = Arc::new(FakeRunner::succeeding());
        provider(runner.clone())
            .install_packages(&["git", "postgresql@16"])
            .unwrap();
        assert_eq!(runner.calls(), vec!["brew install git postgresql@16"]);
    }

    #[test]
    fn test_install_service_writes_plist() {
        let runner = Arc::new(FakeRunner::succeeding());
        provider(runner.clone())
            .install_service("gitea", "<plist/>")
            .unwrap();
        assert_eq!(
            runner.calls(),
            vec!["sudo tee /Library/LaunchDaemons/io.gitea.gitea.plist"]
        );
    }

    #[test]
    fn test_launchctl_state_parsing() {
        let runner = Arc::new(FakeRunner::new(|_, _| {
            FakeRunner::ok("system/io.gitea.gitea = {\n\tstate = running\n\tpid = 42\n}")
        }));
        assert_eq!(
            provider(runner).service_status("gitea"),
            ServiceStatus::Running
        );
    }
}
