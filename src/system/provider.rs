//! 系统操作抽象层
//!
//! 定义跨平台的系统操作接口：Linux 上使用 apt + systemd + ufw，
//! macOS 上使用 Homebrew + launchd

use anyhow::Result;
use gitea_deploy_common::config::RetryConfig;
use std::path::Path;
use std::sync::Arc;

use super::runner::{CommandOutput, CommandRunner};

/// 服务管理器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceManagerKind {
    Systemd,
    Launchd,
}

/// 系统操作提供者 trait
pub trait SystemProvider {
    /// 获取系统提供者的名称
    fn name(&self) -> &'static str;

    /// 获取系统描述
    fn description(&self) -> &'static str;

    /// 命令执行器
    fn runner(&self) -> &dyn CommandRunner;

    /// 以特权执行命令（非 root 时经 sudo），失败时保留原始输出
    fn privileged(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// 以特权执行并把 `input` 写入标准输入
    fn privileged_with_input(&self, program: &str, args: &[&str], input: &str) -> Result<()>;

    /// 以特权写入文件（经 tee）
    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        self.privileged_with_input("tee", &[&path.to_string_lossy()], content)
    }

    // ========== 包管理 ==========
    /// 检查是否有包管理器
    fn has_package_manager(&self) -> bool;

    /// 安装系统包，包管理器锁竞争时按策略重试
    fn install_packages(&self, packages: &[&str]) -> Result<()>;

    /// 检查包是否已安装
    fn is_package_installed(&self, package: &str) -> bool;

    /// Gitea 二进制部署需要的系统包
    fn required_packages(&self) -> &'static [&'static str];

    // ========== 数据库 ==========
    /// 以数据库超级用户身份执行 psql 的命令前缀
    fn postgres_admin_command(&self) -> Vec<String>;

    /// 以数据库超级用户身份执行 pg_dump 的命令前缀
    fn postgres_dump_command(&self) -> Vec<String>;

    /// 启动并设置数据库开机自启
    fn start_database(&self) -> Result<()>;

    // ========== 用户管理 ==========
    /// 创建运行 Gitea 的系统用户（已存在时跳过）
    fn create_system_user(&self, username: &str, home_dir: &Path) -> Result<()>;

    /// 检查用户是否存在
    fn user_exists(&self, username: &str) -> bool;

    // ========== 服务管理 ==========
    fn service_manager(&self) -> ServiceManagerKind;

    /// 写入服务定义（systemd unit / launchd plist）并让服务管理器重新加载
    fn install_service(&self, service_name: &str, content: &str) -> Result<()>;

    /// 启用并启动服务
    fn enable_service(&self, service_name: &str) -> Result<()>;

    fn start_service(&self, service_name: &str) -> Result<()>;

    fn stop_service(&self, service_name: &str) -> Result<()>;

    fn restart_service(&self, service_name: &str) -> Result<()>;

    fn service_status(&self, service_name: &str) -> ServiceStatus;

    /// 服务日志的最后若干行
    fn service_logs(&self, service_name: &str, lines: usize) -> String;

    // ========== 文件和权限管理 ==========
    /// 创建目录（带权限）
    fn create_directory(&self, path: &Path, mode: Option<u32>) -> Result<()> {
        self.privileged("mkdir", &["-p", &path.to_string_lossy()])?;
        if let Some(mode) = mode {
            self.set_file_permissions(path, mode)?;
        }
        Ok(())
    }

    /// 递归设置所有者
    fn set_file_owner(&self, path: &Path, user: &str) -> Result<()> {
        self.privileged("chown", &["-R", user, &path.to_string_lossy()])?;
        Ok(())
    }

    /// 设置文件权限
    fn set_file_permissions(&self, path: &Path, mode: u32) -> Result<()> {
        let mode_str = format!("{:o}", mode);
        self.privileged("chmod", &[&mode_str, &path.to_string_lossy()])?;
        Ok(())
    }

    // ========== 网络和防火墙 ==========
    /// 配置防火墙规则，返回是否实际应用（无受支持的防火墙时返回 false）
    fn configure_firewall(&self, port: u16, action: FirewallAction) -> Result<bool> {
        println!(
            "⚠️  Firewall configuration not implemented for {}; {} port {}/tcp manually",
            self.name(),
            action.verb(),
            port
        );
        Ok(false)
    }

    // ========== 系统信息 ==========
    fn system_version(&self) -> String;
}

/// 服务状态
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceStatus {
    /// 服务正在运行
    Running,
    /// 服务已停止
    Stopped,
    /// 服务正在启动
    Activating,
    /// 服务不存在
    NotFound,
    /// 服务有错误
    Failed(String),
    /// 服务状态未知
    Unknown,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceStatus::Running => f.write_str("running"),
            ServiceStatus::Stopped => f.write_str("stopped"),
            ServiceStatus::Activating => f.write_str("activating"),
            ServiceStatus::NotFound => f.write_str("not found"),
            ServiceStatus::Failed(reason) => write!(f, "failed ({reason})"),
            ServiceStatus::Unknown => f.write_str("unknown"),
        }
    }
}

/// 防火墙操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirewallAction {
    Allow,
    Delete,
}

impl FirewallAction {
    pub fn verb(&self) -> &'static str {
        match self {
            FirewallAction::Allow => "open",
            FirewallAction::Delete => "close",
        }
    }
}

/// 系统提供者工厂
pub struct SystemProviderFactory;

impl SystemProviderFactory {
    /// 检测当前系统并返回相应的系统提供者
    pub fn detect(
        runner: Arc<dyn CommandRunner>,
        retry: &RetryConfig,
    ) -> Result<Box<dyn SystemProvider>> {
        let use_sudo = !super::is_root();
        if cfg!(target_os = "linux") {
            if Self::is_debian_based() {
                Ok(Box::new(super::providers::debian::DebianProvider::new(
                    runner,
                    retry.package_lock,
                    use_sudo,
                )))
            } else {
                Err(anyhow::anyhow!(
                    "Only Debian-based Linux distributions are supported (apt-get required)"
                ))
            }
        } else if cfg!(target_os = "macos") {
            Ok(Box::new(super::providers::macos::MacOsProvider::new(
                runner,
                retry.package_lock,
                use_sudo,
            )))
        } else {
            Err(anyhow::anyhow!("Unsupported operating system"))
        }
    }

    /// 检查是否为 Debian 系发行版
    fn is_debian_based() -> bool {
        std::fs::read_to_string("/etc/os-release")
            .map(|content| {
                let content = content.to_lowercase();
                content.contains("debian") || content.contains("ubuntu") || content.contains("mint")
            })
            .unwrap_or(false)
            || Path::new("/usr/bin/apt-get").exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_status_display() {
        assert_eq!(ServiceStatus::Running.to_string(), "running");
        assert_eq!(
            ServiceStatus::Failed("exit-code".to_string()).to_string(),
            "failed (exit-code)"
        );
        assert_ne!(ServiceStatus::Running, ServiceStatus::Stopped);
    }

    #[test]
    fn test_firewall_action_verb() {
        assert_eq!(FirewallAction::Allow.verb(), "open");
        assert_eq!(FirewallAction::Delete.verb(), "close");
    }
}
