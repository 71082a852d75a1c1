//! 安装与重新配置流程
//!
//! - `binary`: 系统包 + PostgreSQL + Gitea 二进制 + 服务管理器
//! - `container`: docker compose
//! - `configure` / `regenerate_certificate`: 只改证书与配置

mod app_ini;
mod binary;
mod container;
mod wizard;

pub use app_ini::{
    has_ca_lineage, infer_mode, read_app_ini, registration_open, save_app_ini, set_registration,
    write_app_ini,
};
pub use binary::{install_binary, installed_version, parse_gitea_version, wait_for_service};
pub use container::install_container;
pub use wizard::{ModeWizard, needs_admin_email};

use anyhow::Result;
use gitea_deploy_common::{DeployConfig, DeploymentMode, EnvironmentProfile};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

use crate::provision::CertificateProvisioner;
use crate::system::providers::macos::launchd_label;
use crate::system::{
    CommandRunner, FirewallAction, ServiceManagerKind, ServiceStatus, SystemProvider,
    SystemProviderFactory,
};

/// 长时间外部调用的进度指示
pub(crate) fn spinner(message: impl Into<String>) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// 证书续期后重启二进制部署服务的命令
pub fn service_restart_command(kind: ServiceManagerKind, service_name: &str) -> String {
    match kind {
        ServiceManagerKind::Systemd => format!("systemctl restart {}", service_name),
        ServiceManagerKind::Launchd => {
            format!("launchctl kickstart -k system/{}", launchd_label(service_name))
        }
    }
}

/// 按模式开放常驻端口；签发证书用的临时端口由证书流程处理
pub fn open_ports(provider: &dyn SystemProvider, mode: &DeploymentMode) -> Result<()> {
    for exposed in mode.exposed_ports().into_iter().filter(|p| !p.transient) {
        provider.configure_firewall(exposed.port, FirewallAction::Allow)?;
    }
    Ok(())
}

/// 选择模式、供应证书、渲染 app.ini 并回写环境文件中的域名
pub fn change_mode(
    provider: &dyn SystemProvider,
    config: &DeployConfig,
    profile: &mut EnvironmentProfile,
) -> Result<DeploymentMode> {
    let wizard = ModeWizard::new(profile);
    let mode = wizard.run()?;
    let email = if needs_admin_email(&mode) {
        wizard.prompt_admin_email()?
    } else {
        None
    };

    let restart = service_restart_command(provider.service_manager(), &config.service.name);
    CertificateProvisioner::new(provider, config, restart).provision(&mode, email.as_deref())?;
    write_app_ini(provider, config, &mode, profile)?;
    if profile.persist_domain(&mode.domain())? {
        println!("✅ DOMAIN updated in {}", profile.path.display());
    }
    Ok(mode)
}

/// 只改配置，不安装软件也不触碰服务
pub fn configure(config: &DeployConfig, runner: Arc<dyn CommandRunner>) -> Result<()> {
    let mut profile = EnvironmentProfile::load(&config.env_file)?;
    let provider = SystemProviderFactory::detect(runner, &config.retry)?;

    let mode = change_mode(provider.as_ref(), config, &mut profile)?;

    println!();
    println!("✅ Configuration updated for {}", mode.root_url());
    println!(
        "   Restart the '{}' service to apply the new configuration",
        config.service.name
    );
    Ok(())
}

/// 为当前配置的模式重新生成（或重新签发）证书
///
/// 模式从现有 app.ini 推断；推断不出时询问操作员。
pub fn regenerate_certificate(
    provider: &dyn SystemProvider,
    config: &DeployConfig,
    profile: &EnvironmentProfile,
) -> Result<()> {
    let inferred = match read_app_ini(provider, config)? {
        Some(doc) => infer_mode(&doc, |domain| has_ca_lineage(provider, domain))?,
        None => None,
    };
    let mode = match inferred {
        Some(mode) => {
            println!("📋 Current mode: {}", mode);
            mode
        }
        None => {
            println!("⚠️  No existing configuration found, select the mode to issue for");
            ModeWizard::new(profile).run()?
        }
    };

    if !mode.is_https() {
        println!("ℹ️  Mode {} does not use a certificate", mode.kind());
        return Ok(());
    }

    let email = if needs_admin_email(&mode) {
        ModeWizard::new(profile).prompt_admin_email()?
    } else {
        None
    };
    let restart = service_restart_command(provider.service_manager(), &config.service.name);
    CertificateProvisioner::new(provider, config, restart).provision(&mode, email.as_deref())?;

    if provider.service_status(&config.service.name) == ServiceStatus::Running {
        provider.restart_service(&config.service.name)?;
        println!("✅ Service '{}' restarted", config.service.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::FakeRunner;
    use crate::system::providers::debian::DebianProvider;
    use gitea_deploy_common::{IssuanceMethod, RetryPolicy};

    #[test]
    fn test_restart_command_per_service_manager() {
        assert_eq!(
            service_restart_command(ServiceManagerKind::Systemd, "gitea"),
            "systemctl restart gitea"
        );
        assert_eq!(
            service_restart_command(ServiceManagerKind::Launchd, "gitea"),
            "launchctl kickstart -k system/io.gitea.gitea"
        );
    }

    #[test]
    fn test_open_ports_skips_transient_validation_port() {
        let runner = Arc::new(FakeRunner::succeeding());
        let provider = DebianProvider::new(runner.clone(), RetryPolicy::new(1, Duration::ZERO), false);

        open_ports(
            &provider,
            &DeploymentMode::HttpsDomain {
                domain: "git.example.com".to_string(),
                issuance: IssuanceMethod::CaIssued,
            },
        )
        .unwrap();
        open_ports(&provider, &DeploymentMode::http_local("")).unwrap();

        let ufw: Vec<String> = runner
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("ufw"))
            .collect();
        assert_eq!(ufw, vec!["ufw allow 443/tcp", "ufw allow 3000/tcp"]);
    }
}
