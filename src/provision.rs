//! 证书供应执行器
//!
//! 生成或签发证书并安装到证书目录。材料先在临时目录生成，再以特权
//! `install` 到目标位置，非 root 运行时同样适用。

use anyhow::{Context, Result};
use gitea_deploy_common::cert::{
    CERT_FILE_MODE, KEY_FILE_MODE, merge_crontab, remove_renewal, renewal_cron_entry,
};
use gitea_deploy_common::mode::ACME_VALIDATION_PORT;
use gitea_deploy_common::{
    AcmePlan, CertificateError, CertificateMaterial, CertificateRequest, CommandError,
    DeployConfig, DeploymentMode, IssuanceMethod, generate_self_signed,
};
use std::path::Path;
use tracing::{info, warn};

use crate::system::{FirewallAction, NetworkUtils, SystemProvider, is_root};

/// 把证书与私钥放到证书目录
pub struct CertificateProvisioner<'a> {
    provider: &'a dyn SystemProvider,
    config: &'a DeployConfig,
    restart_command: String,
    owner: String,
}

impl<'a> CertificateProvisioner<'a> {
    /// `restart_command` 写入续期钩子，证书更新后由 cron 执行
    pub fn new(
        provider: &'a dyn SystemProvider,
        config: &'a DeployConfig,
        restart_command: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            config,
            restart_command: restart_command.into(),
            owner: config.service.run_user.clone(),
        }
    }

    /// 证书文件属主，默认是 Gitea 运行用户；容器部署时为镜像内的 uid:gid
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn material(&self) -> CertificateMaterial {
        self.config.paths.certificate_material()
    }

    /// 按模式供应证书；HTTP 模式不需要证书，返回 None
    ///
    /// 非 CA 模式会移除之前写入的续期任务，避免旧钩子覆盖新材料。
    pub fn provision(
        &self,
        mode: &DeploymentMode,
        admin_email: Option<&str>,
    ) -> Result<Option<CertificateMaterial>> {
        let Some(request) = mode.certificate_request() else {
            info!(mode = %mode.kind(), "no certificate required");
            self.cancel_renewal()?;
            return Ok(None);
        };

        match request.method {
            IssuanceMethod::SelfSigned => {
                self.cancel_renewal()?;
                self.self_signed(&request)?;
            }
            IssuanceMethod::CaIssued => {
                let plan = AcmePlan::new(
                    &request,
                    admin_email.map(str::to_string),
                    self.material(),
                    self.restart_command.clone(),
                )?
                .with_owner(&self.owner);
                self.ca_issued(&plan)?;
                self.schedule_renewal(&plan)?;
            }
        }

        Ok(Some(self.material()))
    }

    /// 生成新的自签名证书，总是覆盖已有材料
    pub fn self_signed(&self, request: &CertificateRequest) -> Result<()> {
        println!("🔐 Generating self-signed certificate for {}", request.subject);

        let generated = generate_self_signed(request)?;
        let staging = tempfile::tempdir().context("Failed to create staging directory")?;
        let staged = CertificateMaterial::in_dir(staging.path());
        generated.install(&staged)?;

        self.install_files(&staged.cert_path, &staged.key_path)?;

        println!(
            "✅ Self-signed certificate installed ({} days): {}",
            request.validity_days,
            self.material().cert_path.display()
        );
        Ok(())
    }

    /// certbot standalone 签发；失败时不退回自签名
    pub fn ca_issued(&self, plan: &AcmePlan) -> Result<()> {
        println!(
            "⚠️  certbot binds port {} for the HTTP challenge; stop any web server using it first",
            ACME_VALIDATION_PORT
        );
        // 非 root 无法绑定低端口，探测结果没有意义
        if is_root() && !NetworkUtils::is_port_free(ACME_VALIDATION_PORT) {
            warn!(
                port = ACME_VALIDATION_PORT,
                "port appears to be in use, certificate issuance will likely fail"
            );
            println!("⚠️  Port {} appears to be in use", ACME_VALIDATION_PORT);
        }

        if !self.provider.runner().command_exists("certbot") {
            self.provider
                .install_packages(&["certbot"])
                .context("Failed to install certbot")?;
        }

        let opened = self
            .provider
            .configure_firewall(ACME_VALIDATION_PORT, FirewallAction::Allow)?;

        println!("🔄 Requesting certificate for {} ...", plan.domain);
        let args = plan.certonly_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let issued = self.provider.privileged("certbot", &args);

        if opened
            && let Err(e) = self
                .provider
                .configure_firewall(ACME_VALIDATION_PORT, FirewallAction::Delete)
        {
            warn!(error = %e, port = ACME_VALIDATION_PORT, "failed to close port after issuance");
        }

        if let Err(err) = issued {
            let output = match err.downcast_ref::<CommandError>() {
                Some(CommandError::Failed { stderr, .. }) => stderr.clone(),
                _ => err.to_string(),
            };
            return Err(CertificateError::Issuance {
                domain: plan.domain.clone(),
                output,
            }
            .into());
        }

        self.install_files(&plan.live_fullchain(), &plan.live_privkey())?;
        println!("✅ Certificate issued for {}", plan.domain);
        Ok(())
    }

    /// 写入每日续期任务，替换之前的续期条目；已是相同条目时不改动，返回是否写入
    pub fn schedule_renewal(&self, plan: &AcmePlan) -> Result<bool> {
        let entry = renewal_cron_entry(plan);

        let Some(merged) = merge_crontab(&self.current_crontab(), &entry) else {
            info!("renewal cron entry already present");
            return Ok(false);
        };

        self.provider
            .privileged_with_input("crontab", &["-"], &merged)
            .context("Failed to install renewal cron entry")?;
        println!("✅ Daily certificate renewal scheduled");
        Ok(true)
    }

    /// 移除之前写入的续期任务，返回是否有改动
    pub fn cancel_renewal(&self) -> Result<bool> {
        let Some(cleaned) = remove_renewal(&self.current_crontab()) else {
            return Ok(false);
        };

        self.provider
            .privileged_with_input("crontab", &["-"], &cleaned)
            .context("Failed to remove renewal cron entry")?;
        info!("renewal cron entry removed");
        println!("✅ Certificate renewal job removed");
        Ok(true)
    }

    fn current_crontab(&self) -> String {
        // 没有 crontab 时 `crontab -l` 以非零退出
        self.provider
            .privileged("crontab", &["-l"])
            .map(|output| output.stdout)
            .unwrap_or_default()
    }

    fn install_files(&self, cert_source: &Path, key_source: &Path) -> Result<()> {
        let material = self.material();
        if let Some(dir) = material.cert_path.parent() {
            self.provider.create_directory(dir, Some(0o755))?;
        }

        let cert_mode = format!("{CERT_FILE_MODE:o}");
        let key_mode = format!("{KEY_FILE_MODE:o}");
        let cert_source = cert_source.to_string_lossy();
        let key_source = key_source.to_string_lossy();
        let cert_dest = material.cert_path.to_string_lossy();
        let key_dest = material.key_path.to_string_lossy();

        self.provider
            .privileged("install", &["-m", &cert_mode, &cert_source, &cert_dest])
            .context("Failed to install certificate")?;
        self.provider
            .privileged("install", &["-m", &key_mode, &key_source, &key_dest])
            .context("Failed to install private key")?;

        let numeric = self.owner.chars().all(|c| c.is_ascii_digit() || c == ':');
        if numeric || self.provider.user_exists(&self.owner) {
            self.provider
                .privileged("chown", &[&self.owner, &cert_dest, &key_dest])
                .context("Failed to change certificate owner")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::FakeRunner;
    use crate::system::providers::debian::DebianProvider;
    use gitea_deploy_common::RetryPolicy;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn provider(runner: Arc<FakeRunner>) -> DebianProvider {
        DebianProvider::new(runner, RetryPolicy::new(1, Duration::ZERO), true)
    }

    fn config(cert_dir: &Path) -> DeployConfig {
        let mut config = DeployConfig::default();
        config.paths.cert_dir = cert_dir.to_path_buf();
        config
    }

    fn domain_mode(issuance: IssuanceMethod) -> DeploymentMode {
        DeploymentMode::HttpsDomain {
            domain: "git.example.com".to_string(),
            issuance,
        }
    }

    #[test]
    fn test_http_mode_needs_no_certificate() {
        let runner = Arc::new(FakeRunner::succeeding());
        let provider = provider(runner.clone());
        let config = DeployConfig::default();
        let provisioner = CertificateProvisioner::new(&provider, &config, "true");

        let material = provisioner
            .provision(&DeploymentMode::http_local(""), None)
            .unwrap();
        assert!(material.is_none());
        assert_eq!(runner.calls(), vec!["sudo crontab -l"]);
    }

    #[test]
    fn test_self_signed_installs_with_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::succeeding());
        let provider = provider(runner.clone());
        let config = config(dir.path());
        let provisioner = CertificateProvisioner::new(&provider, &config, "true");

        let material = provisioner
            .provision(&DeploymentMode::HttpsLocalhost, None)
            .unwrap()
            .unwrap();
        assert_eq!(material.cert_path, dir.path().join("cert.pem"));

        let calls = runner.calls();
        let cert_dest = format!("{}", dir.path().join("cert.pem").display());
        let key_dest = format!("{}", dir.path().join("key.pem").display());
        assert!(calls.iter().any(|c| c.starts_with("sudo install -m 644 ") && c.ends_with(&cert_dest)));
        assert!(calls.iter().any(|c| c.starts_with("sudo install -m 600 ") && c.ends_with(&key_dest)));
        assert!(calls.contains(&format!("sudo chown git {cert_dest} {key_dest}")));
        assert!(!calls.iter().any(|c| c.contains("certbot")));
    }

    #[test]
    fn test_numeric_owner_for_container() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::new(|line, _| {
            if line.starts_with("id ") {
                FakeRunner::fail("no such user")
            } else {
                FakeRunner::ok("")
            }
        }));
        let provider = provider(runner.clone());
        let config = config(dir.path());
        let provisioner =
            CertificateProvisioner::new(&provider, &config, "true").with_owner("1000:1000");

        provisioner
            .provision(&DeploymentMode::HttpsLocalhost, None)
            .unwrap();
        assert!(runner.calls().iter().any(|c| c.starts_with("sudo chown 1000:1000 ")));
    }

    #[test]
    fn test_ca_failure_is_fatal_with_verbatim_output() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::new(|line, _| {
            if line.starts_with("sudo certbot") {
                FakeRunner::fail("Problem binding to port 80: Could not bind to IPv4 or IPv6.")
            } else {
                FakeRunner::ok("")
            }
        }));
        let provider = provider(runner.clone());
        let config = config(dir.path());
        let provisioner = CertificateProvisioner::new(&provider, &config, "true");

        let err = provisioner
            .provision(&domain_mode(IssuanceMethod::CaIssued), Some("ops@example.com"))
            .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("Problem binding to port 80"));

        let calls = runner.calls();
        let allow = calls.iter().position(|c| c == "sudo ufw allow 80/tcp").unwrap();
        let certbot = calls.iter().position(|c| c.starts_with("sudo certbot certonly")).unwrap();
        let delete = calls
            .iter()
            .position(|c| c == "sudo ufw delete allow 80/tcp")
            .unwrap();
        assert!(allow < certbot && certbot < delete);
        // 没有退回自签名，也没有安装任何材料
        assert!(!calls.iter().any(|c| c.contains("install -m")));
        assert!(!calls.iter().any(|c| c.starts_with("sudo crontab")));
    }

    #[test]
    fn test_ca_success_copies_live_files_and_schedules_renewal() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::new(|line, _| {
            if line == "sudo crontab -l" {
                FakeRunner::fail("no crontab for root")
            } else {
                FakeRunner::ok("")
            }
        }));
        let provider = provider(runner.clone());
        let config = config(dir.path());
        let provisioner =
            CertificateProvisioner::new(&provider, &config, "systemctl restart gitea");

        provisioner
            .provision(&domain_mode(IssuanceMethod::CaIssued), None)
            .unwrap();

        let calls = runner.calls();
        assert!(calls.iter().any(|c| c.starts_with("sudo install -m 644 /etc/letsencrypt/live/git.example.com/fullchain.pem")));
        assert!(calls.iter().any(|c| c.starts_with("sudo install -m 600 /etc/letsencrypt/live/git.example.com/privkey.pem")));

        let inputs = runner.inputs();
        let crontab = inputs.last().unwrap();
        assert_eq!(crontab.lines().count(), 1);
        assert!(crontab.contains("certbot renew"));
        assert!(crontab.contains("systemctl restart gitea"));
    }

    #[test]
    fn test_renewal_entry_is_not_duplicated() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let request = CertificateRequest::new(
            gitea_deploy_common::CertSubject::Domain("git.example.com".to_string()),
            IssuanceMethod::CaIssued,
        );
        let plan = AcmePlan::new(&request, None, config.paths.certificate_material(), "true")
            .unwrap();
        let existing = format!("{}\n", renewal_cron_entry(&plan));

        let runner = Arc::new(FakeRunner::new(move |line, _| {
            if line == "sudo crontab -l" {
                FakeRunner::ok(&existing)
            } else {
                FakeRunner::ok("")
            }
        }));
        let provider = provider(runner.clone());
        let provisioner = CertificateProvisioner::new(&provider, &config, "true");

        assert!(!provisioner.schedule_renewal(&plan).unwrap());
        assert!(runner.inputs().is_empty());
    }

    #[test]
    fn test_renewal_follows_domain_changes() {
        let dir = tempfile::tempdir().unwrap();
        let crontab = Arc::new(Mutex::new("0 0 * * * /usr/local/bin/backup\n".to_string()));
        let state = crontab.clone();
        let runner = Arc::new(FakeRunner::new(move |line, input| match (line, input) {
            ("sudo crontab -l", _) => FakeRunner::ok(&state.lock().unwrap()),
            ("sudo crontab -", Some(content)) => {
                *state.lock().unwrap() = content.to_string();
                FakeRunner::ok("")
            }
            _ => FakeRunner::ok(""),
        }));
        let provider = provider(runner.clone());
        let config = config(dir.path());
        let provisioner =
            CertificateProvisioner::new(&provider, &config, "systemctl restart gitea");

        let ca = |domain: &str| DeploymentMode::HttpsDomain {
            domain: domain.to_string(),
            issuance: IssuanceMethod::CaIssued,
        };
        let renewals = |content: &str| {
            content
                .lines()
                .filter(|line| line.contains("certbot renew"))
                .map(str::to_string)
                .collect::<Vec<_>>()
        };

        provisioner.provision(&ca("old.example.com"), None).unwrap();
        provisioner.provision(&ca("new.example.com"), None).unwrap();
        let current = renewals(&crontab.lock().unwrap());
        assert_eq!(current.len(), 1);
        assert!(current[0].contains("/etc/letsencrypt/live/new.example.com/fullchain.pem"));

        provisioner
            .provision(&DeploymentMode::HttpsLocalhost, None)
            .unwrap();
        let final_tab = crontab.lock().unwrap().clone();
        assert!(renewals(&final_tab).is_empty());
        assert_eq!(final_tab, "0 0 * * * /usr/local/bin/backup\n");
    }
}
