//! Deployment mode prompts

use anyhow::Result;
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};
use gitea_deploy_common::{DeploymentMode, EnvironmentProfile, IssuanceMethod, ModeKind};

use crate::system::NetworkUtils;

/// Interactive mode selection
pub struct ModeWizard<'a> {
    theme: ColorfulTheme,
    profile: &'a EnvironmentProfile,
}

impl<'a> ModeWizard<'a> {
    pub fn new(profile: &'a EnvironmentProfile) -> Self {
        Self {
            theme: ColorfulTheme::default(),
            profile,
        }
    }

    /// Select a mode and collect the data that mode needs
    pub fn run(&self) -> Result<DeploymentMode> {
        println!("🌐 Deployment Mode");
        println!("═══════════════════════════════════");
        for (index, kind) in ModeKind::ALL.iter().enumerate() {
            println!("  {}) {:<16} {}", index + 1, kind.as_str(), kind.description());
        }
        println!();

        let kind = self.select_kind()?;
        let mode = self.resolve(kind)?;
        println!("✅ Mode: {}", mode);
        Ok(mode)
    }

    /// Re-prompt until the input names a mode
    pub fn select_kind(&self) -> Result<ModeKind> {
        loop {
            let input: String = Input::with_theme(&self.theme)
                .with_prompt("Deployment mode [1-4]")
                .interact_text()?;
            match input.parse::<ModeKind>() {
                Ok(kind) => return Ok(kind),
                Err(e) => println!("❌ {}", e),
            }
        }
    }

    pub fn resolve(&self, kind: ModeKind) -> Result<DeploymentMode> {
        match kind {
            ModeKind::HttpLocal => {
                let domain: String = Input::with_theme(&self.theme)
                    .with_prompt("Domain or host name (empty for localhost)")
                    .default(self.profile.domain.clone().unwrap_or_default())
                    .allow_empty(true)
                    .interact_text()?;
                Ok(DeploymentMode::http_local(&domain))
            }
            ModeKind::HttpsLocalhost => Ok(DeploymentMode::HttpsLocalhost),
            ModeKind::HttpsDomain => {
                let domain = self.prompt_domain()?;
                let issuance = self.select_issuance()?;
                Ok(DeploymentMode::HttpsDomain { domain, issuance })
            }
            ModeKind::HttpsIp => self.prompt_ip(),
        }
    }

    fn prompt_domain(&self) -> Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt("Domain name (DNS must point to this host)")
            .validate_with(|value: &String| -> std::result::Result<(), &str> {
                let value = value.trim();
                if value.is_empty() || value.contains(char::is_whitespace) {
                    Err("enter a bare domain name")
                } else if value.contains("://") || value.contains('/') {
                    Err("enter the domain without scheme or path")
                } else {
                    Ok(())
                }
            });
        if let Some(domain) = self
            .profile
            .domain
            .as_ref()
            .filter(|d| d.as_str() != "localhost")
        {
            input = input.default(domain.clone());
        }
        Ok(input.interact_text()?.trim().to_string())
    }

    fn select_issuance(&self) -> Result<IssuanceMethod> {
        let options = [
            "Certificate authority (Let's Encrypt via certbot, needs port 80)",
            "Self-signed",
        ];
        let selection = Select::with_theme(&self.theme)
            .with_prompt("Certificate")
            .items(&options)
            .default(0)
            .interact()?;
        Ok(if selection == 0 {
            IssuanceMethod::CaIssued
        } else {
            IssuanceMethod::SelfSigned
        })
    }

    fn prompt_ip(&self) -> Result<DeploymentMode> {
        let detected = NetworkUtils::detect_primary_ip();
        let accept = match detected {
            Some(ip) => Confirm::with_theme(&self.theme)
                .with_prompt(format!("Use detected IP address {}?", ip))
                .default(true)
                .interact()?,
            None => {
                println!("⚠️  Could not detect the host IP address");
                false
            }
        };
        if accept {
            return Ok(DeploymentMode::https_ip(detected, true, None)?);
        }

        loop {
            let manual: String = Input::with_theme(&self.theme)
                .with_prompt("IP address")
                .interact_text()?;
            match DeploymentMode::https_ip(detected, false, Some(&manual)) {
                Ok(mode) => return Ok(mode),
                Err(e) => println!("❌ {}", e),
            }
        }
    }

    /// Contact address for the certificate authority; empty registers without one
    pub fn prompt_admin_email(&self) -> Result<Option<String>> {
        let email: String = Input::with_theme(&self.theme)
            .with_prompt("Administrator email for certificate expiry notices (optional)")
            .default(self.profile.admin_email.clone().unwrap_or_default())
            .allow_empty(true)
            .interact_text()?;
        let email = email.trim();
        Ok((!email.is_empty()).then(|| email.to_string()))
    }
}

/// Whether the mode asks the certificate authority for a certificate
pub fn needs_admin_email(mode: &DeploymentMode) -> bool {
    matches!(
        mode,
        DeploymentMode::HttpsDomain {
            issuance: IssuanceMethod::CaIssued,
            ..
        }
    )
}
