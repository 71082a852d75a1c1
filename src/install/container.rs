//! Container install through docker compose

use anyhow::Result;
use gitea_deploy_common::{DeployConfig, EnvironmentProfile};
use std::sync::Arc;

use super::{ModeWizard, needs_admin_email, open_ports};
use crate::cli::InstallTarget;
use crate::docker::{compose_up, detect_compose, restart_command, write_compose_file};
use crate::error::Error;
use crate::provision::CertificateProvisioner;
use crate::system::{CommandRunner, SystemProviderFactory, ensure_preconditions};

/// uid:gid of the git user inside the Gitea image
const CONTAINER_OWNER: &str = "1000:1000";

/// Install Gitea and PostgreSQL as compose services
pub fn install_container(config: &DeployConfig, runner: Arc<dyn CommandRunner>) -> Result<()> {
    ensure_preconditions(runner.as_ref(), config, InstallTarget::Docker)?;
    let flavor = detect_compose(runner.as_ref())
        .ok_or_else(|| Error::precondition("docker compose is not available"))?;

    let mut profile = EnvironmentProfile::load(&config.env_file)?;
    println!("✅ Loaded environment from {}", config.env_file.display());

    let wizard = ModeWizard::new(&profile);
    let mode = wizard.run()?;
    let email = if needs_admin_email(&mode) {
        wizard.prompt_admin_email()?
    } else {
        None
    };

    let provider = SystemProviderFactory::detect(runner.clone(), &config.retry)?;
    let provider = provider.as_ref();

    let compose_file = config.paths.compose_file();
    CertificateProvisioner::new(provider, config, restart_command(flavor, &compose_file))
        .with_owner(CONTAINER_OWNER)
        .provision(&mode, email.as_deref())?;

    let compose_file = write_compose_file(provider, &mode, &profile, config)?;
    compose_up(runner.as_ref(), flavor, &compose_file)?;

    open_ports(provider, &mode)?;
    profile.persist_domain(&mode.domain())?;

    println!();
    println!("🎉 Gitea is starting at {}", mode.root_url());
    println!(
        "   SSH clone port: {}",
        config.service.container_ssh_port
    );
    Ok(())
}
