//! Binary install: packages, PostgreSQL, Gitea binary and service unit

use anyhow::{Context, Result};
use gitea_deploy_common::release::{download_binary, download_url, resolve_version};
use gitea_deploy_common::{
    DeployConfig, EnvironmentProfile, HttpReleaseSource, Platform,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::{ModeWizard, needs_admin_email, open_ports, service_restart_command, spinner, write_app_ini};
use crate::cli::InstallTarget;
use crate::error::Error;
use crate::provision::CertificateProvisioner;
use crate::system::{
    CommandRunner, PostgresAdmin, ServiceStatus, SetupOutcome, SystemProvider,
    SystemProviderFactory, ensure_preconditions,
};
use crate::template::ServiceUnitTemplate;

/// Lines of service log shown when activation fails
const LOG_TAIL_LINES: usize = 30;

/// Install Gitea as a native service
pub async fn install_binary(config: &DeployConfig, runner: Arc<dyn CommandRunner>) -> Result<()> {
    ensure_preconditions(runner.as_ref(), config, InstallTarget::Binary)?;

    let mut profile = EnvironmentProfile::load(&config.env_file)?;
    println!("✅ Loaded environment from {}", config.env_file.display());

    let wizard = ModeWizard::new(&profile);
    let mode = wizard.run()?;
    let email = if needs_admin_email(&mode) {
        wizard.prompt_admin_email()?
    } else {
        None
    };

    let provider = SystemProviderFactory::detect(runner, &config.retry)?;
    println!("🖥️  {} ({})", provider.name(), provider.system_version());
    let provider = provider.as_ref();

    // 系统包与数据库
    install_packages(provider)?;
    provider.start_database()?;
    setup_database(provider, &profile)?;

    // 运行用户与目录
    prepare_filesystem(provider, config)?;

    // Gitea 二进制
    install_gitea_binary(provider, config).await?;

    // 证书与配置
    let restart = service_restart_command(provider.service_manager(), &config.service.name);
    CertificateProvisioner::new(provider, config, restart).provision(&mode, email.as_deref())?;
    write_app_ini(provider, config, &mode, &profile)?;

    open_ports(provider, &mode)?;

    // 服务
    let unit = ServiceUnitTemplate::from_config(config).render(provider.service_manager());
    provider.install_service(&config.service.name, &unit)?;
    provider.enable_service(&config.service.name)?;
    if provider.service_status(&config.service.name) == ServiceStatus::Running {
        provider.restart_service(&config.service.name)?;
    } else {
        provider.start_service(&config.service.name)?;
    }
    wait_for_service(provider, config)?;

    profile.persist_domain(&mode.domain())?;

    println!();
    println!("🎉 Gitea is running at {}", mode.root_url());
    println!("   Finish the initial setup in the web installer");
    Ok(())
}

fn install_packages(provider: &dyn SystemProvider) -> Result<()> {
    let missing: Vec<&str> = provider
        .required_packages()
        .iter()
        .copied()
        .filter(|package| !provider.is_package_installed(package))
        .collect();
    if missing.is_empty() {
        println!("✅ Required packages already installed");
        return Ok(());
    }
    provider.install_packages(&missing)
}

fn setup_database(provider: &dyn SystemProvider, profile: &EnvironmentProfile) -> Result<()> {
    let admin = PostgresAdmin::new(provider.runner(), provider.postgres_admin_command());
    let report = admin
        .setup(&profile.database)
        .context("Failed to set up the PostgreSQL role and database")?;

    for (what, name, outcome) in [
        ("Role", &profile.database.user, report.role),
        ("Database", &profile.database.name, report.database),
    ] {
        match outcome {
            SetupOutcome::Created => println!("✅ {} '{}' created", what, name),
            SetupOutcome::AlreadyExists => println!("✅ {} '{}' already exists", what, name),
        }
    }
    Ok(())
}

fn prepare_filesystem(provider: &dyn SystemProvider, config: &DeployConfig) -> Result<()> {
    let run_user = &config.service.run_user;
    provider.create_system_user(run_user, &config.paths.work_dir)?;

    for dir in config.paths.install_directories() {
        provider.create_directory(&dir, Some(0o750))?;
    }
    // Web 安装器需要写回 app.ini
    provider.set_file_owner(&config.paths.work_dir, run_user)?;
    provider.set_file_owner(&config.paths.config_dir, run_user)?;
    Ok(())
}

async fn install_gitea_binary(provider: &dyn SystemProvider, config: &DeployConfig) -> Result<()> {
    let source = HttpReleaseSource::new()?;
    let platform = Platform::detect()?;
    let version = resolve_version(&source, &config.retry.version_lookup).await;

    let binary_path = &config.paths.binary_path;
    if installed_version(provider, binary_path).as_deref() == Some(version.as_str()) {
        println!("✅ Gitea {} already installed at {}", version, binary_path.display());
        return Ok(());
    }

    let url = download_url(&version, platform);
    let staging = tempfile::tempdir().context("Failed to create staging directory")?;
    let progress = spinner(format!("Downloading Gitea {} ({})", version, platform.asset_suffix()));
    let downloaded =
        match download_binary(&source, &url, &staging.path().join("gitea"), &config.retry.download)
            .await
        {
            Ok(path) => {
                progress.finish_with_message(format!("Downloaded Gitea {}", version));
                path
            }
            Err(e) => {
                progress.abandon_with_message("Download failed");
                return Err(e.into());
            }
        };

    let downloaded = downloaded.to_string_lossy();
    let dest = binary_path.to_string_lossy();
    provider
        .privileged("install", &["-m", "755", &downloaded, &dest])
        .with_context(|| format!("Failed to install binary to {}", dest))?;
    info!(version = %version, path = %dest, "gitea binary installed");
    println!("✅ Gitea {} installed at {}", version, dest);
    Ok(())
}

/// Version reported by an installed binary
pub fn installed_version(provider: &dyn SystemProvider, binary_path: &Path) -> Option<String> {
    let output = provider
        .runner()
        .run(&binary_path.to_string_lossy(), &["--version"])
        .ok()?;
    if !output.success() {
        return None;
    }
    parse_gitea_version(&output.stdout)
}

/// Extract the version from `Gitea version 1.22.3 built with ...`
pub fn parse_gitea_version(output: &str) -> Option<String> {
    let mut words = output.split_whitespace();
    words
        .by_ref()
        .find(|word| *word == "version")
        .and(words.next())
        .map(|version| version.trim_start_matches('v').to_string())
}

/// Poll the service manager until the service is running
///
/// Exhaustion prints the tail of the service log and fails.
pub fn wait_for_service(provider: &dyn SystemProvider, config: &DeployConfig) -> Result<()> {
    let name = &config.service.name;
    let outcome = config
        .retry
        .service_start
        .run_blocking("service activation", |_| match provider.service_status(name) {
            ServiceStatus::Running => Ok(()),
            other => Err(other),
        });

    match outcome {
        Ok(()) => {
            println!("✅ Service '{}' is running", name);
            Ok(())
        }
        Err(exhausted) => {
            eprintln!("❌ Service '{}' did not start. Recent log:", name);
            eprintln!("{}", provider.service_logs(name, LOG_TAIL_LINES));
            Err(Error::service_startup(format!(
                "'{}' is {} after {} checks",
                name, exhausted.last_error, exhausted.attempts
            ))
            .into())
        }
    }
}
