//! Gitea 部署工具主程序
//!
//! 交互式安装、重新配置、证书、备份与恢复

mod backup;
mod cli;
mod docker;
mod error;
mod install;
mod menu;
mod observability;
mod provision;
mod system;
mod template;

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::{Confirm, theme::ColorfulTheme};
use gitea_deploy_common::{DeployConfig, EnvironmentProfile};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

use backup::BackupManager;
use cli::{Cli, Commands, InstallTarget};
use menu::MenuApplication;
use menu::framework::PageContext;
use menu::framework::screen::Screen;
use observability::init_observability;
use system::{CommandRunner, SystemProviderFactory, SystemRunner};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // test 子命令只校验设置文件，不初始化日志
    if let Some(Commands::Test { config_file }) = &cli.command {
        let path = config_file.as_ref().unwrap_or(&cli.config);
        return match test_config_file(path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("❌ {:#}", e);
                ExitCode::FAILURE
            }
        };
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "command failed");
            eprintln!();
            eprintln!("❌ {}", e);
            for cause in e.chain().skip(1) {
                eprintln!("   caused by: {}", cause);
            }
            if is_precondition(&e) {
                eprintln!("💡 Run `gitea-deploy deps` to check the host");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = DeployConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load settings from {}", cli.config.display()))?;
    let _guard = init_observability(&config, cli.debug)?;
    info!(settings = %cli.config.display(), "gitea-deploy starting");

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);

    match cli.command {
        Some(Commands::Install { target }) => match target {
            InstallTarget::Binary => install::install_binary(&config, runner).await,
            InstallTarget::Docker => install::install_container(&config, runner),
        },
        Some(Commands::Configure) => install::configure(&config, runner),
        Some(Commands::Cert) => {
            let provider = SystemProviderFactory::detect(runner, &config.retry)?;
            let profile = EnvironmentProfile::load(&config.env_file)?;
            install::regenerate_certificate(provider.as_ref(), &config, &profile)
        }
        Some(Commands::Backup) => {
            let provider = SystemProviderFactory::detect(runner, &config.retry)?;
            let profile = EnvironmentProfile::load(&config.env_file)?;
            BackupManager::new(provider.as_ref(), &config)
                .backup(&profile, chrono::Local::now())
                .map(|_| ())
        }
        Some(Commands::Restore { archive }) => {
            let provider = SystemProviderFactory::detect(runner, &config.retry)?;
            let profile = EnvironmentProfile::load(&config.env_file)?;
            let confirmed = Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(format!(
                    "Restoring replaces database '{}' and the contents of {}. Continue?",
                    profile.database.name,
                    config.paths.work_dir.display()
                ))
                .default(false)
                .interact()?;
            if !confirmed {
                println!("Restore cancelled");
                return Ok(());
            }
            BackupManager::new(provider.as_ref(), &config).restore(&profile, &archive)
        }
        Some(Commands::Deps) => system::check_dependencies(runner.as_ref(), &config),
        Some(Commands::Menu) | None => run_menu(config, runner, cli.debug),
        // 已在 main 中处理
        Some(Commands::Test { .. }) => Ok(()),
    }
}

fn run_menu(config: DeployConfig, runner: Arc<dyn CommandRunner>, debug: bool) -> Result<()> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to install the Ctrl+C handler")?;

    Screen::clear();
    MenuApplication::new(PageContext::new(config, runner, debug, interrupted)).run()
}

/// 平台、依赖、环境文件类错误
fn is_precondition(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(cause.downcast_ref::<error::Error>(), Some(error::Error::Precondition { .. }))
            || cause
                .downcast_ref::<gitea_deploy_common::DeployError>()
                .is_some_and(|e| e.is_precondition())
    })
}

/// 校验设置文件
fn test_config_file(path: &Path) -> Result<()> {
    let config = DeployConfig::from_file(path)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    println!("✅ Parsed {}", path.display());

    let problems = config.validate();
    if problems.is_empty() {
        println!("✅ Settings are valid");
        return Ok(());
    }
    for (i, problem) in problems.iter().enumerate() {
        eprintln!("  {}. ❌ {}", i + 1, problem);
    }
    Err(error::Error::custom(format!("{} problem(s) found", problems.len())).into())
}
