//! Docker Compose 部署
//!
//! 生成 docker-compose.yml 并通过 `docker compose`（或旧版 `docker-compose`）启动

use anyhow::{Context, Result};
use gitea_deploy_common::{
    ComposeDescriptor, DeployConfig, DeploymentMode, EnvironmentProfile, RenderTarget,
    ServerConfig,
};
use std::path::{Path, PathBuf};

use crate::system::{CommandRunner, SystemProvider, failed};

/// Compose 命令形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeFlavor {
    /// `docker compose` 插件
    Plugin,
    /// 独立的 `docker-compose`
    Legacy,
}

impl ComposeFlavor {
    fn command(&self, compose_file: &str, action: &[&'static str]) -> (&'static str, Vec<String>) {
        let mut args: Vec<String> = Vec::new();
        let program = match self {
            ComposeFlavor::Plugin => {
                args.push("compose".to_string());
                "docker"
            }
            ComposeFlavor::Legacy => "docker-compose",
        };
        args.push("-f".to_string());
        args.push(compose_file.to_string());
        args.extend(action.iter().map(|a| a.to_string()));
        (program, args)
    }

    fn label(&self) -> &'static str {
        match self {
            ComposeFlavor::Plugin => "docker compose",
            ComposeFlavor::Legacy => "docker-compose",
        }
    }
}

/// 检测可用的 compose 命令，插件优先
pub fn detect_compose(runner: &dyn CommandRunner) -> Option<ComposeFlavor> {
    let ok = |program: &str, args: &[&str]| {
        runner
            .run(program, args)
            .map(|output| output.success())
            .unwrap_or(false)
    };
    if ok("docker", &["compose", "version"]) {
        Some(ComposeFlavor::Plugin)
    } else if ok("docker-compose", &["--version"]) {
        Some(ComposeFlavor::Legacy)
    } else {
        None
    }
}

/// 渲染容器目标的 compose 文件并写入部署目录
pub fn write_compose_file(
    provider: &dyn SystemProvider,
    mode: &DeploymentMode,
    profile: &EnvironmentProfile,
    config: &DeployConfig,
) -> Result<PathBuf> {
    let server = ServerConfig::resolve(mode, profile, config, RenderTarget::Container)?;
    let content = ComposeDescriptor::new(mode, &server, profile, config).generate()?;

    let path = config.paths.compose_file();
    provider.create_directory(&config.paths.compose_dir, Some(0o755))?;
    provider
        .write_file(&path, &content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!(path = %path.display(), "compose descriptor written");
    println!("✅ Compose file written: {}", path.display());
    Ok(path)
}

/// 证书续期后重启 Gitea 容器的命令
pub fn restart_command(flavor: ComposeFlavor, compose_file: &Path) -> String {
    let (program, args) = flavor.command(&compose_file.to_string_lossy(), &["restart", "server"]);
    std::iter::once(program.to_string())
        .chain(args)
        .collect::<Vec<_>>()
        .join(" ")
}

/// 执行 `up -d`
pub fn compose_up(
    runner: &dyn CommandRunner,
    flavor: ComposeFlavor,
    compose_file: &Path,
) -> Result<()> {
    run_compose(runner, flavor, compose_file, &["up", "-d"])
}

fn run_compose(
    runner: &dyn CommandRunner,
    flavor: ComposeFlavor,
    compose_file: &Path,
    action: &[&'static str],
) -> Result<()> {
    let file = compose_file.to_string_lossy();
    let (program, args) = flavor.command(&file, action);
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    println!("🐳 Running {} {} ...", flavor.label(), action.join(" "));
    let output = runner.run(program, &args)?;
    if !output.success() {
        return Err(anyhow::Error::from(failed(program, &args, &output))
            .context(format!("{} {} failed", flavor.label(), action.join(" "))));
    }

    println!("✅ {} {} succeeded", flavor.label(), action.join(" "));
    if !output.stdout.trim().is_empty() {
        println!("{}", output.stdout.trim_end());
    }
    Ok(())
}
