//! 备份与恢复
//!
//! 备份包含数据库 SQL、`app.ini` 与 Gitea 工作目录，打包为
//! `gitea-backup-<YYYYmmdd-HHMMSS>.tar.gz`。恢复时先解包到临时目录，
//! 停止服务后依次恢复数据库、配置和数据，再修正属主并启动服务。

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use gitea_deploy_common::{DeployConfig, EnvironmentProfile};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::Error;
use crate::install::{read_app_ini, wait_for_service};
use crate::system::{PostgresAdmin, ServiceStatus, SystemProvider};

/// 归档内的数据库文件名
const DATABASE_ENTRY: &str = "database.sql";
/// 归档内的配置文件名
const CONFIG_ENTRY: &str = "app.ini";

/// 备份归档文件名
pub fn archive_name(now: DateTime<Local>) -> String {
    format!("gitea-backup-{}.tar.gz", now.format("%Y%m%d-%H%M%S"))
}

/// 工作目录在归档中的名字
fn work_dir_entry(config: &DeployConfig) -> Result<String> {
    config
        .paths
        .work_dir
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Work directory {} has no final component",
                config.paths.work_dir.display()
            )
        })
}

/// 二进制部署的备份与恢复
pub struct BackupManager<'a> {
    provider: &'a dyn SystemProvider,
    config: &'a DeployConfig,
}

impl<'a> BackupManager<'a> {
    pub fn new(provider: &'a dyn SystemProvider, config: &'a DeployConfig) -> Self {
        Self { provider, config }
    }

    fn admin(&self) -> PostgresAdmin<'_> {
        PostgresAdmin::new(self.provider.runner(), self.provider.postgres_admin_command())
            .with_dump_command(self.provider.postgres_dump_command())
    }

    /// 创建备份，返回归档路径
    pub fn backup(&self, profile: &EnvironmentProfile, now: DateTime<Local>) -> Result<PathBuf> {
        let staging = tempfile::tempdir().context("Failed to create staging directory")?;

        println!("🔄 Dumping database '{}' ...", profile.database.name);
        let dump = self
            .admin()
            .dump(&profile.database.name)
            .context("Database dump failed")?;
        std::fs::write(staging.path().join(DATABASE_ENTRY), dump)?;

        let mut entries = vec![DATABASE_ENTRY.to_string()];
        match read_app_ini(self.provider, self.config)? {
            Some(doc) => {
                std::fs::write(staging.path().join(CONFIG_ENTRY), doc.to_string())?;
                entries.push(CONFIG_ENTRY.to_string());
            }
            None => warn!(
                path = %self.config.paths.app_ini().display(),
                "no app.ini found, backup contains database and data only"
            ),
        }

        let backup_dir = &self.config.paths.backup_dir;
        self.provider.create_directory(backup_dir, Some(0o700))?;
        let archive = backup_dir.join(archive_name(now));

        let archive_arg = archive.to_string_lossy().to_string();
        let staging_arg = staging.path().to_string_lossy().to_string();
        let work_parent = self
            .config
            .paths
            .work_dir
            .parent()
            .unwrap_or_else(|| Path::new("/"))
            .to_string_lossy()
            .to_string();
        let work_entry = work_dir_entry(self.config)?;

        let mut args = vec!["czf", archive_arg.as_str(), "-C", staging_arg.as_str()];
        args.extend(entries.iter().map(String::as_str));
        args.extend(["-C", work_parent.as_str(), work_entry.as_str()]);

        println!("🔄 Archiving {} ...", self.config.paths.work_dir.display());
        self.provider
            .privileged("tar", &args)
            .context("Failed to create backup archive")?;
        self.provider.set_file_permissions(&archive, 0o600)?;

        info!(archive = %archive.display(), "backup created");
        println!("✅ Backup created: {}", archive.display());
        Ok(archive)
    }

    /// 从归档恢复
    pub fn restore(&self, profile: &EnvironmentProfile, archive: &Path) -> Result<()> {
        if !archive.is_file() {
            return Err(Error::precondition(format!(
                "Backup archive not found: {}",
                archive.display()
            ))
            .into());
        }

        let staging = tempfile::tempdir().context("Failed to create staging directory")?;
        let staging_path = staging.path().to_string_lossy().to_string();
        let result = self.restore_from(profile, archive, staging.path());

        // 解包出的文件可能属于其他用户，临时目录需要提权清理
        if let Err(e) = self.provider.privileged("rm", &["-rf", &staging_path]) {
            warn!(error = %e, path = %staging_path, "failed to remove staging directory");
        }
        result
    }

    fn restore_from(
        &self,
        profile: &EnvironmentProfile,
        archive: &Path,
        staging: &Path,
    ) -> Result<()> {
        let service = &self.config.service.name;
        let run_user = &self.config.service.run_user;
        let archive_arg = archive.to_string_lossy();
        let staging_arg = staging.to_string_lossy();

        println!("🔄 Extracting {} ...", archive.display());
        self.provider
            .privileged("tar", &["xzf", &archive_arg, "-C", &staging_arg])
            .context("Failed to extract backup archive")?;

        let sql = std::fs::read_to_string(staging.join(DATABASE_ENTRY)).with_context(|| {
            format!("{} does not contain {}", archive.display(), DATABASE_ENTRY)
        })?;

        if self.provider.service_status(service) == ServiceStatus::Running {
            self.provider.stop_service(service)?;
            println!("⏹️  Service '{}' stopped", service);
        }

        println!("🔄 Restoring database '{}' ...", profile.database.name);
        let admin = self.admin();
        admin.drop_database(&profile.database.name)?;
        admin.setup(&profile.database)?;
        admin
            .execute_script(&profile.database.name, &sql)
            .context("Database restore failed")?;

        let config_entry = staging.join(CONFIG_ENTRY);
        if config_entry.is_file() {
            let app_ini = self.config.paths.app_ini();
            self.provider.create_directory(&self.config.paths.config_dir, None)?;
            self.provider
                .privileged(
                    "install",
                    &["-m", "640", &config_entry.to_string_lossy(), &app_ini.to_string_lossy()],
                )
                .context("Failed to restore app.ini")?;
            self.provider.set_file_owner(&app_ini, run_user)?;
        }

        let work_source = staging.join(work_dir_entry(self.config)?);
        let work_dir = &self.config.paths.work_dir;
        self.provider.create_directory(work_dir, Some(0o750))?;
        self.provider
            .privileged(
                "cp",
                &[
                    "-a",
                    &format!("{}/.", work_source.to_string_lossy()),
                    &work_dir.to_string_lossy(),
                ],
            )
            .context("Failed to restore the work directory")?;
        self.provider.set_file_owner(work_dir, run_user)?;

        self.provider.start_service(service)?;
        wait_for_service(self.provider, self.config)?;

        info!(archive = %archive.display(), "restore completed");
        println!("✅ Restored from {}", archive.display());
        Ok(())
    }
}
