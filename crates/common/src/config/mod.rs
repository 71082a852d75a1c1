//! 部署工具设置
//!
//! 设置文件使用 TOML 格式，所有字段都有默认值；文件不存在时使用默认设置。
//! 这里只描述部署工具自身（路径、服务名、重试、日志），
//! Gitea 的配置由 [`crate::render`] 生成。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cert::CertificateMaterial;
use crate::error::{ConfigError, Result};
use crate::retry::RetryPolicy;

/// 部署工具主配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DeployConfig {
    /// 操作员环境文件（数据库凭据、应用名、域名）
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,

    /// 文件系统布局
    #[serde(default)]
    pub paths: PathsConfig,

    /// 服务与运行用户
    #[serde(default)]
    pub service: ServiceConfig,

    /// 各调用点的重试策略
    #[serde(default)]
    pub retry: RetryConfig,

    /// 日志配置
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// 文件系统布局
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PathsConfig {
    /// Gitea 配置目录，`app.ini` 位于其中
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Gitea 工作目录（数据、仓库、日志）
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// 证书目录，证书与私钥固定放在这里
    #[serde(default = "default_cert_dir")]
    pub cert_dir: PathBuf,

    /// Gitea 可执行文件路径
    #[serde(default = "default_binary_path")]
    pub binary_path: PathBuf,

    /// 备份目录
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// 容器部署时的工作目录（docker-compose.yml 与数据卷）
    #[serde(default = "default_compose_dir")]
    pub compose_dir: PathBuf,
}

/// 服务配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServiceConfig {
    /// systemd 单元名 / launchd 标签后缀
    #[serde(default = "default_service_name")]
    pub name: String,

    /// 运行 Gitea 的系统用户
    #[serde(default = "default_run_user")]
    pub run_user: String,

    /// Git over SSH 端口（使用系统 sshd）
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,

    /// 容器部署时映射到宿主机的 SSH 端口
    #[serde(default = "default_container_ssh_port")]
    pub container_ssh_port: u16,
}

/// 重试策略配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "RetryPolicy::version_lookup")]
    pub version_lookup: RetryPolicy,
    #[serde(default = "RetryPolicy::download")]
    pub download: RetryPolicy,
    #[serde(default = "RetryPolicy::package_lock")]
    pub package_lock: RetryPolicy,
    #[serde(default = "RetryPolicy::service_start")]
    pub service_start: RetryPolicy,
}

/// 可观测性配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ObservabilityConfig {
    /// 过滤级别，支持 EnvFilter 语法（如 "info,reqwest=warn"）
    #[serde(default = "default_filter_level")]
    pub filter_level: String,

    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LogConfig {
    /// 日志输出目标
    ///
    /// - "console": 输出到标准错误（默认）
    /// - "file": 输出到文件
    #[serde(default = "default_log_output")]
    pub output: String,

    /// 当 output = "file" 时按天轮转
    #[serde(default)]
    pub rotate: bool,

    /// 当 output = "file" 时的日志目录
    #[serde(default = "default_log_path")]
    pub path: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            env_file: default_env_file(),
            paths: PathsConfig::default(),
            service: ServiceConfig::default(),
            retry: RetryConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            work_dir: default_work_dir(),
            cert_dir: default_cert_dir(),
            binary_path: default_binary_path(),
            backup_dir: default_backup_dir(),
            compose_dir: default_compose_dir(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            run_user: default_run_user(),
            ssh_port: default_ssh_port(),
            container_ssh_port: default_container_ssh_port(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            version_lookup: RetryPolicy::version_lookup(),
            download: RetryPolicy::download(),
            package_lock: RetryPolicy::package_lock(),
            service_start: RetryPolicy::service_start(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            filter_level: default_filter_level(),
            log: LogConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: default_log_output(),
            rotate: false,
            path: default_log_path(),
        }
    }
}

fn default_env_file() -> PathBuf {
    PathBuf::from("gitea.env")
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("/etc/gitea")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("/var/lib/gitea")
}

fn default_cert_dir() -> PathBuf {
    PathBuf::from("/etc/gitea/certs")
}

fn default_binary_path() -> PathBuf {
    PathBuf::from("/usr/local/bin/gitea")
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("/var/backups/gitea")
}

fn default_compose_dir() -> PathBuf {
    PathBuf::from("/opt/gitea")
}

fn default_service_name() -> String {
    "gitea".to_string()
}

fn default_run_user() -> String {
    "git".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_container_ssh_port() -> u16 {
    2222
}

fn default_filter_level() -> String {
    "info".to_string()
}

fn default_log_output() -> String {
    "console".to_string()
}

fn default_log_path() -> String {
    "logs/".to_string()
}

impl PathsConfig {
    /// `app.ini` 路径
    pub fn app_ini(&self) -> PathBuf {
        self.config_dir.join("app.ini")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.work_dir.join("data")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.work_dir.join("log")
    }

    pub fn repository_root(&self) -> PathBuf {
        self.data_dir().join("gitea-repositories")
    }

    pub fn lfs_dir(&self) -> PathBuf {
        self.data_dir().join("lfs")
    }

    /// 证书材料的固定位置
    pub fn certificate_material(&self) -> CertificateMaterial {
        CertificateMaterial::in_dir(&self.cert_dir)
    }

    pub fn compose_file(&self) -> PathBuf {
        self.compose_dir.join("docker-compose.yml")
    }

    /// 安装时需要创建的目录
    pub fn install_directories(&self) -> Vec<PathBuf> {
        vec![
            self.config_dir.clone(),
            self.work_dir.clone(),
            self.data_dir(),
            self.log_dir(),
            self.work_dir.join("custom"),
        ]
    }
}

impl DeployConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(ConfigError::FileNotFound {
                path: path_ref.display().to_string(),
            }
            .into());
        }

        if !path_ref.is_file() {
            return Err(ConfigError::InvalidFormat {
                message: format!("Path is not a valid file: {}", path_ref.display()),
            }
            .into());
        }

        let content = std::fs::read_to_string(path_ref)?;
        Ok(Self::from_toml(&content)?)
    }

    /// 文件存在时加载，否则返回默认配置
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// 从 TOML 字符串加载配置
    pub fn from_toml(content: &str) -> std::result::Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            source: Box::new(e),
        })
    }

    /// 校验配置，返回所有问题
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.service.name.trim().is_empty() {
            problems.push("service.name must not be empty".to_string());
        }
        if self.service.run_user.trim().is_empty() {
            problems.push("service.run_user must not be empty".to_string());
        }
        if self.service.ssh_port == 0 {
            problems.push("service.ssh_port must be between 1 and 65535".to_string());
        }
        for (name, path) in [
            ("paths.config_dir", &self.paths.config_dir),
            ("paths.work_dir", &self.paths.work_dir),
            ("paths.cert_dir", &self.paths.cert_dir),
            ("paths.binary_path", &self.paths.binary_path),
        ] {
            if !path.is_absolute() {
                problems.push(format!("{name} must be an absolute path: {}", path.display()));
            }
        }
        for (name, policy) in [
            ("retry.version_lookup", &self.retry.version_lookup),
            ("retry.download", &self.retry.download),
            ("retry.package_lock", &self.retry.package_lock),
            ("retry.service_start", &self.retry.service_start),
        ] {
            if policy.max_attempts == 0 {
                problems.push(format!("{name}.max_attempts must be at least 1"));
            }
        }
        if !matches!(self.observability.log.output.as_str(), "console" | "file") {
            problems.push(format!(
                "observability.log.output must be 'console' or 'file', got '{}'",
                self.observability.log.output
            ));
        }

        problems
    }

    /// 获取日志过滤级别，优先使用 RUST_LOG
    pub fn get_filter_level(&self) -> String {
        std::env::var("RUST_LOG")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.observability.filter_level.clone())
    }
}
