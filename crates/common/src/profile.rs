//! 环境配置文件（KEY=VALUE）
//!
//! 运行开始时读取一次；运行结束时若操作员改了域名，就地改写 `DOMAIN` 行，
//! 其余行原样保留。同一时间只有一个写入者。

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

pub const KEY_DB_USER: &str = "POSTGRES_USER";
pub const KEY_DB_PASSWORD: &str = "POSTGRES_PASSWORD";
pub const KEY_DB_NAME: &str = "POSTGRES_DB";
pub const KEY_APP_NAME: &str = "APP_NAME";
pub const KEY_DOMAIN: &str = "DOMAIN";
pub const KEY_ADMIN_EMAIL: &str = "ADMIN_EMAIL";

const DEFAULT_APP_NAME: &str = "Gitea: Git with a cup of tea";

/// 数据库凭据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseCredentials {
    pub user: String,
    pub password: String,
    pub name: String,
}

/// 操作员提供的持久化变量
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentProfile {
    pub path: PathBuf,
    pub database: DatabaseCredentials,
    pub app_name: String,
    pub domain: Option<String>,
    pub admin_email: Option<String>,
}

impl EnvironmentProfile {
    /// 读取环境文件；文件缺失属于前置条件错误
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let mut vars = BTreeMap::new();
        let iter = dotenvy::from_path_iter(path).map_err(|e| ConfigError::EnvFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        for item in iter {
            let (key, value) = item.map_err(|e| ConfigError::EnvFile {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            vars.insert(key, value);
        }

        Self::from_vars(path, &vars)
    }

    fn from_vars(path: &Path, vars: &BTreeMap<String, String>) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    ConfigError::MissingField {
                        field: format!("{key} in {}", path.display()),
                    }
                    .into()
                })
        };
        let optional = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            path: path.to_path_buf(),
            database: DatabaseCredentials {
                user: required(KEY_DB_USER)?,
                password: required(KEY_DB_PASSWORD)?,
                name: required(KEY_DB_NAME)?,
            },
            app_name: optional(KEY_APP_NAME).unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
            domain: optional(KEY_DOMAIN),
            admin_email: optional(KEY_ADMIN_EMAIL),
        })
    }

    /// 域名变化时改写文件中的 DOMAIN；返回是否发生了写入
    pub fn persist_domain(&mut self, domain: &str) -> Result<bool> {
        if self.domain.as_deref() == Some(domain) {
            return Ok(false);
        }
        let content = fs::read_to_string(&self.path)?;
        fs::write(&self.path, rewrite_key(&content, KEY_DOMAIN, domain))?;
        tracing::info!(path = %self.path.display(), domain, "updated DOMAIN in environment file");
        self.domain = Some(domain.to_string());
        Ok(true)
    }
}

/// 替换 `KEY=` 行（支持 `export KEY=`），不存在时追加
pub fn rewrite_key(content: &str, key: &str, value: &str) -> String {
    let mut replaced = false;
    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            let body = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let matches = body
                .split_once('=')
                .is_some_and(|(k, _)| k.trim() == key);
            if matches && !replaced {
                replaced = true;
                let prefix = if trimmed.starts_with("export ") {
                    "export "
                } else {
                    ""
                };
                format!("{prefix}{key}={value}")
            } else {
                line.to_string()
            }
        })
        .collect();
    if !replaced {
        lines.push(format!("{key}={value}"));
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# database\nPOSTGRES_USER=gitea\nPOSTGRES_PASSWORD=s3cret\nPOSTGRES_DB=giteadb\nAPP_NAME=\"Team Git\"\nDOMAIN=old.example.com\n";

    fn write_sample(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gitea.env");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_profile() {
        let (_dir, path) = write_sample(SAMPLE);
        let profile = EnvironmentProfile::load(&path).unwrap();
        assert_eq!(profile.database.user, "gitea");
        assert_eq!(profile.database.name, "giteadb");
        assert_eq!(profile.app_name, "Team Git");
        assert_eq!(profile.domain.as_deref(), Some("old.example.com"));
        assert!(profile.admin_email.is_none());
    }

    #[test]
    fn test_missing_file_is_precondition_error() {
        let err = EnvironmentProfile::load(Path::new("/nonexistent/gitea.env")).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let (_dir, path) = write_sample("POSTGRES_USER=gitea\n");
        let err = EnvironmentProfile::load(&path).unwrap_err();
        assert!(err.to_string().contains("POSTGRES_PASSWORD"));
    }

    #[test]
    fn test_persist_domain_rewrites_only_domain() {
        let (_dir, path) = write_sample(SAMPLE);
        let mut profile = EnvironmentProfile::load(&path).unwrap();

        assert!(!profile.persist_domain("old.example.com").unwrap());
        assert!(profile.persist_domain("git.example.com").unwrap());

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("DOMAIN=git.example.com"));
        assert!(!content.contains("old.example.com"));
        assert!(content.starts_with("# database\nPOSTGRES_USER=gitea\n"));
        assert_eq!(
            EnvironmentProfile::load(&path).unwrap().domain.as_deref(),
            Some("git.example.com")
        );
    }

    #[test]
    fn test_rewrite_key_appends_when_missing() {
        let out = rewrite_key("POSTGRES_USER=gitea", KEY_DOMAIN, "10.0.0.2");
        assert_eq!(out, "POSTGRES_USER=gitea\nDOMAIN=10.0.0.2\n");

        let out = rewrite_key("export DOMAIN=a\n", KEY_DOMAIN, "b");
        assert_eq!(out, "export DOMAIN=b\n");
    }
}
