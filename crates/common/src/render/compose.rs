//! Docker Compose 描述文件生成
//!
//! 单一模板生成：Gitea 服务的配置全部通过 `GITEA__section__KEY` 环境变量注入，
//! 宿主机端口按模式映射到容器内的 3000。

use serde_json::{Value, json};

use super::server_config::{CONTAINER_CERT_DIR, ServerConfig};
use crate::config::DeployConfig;
use crate::error::Result;
use crate::mode::{DeploymentMode, HTTP_PORT};
use crate::profile::EnvironmentProfile;

pub const GITEA_IMAGE: &str = "gitea/gitea:latest";
pub const POSTGRES_IMAGE: &str = "postgres:16";

/// `KEY=value` 环境变量条目；Compose 会插值 `$`，需写成 `$$`
fn env_entry(key: &str, value: &str) -> String {
    format!("{key}={}", value.replace('$', "$$"))
}

/// Compose 描述文件生成器
pub struct ComposeDescriptor<'a> {
    mode: &'a DeploymentMode,
    server: &'a ServerConfig,
    profile: &'a EnvironmentProfile,
    config: &'a DeployConfig,
}

impl<'a> ComposeDescriptor<'a> {
    pub fn new(
        mode: &'a DeploymentMode,
        server: &'a ServerConfig,
        profile: &'a EnvironmentProfile,
        config: &'a DeployConfig,
    ) -> Self {
        Self {
            mode,
            server,
            profile,
            config,
        }
    }

    /// 生成 docker-compose.yml 内容
    pub fn generate(&self) -> Result<String> {
        let compose = json!({
            "services": {
                "server": self.gitea_service(),
                "db": self.postgres_service(),
            },
            "networks": {
                "gitea": {
                    "external": false
                }
            }
        });

        Ok(serde_yaml::to_string(&compose)?)
    }

    fn gitea_service(&self) -> Value {
        let mut environment = vec!["USER_UID=1000".to_string(), "USER_GID=1000".to_string()];
        environment.extend(
            self.server
                .env_overrides()
                .into_iter()
                .map(|(key, value)| env_entry(&key, &value)),
        );

        let mut volumes = vec![
            "./gitea:/data".to_string(),
            "/etc/timezone:/etc/timezone:ro".to_string(),
            "/etc/localtime:/etc/localtime:ro".to_string(),
        ];
        if self.server.is_https() {
            volumes.push(format!(
                "{}:{}:ro",
                self.config.paths.cert_dir.display(),
                CONTAINER_CERT_DIR
            ));
        }

        json!({
            "image": GITEA_IMAGE,
            "container_name": "gitea",
            "restart": "always",
            "environment": environment,
            "networks": ["gitea"],
            "volumes": volumes,
            "ports": self.port_mappings(),
            "depends_on": ["db"],
        })
    }

    fn postgres_service(&self) -> Value {
        let db = &self.profile.database;
        json!({
            "image": POSTGRES_IMAGE,
            "restart": "always",
            "environment": [
                env_entry("POSTGRES_USER", &db.user),
                env_entry("POSTGRES_PASSWORD", &db.password),
                env_entry("POSTGRES_DB", &db.name),
            ],
            "networks": ["gitea"],
            "volumes": ["./postgres:/var/lib/postgresql/data"],
        })
    }

    /// 对外端口映射到容器内 3000，SSH 映射到容器内 22
    pub fn port_mappings(&self) -> Vec<String> {
        vec![
            format!("{}:{}", self.mode.public_port(), HTTP_PORT),
            format!("{}:22", self.config.service.container_ssh_port),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::{CertSubject, CertificateRequest, generate_self_signed};
    use crate::profile::DatabaseCredentials;
    use crate::render::RenderTarget;

    fn profile() -> EnvironmentProfile {
        EnvironmentProfile {
            path: "gitea.env".into(),
            database: DatabaseCredentials {
                user: "gitea".to_string(),
                password: "s3cret".to_string(),
                name: "giteadb".to_string(),
            },
            app_name: "Gitea".to_string(),
            domain: None,
            admin_email: None,
        }
    }

    #[test]
    fn test_http_compose_publishes_3000() {
        let config = DeployConfig::default();
        let profile = profile();
        let mode = DeploymentMode::http_local("git.lan");
        let server =
            ServerConfig::resolve(&mode, &profile, &config, RenderTarget::Container).unwrap();

        let yaml = ComposeDescriptor::new(&mode, &server, &profile, &config)
            .generate()
            .unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        let ports = &parsed["services"]["server"]["ports"];
        assert_eq!(ports[0].as_str(), Some("3000:3000"));
        assert_eq!(ports[1].as_str(), Some("2222:22"));
        assert!(!yaml.contains("CERT_FILE"));
        assert!(yaml.contains("POSTGRES_DB=giteadb"));
    }

    #[test]
    fn test_dollar_in_environment_is_escaped() {
        let config = DeployConfig::default();
        let mut profile = profile();
        profile.database.password = "pa$word".to_string();
        let mode = DeploymentMode::http_local("git.lan");
        let server =
            ServerConfig::resolve(&mode, &profile, &config, RenderTarget::Container).unwrap();

        let yaml = ComposeDescriptor::new(&mode, &server, &profile, &config)
            .generate()
            .unwrap();
        assert!(yaml.contains("POSTGRES_PASSWORD=pa$$word"));
        assert!(yaml.contains("GITEA__DATABASE__PASSWD=pa$$word"));
        assert!(!yaml.contains("pa$word"));
    }

    #[test]
    fn test_https_compose_mounts_certificates() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DeployConfig::default();
        config.paths.cert_dir = dir.path().join("certs");
        generate_self_signed(&CertificateRequest::self_signed(CertSubject::Localhost))
            .unwrap()
            .install(&config.paths.certificate_material())
            .unwrap();

        let profile = profile();
        let mode = DeploymentMode::HttpsLocalhost;
        let server =
            ServerConfig::resolve(&mode, &profile, &config, RenderTarget::Container).unwrap();
        let descriptor = ComposeDescriptor::new(&mode, &server, &profile, &config);

        assert_eq!(descriptor.port_mappings()[0], "443:3000");
        let yaml = descriptor.generate().unwrap();
        assert!(yaml.contains("GITEA__SERVER__CERT_FILE=/data/gitea/certs/cert.pem"));
        assert!(yaml.contains(":/data/gitea/certs:ro"));
    }
}
