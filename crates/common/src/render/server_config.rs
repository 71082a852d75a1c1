//! Gitea 服务配置解析与渲染
//!
//! 不变式：`PROTOCOL = https` 当且仅当 `CERT_FILE` 与 `KEY_FILE` 都存在，
//! 且对应文件在渲染时存在于磁盘；HTTP 模式从不输出证书键，端口为 3000。

use std::path::{Path, PathBuf};

use super::ini::IniDocument;
use crate::cert::{CERT_FILE_NAME, CertificateMaterial, KEY_FILE_NAME};
use crate::config::DeployConfig;
use crate::error::Result;
use crate::mode::{DeploymentMode, HTTP_PORT};
use crate::profile::EnvironmentProfile;

/// 与模式无关的固定配置段，所有模式输出完全一致
pub const BOILERPLATE: &str = "\
[log]
MODE = console
LEVEL = info

[mailer]
ENABLED = false

[security]
INSTALL_LOCK = false
PASSWORD_HASH_ALGO = pbkdf2

[indexer]
ISSUE_INDEXER_TYPE = bleve
REPO_INDEXER_ENABLED = false
";

/// 固定配置段名称
pub const BOILERPLATE_SECTIONS: [&str; 4] = ["log", "mailer", "security", "indexer"];

/// 容器内 Gitea 数据根目录
pub const CONTAINER_DATA_ROOT: &str = "/data";
/// 容器内证书目录
pub const CONTAINER_CERT_DIR: &str = "/data/gitea/certs";

/// 渲染目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// 宿主机直接运行二进制，监听对外端口
    Binary,
    /// 容器内运行，始终监听 3000，由宿主机端口映射
    Container,
}

/// TLS 文件路径（Gitea 视角）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

/// 数据库连接
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSection {
    pub host: String,
    pub name: String,
    pub user: String,
    pub password: String,
}

/// 已解析的 Gitea 配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub app_name: String,
    pub run_user: String,
    pub work_path: PathBuf,
    pub protocol: &'static str,
    pub domain: String,
    pub http_port: u16,
    pub root_url: String,
    pub ssh_port: u16,
    pub tls: Option<TlsFiles>,
    pub app_data_path: PathBuf,
    pub repository_root: PathBuf,
    pub lfs_path: PathBuf,
    pub database: DatabaseSection,
    pub disable_registration: bool,
}

impl ServerConfig {
    /// 按模式解析配置；HTTPS 模式要求证书材料已在宿主机上就位
    pub fn resolve(
        mode: &DeploymentMode,
        profile: &EnvironmentProfile,
        config: &DeployConfig,
        target: RenderTarget,
    ) -> Result<Self> {
        let tls = if mode.is_https() {
            let material = config.paths.certificate_material();
            material.ensure_exists()?;
            Some(match target {
                RenderTarget::Binary => TlsFiles {
                    cert_file: material.cert_path,
                    key_file: material.key_path,
                },
                RenderTarget::Container => container_tls_files(),
            })
        } else {
            None
        };

        let paths = &config.paths;
        let db = &profile.database;
        let resolved = match target {
            RenderTarget::Binary => Self {
                app_name: profile.app_name.clone(),
                run_user: config.service.run_user.clone(),
                work_path: paths.work_dir.clone(),
                protocol: mode.protocol(),
                domain: mode.domain(),
                http_port: mode.public_port(),
                root_url: mode.root_url(),
                ssh_port: config.service.ssh_port,
                tls,
                app_data_path: paths.data_dir(),
                repository_root: paths.repository_root(),
                lfs_path: paths.lfs_dir(),
                database: DatabaseSection {
                    host: "127.0.0.1:5432".to_string(),
                    name: db.name.clone(),
                    user: db.user.clone(),
                    password: db.password.clone(),
                },
                disable_registration: false,
            },
            RenderTarget::Container => {
                let data = Path::new(CONTAINER_DATA_ROOT);
                Self {
                    app_name: profile.app_name.clone(),
                    run_user: "git".to_string(),
                    work_path: data.join("gitea"),
                    protocol: mode.protocol(),
                    domain: mode.domain(),
                    http_port: HTTP_PORT,
                    root_url: mode.root_url(),
                    ssh_port: config.service.container_ssh_port,
                    tls,
                    app_data_path: data.join("gitea"),
                    repository_root: data.join("git/repositories"),
                    lfs_path: data.join("git/lfs"),
                    database: DatabaseSection {
                        host: "db:5432".to_string(),
                        name: db.name.clone(),
                        user: db.user.clone(),
                        password: db.password.clone(),
                    },
                    disable_registration: false,
                }
            }
        };
        Ok(resolved)
    }

    pub fn is_https(&self) -> bool {
        self.tls.is_some()
    }

    /// `[server]` 段中随模式变化的键
    fn server_entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![
            ("PROTOCOL", self.protocol.to_string()),
            ("DOMAIN", self.domain.clone()),
            ("HTTP_ADDR", "0.0.0.0".to_string()),
            ("HTTP_PORT", self.http_port.to_string()),
            ("ROOT_URL", self.root_url.clone()),
            ("SSH_DOMAIN", self.domain.clone()),
            ("SSH_PORT", self.ssh_port.to_string()),
        ];
        if let Some(tls) = &self.tls {
            entries.push(("CERT_FILE", tls.cert_file.display().to_string()));
            entries.push(("KEY_FILE", tls.key_file.display().to_string()));
        }
        entries
    }

    /// 全部键值（不含固定段），按输出顺序
    pub fn entries(&self) -> Vec<(&'static str, &'static str, String)> {
        let mut entries = vec![
            ("", "APP_NAME", self.app_name.clone()),
            ("", "RUN_USER", self.run_user.clone()),
            ("", "RUN_MODE", "prod".to_string()),
            ("", "WORK_PATH", self.work_path.display().to_string()),
        ];
        entries.extend(
            self.server_entries()
                .into_iter()
                .map(|(key, value)| ("server", key, value)),
        );
        entries.extend([
            ("server", "START_SSH_SERVER", "false".to_string()),
            ("server", "LFS_START_SERVER", "true".to_string()),
            (
                "server",
                "APP_DATA_PATH",
                self.app_data_path.display().to_string(),
            ),
            ("database", "DB_TYPE", "postgres".to_string()),
            ("database", "HOST", self.database.host.clone()),
            ("database", "NAME", self.database.name.clone()),
            ("database", "USER", self.database.user.clone()),
            ("database", "PASSWD", self.database.password.clone()),
            ("database", "SSL_MODE", "disable".to_string()),
            (
                "repository",
                "ROOT",
                self.repository_root.display().to_string(),
            ),
            ("lfs", "PATH", self.lfs_path.display().to_string()),
            (
                "service",
                "DISABLE_REGISTRATION",
                self.disable_registration.to_string(),
            ),
            ("service", "REQUIRE_SIGNIN_VIEW", "false".to_string()),
        ]);
        entries
    }

    /// 渲染完整的 app.ini
    pub fn render(&self) -> IniDocument {
        let mut doc = IniDocument::default();
        for (section, key, value) in self.entries() {
            doc.set(section, key, &value);
        }
        doc.append_raw(BOILERPLATE);
        doc
    }

    /// 把随模式变化的 `[server]` 键写入已有文档，其余内容不动
    ///
    /// HTTP 模式会删除遗留的 `CERT_FILE` / `KEY_FILE`。
    pub fn apply_server_section(&self, doc: &mut IniDocument) {
        for (key, value) in self.server_entries() {
            doc.set("server", key, &value);
        }
        if self.tls.is_none() {
            doc.remove("server", "CERT_FILE");
            doc.remove("server", "KEY_FILE");
        }
    }

    /// 容器环境变量形式：`GITEA__section__KEY`，根节为 `GITEA____KEY`
    pub fn env_overrides(&self) -> Vec<(String, String)> {
        self.render()
            .entries()
            .into_iter()
            .map(|(section, key, value)| {
                let section = section.to_ascii_uppercase();
                (format!("GITEA__{section}__{key}"), value)
            })
            .collect()
    }
}

fn container_tls_files() -> TlsFiles {
    let dir = Path::new(CONTAINER_CERT_DIR);
    TlsFiles {
        cert_file: dir.join(CERT_FILE_NAME),
        key_file: dir.join(KEY_FILE_NAME),
    }
}

/// 检查渲染结果是否满足协议与证书不变式；证书路径按宿主机材料位置校验
pub fn check_tls_invariant(doc: &IniDocument, host_material: &CertificateMaterial) -> bool {
    let protocol = doc.get("server", "PROTOCOL");
    let cert = doc.get("server", "CERT_FILE");
    let key = doc.get("server", "KEY_FILE");
    match (protocol, cert, key) {
        (Some("https"), Some(_), Some(_)) => host_material.exists(),
        (Some("http"), None, None) => doc.get("server", "HTTP_PORT") == Some("3000"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::{CertSubject, CertificateRequest, IssuanceMethod, generate_self_signed};
    use crate::error::{CertificateError, DeployError};
    use crate::profile::DatabaseCredentials;

    struct Fixture {
        _dir: tempfile::TempDir,
        config: DeployConfig,
        profile: EnvironmentProfile,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DeployConfig::default();
        config.paths.cert_dir = dir.path().join("certs");
        config.paths.work_dir = dir.path().join("work");
        let profile = EnvironmentProfile {
            path: dir.path().join("gitea.env"),
            database: DatabaseCredentials {
                user: "gitea".to_string(),
                password: "s3cret".to_string(),
                name: "giteadb".to_string(),
            },
            app_name: "Team Git".to_string(),
            domain: None,
            admin_email: None,
        };
        Fixture {
            _dir: dir,
            config,
            profile,
        }
    }

    fn provision(config: &DeployConfig, mode: &DeploymentMode) {
        if let Some(request) = mode.certificate_request() {
            let request = CertificateRequest::self_signed(request.subject);
            generate_self_signed(&request)
                .unwrap()
                .install(&config.paths.certificate_material())
                .unwrap();
        }
    }

    fn all_modes() -> Vec<DeploymentMode> {
        vec![
            DeploymentMode::http_local(""),
            DeploymentMode::HttpsLocalhost,
            DeploymentMode::HttpsDomain {
                domain: "git.example.com".to_string(),
                issuance: IssuanceMethod::SelfSigned,
            },
            DeploymentMode::HttpsIp {
                ip: "203.0.113.10".parse().unwrap(),
            },
        ]
    }

    #[test]
    fn test_tls_invariant_for_every_mode() {
        for mode in all_modes() {
            let fx = fixture();
            provision(&fx.config, &mode);
            let material = fx.config.paths.certificate_material();

            for target in [RenderTarget::Binary, RenderTarget::Container] {
                let server =
                    ServerConfig::resolve(&mode, &fx.profile, &fx.config, target).unwrap();
                let doc = server.render();
                assert!(check_tls_invariant(&doc, &material), "{mode} {target:?}");
                assert_eq!(server.is_https(), mode.is_https());
            }
        }
    }

    #[test]
    fn test_https_refuses_missing_material() {
        let fx = fixture();
        let err = ServerConfig::resolve(
            &DeploymentMode::HttpsLocalhost,
            &fx.profile,
            &fx.config,
            RenderTarget::Binary,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DeployError::Certificate(CertificateError::MissingMaterial { .. })
        ));
    }

    #[test]
    fn test_https_ip_scenario() {
        let fx = fixture();
        let mode = DeploymentMode::https_ip(Some("203.0.113.10".parse().unwrap()), true, None)
            .unwrap();
        provision(&fx.config, &mode);

        let doc = ServerConfig::resolve(&mode, &fx.profile, &fx.config, RenderTarget::Binary)
            .unwrap()
            .render();
        assert_eq!(doc.get("server", "DOMAIN"), Some("203.0.113.10"));
        assert_eq!(doc.get("server", "PROTOCOL"), Some("https"));
        assert_eq!(doc.get("server", "ROOT_URL"), Some("https://203.0.113.10/"));
        assert_eq!(doc.get("server", "HTTP_PORT"), Some("443"));

        let subject = mode.certificate_request().unwrap().subject;
        assert_eq!(subject.common_name(), "203.0.113.10");
        let sans: Vec<String> = subject.san_entries().iter().map(|s| s.to_string()).collect();
        assert_eq!(sans, vec!["IP:203.0.113.10"]);

        let request = mode.certificate_request().unwrap();
        let generated = crate::cert::generate_self_signed(&request).unwrap();
        let parsed = rcgen::CertificateParams::from_ca_cert_pem(&generated.cert_pem).unwrap();
        assert!(matches!(
            parsed.distinguished_name.get(&rcgen::DnType::CommonName),
            Some(rcgen::DnValue::Utf8String(name)) if name == "203.0.113.10"
        ));
        assert_eq!(
            parsed.subject_alt_names,
            vec![rcgen::SanType::IpAddress("203.0.113.10".parse().unwrap())]
        );
    }

    #[test]
    fn test_http_local_scenario() {
        let fx = fixture();
        let mode = DeploymentMode::http_local("");
        let doc = ServerConfig::resolve(&mode, &fx.profile, &fx.config, RenderTarget::Binary)
            .unwrap()
            .render();

        assert_eq!(doc.get("server", "DOMAIN"), Some("localhost"));
        assert_eq!(doc.get("server", "PROTOCOL"), Some("http"));
        assert_eq!(doc.get("server", "HTTP_PORT"), Some("3000"));
        assert!(!doc.contains_key("server", "CERT_FILE"));
        assert!(!doc.contains_key("server", "KEY_FILE"));
        assert_eq!(doc.get("database", "NAME"), Some("giteadb"));
    }

    #[test]
    fn test_boilerplate_identical_across_modes() {
        let rendered: Vec<IniDocument> = all_modes()
            .iter()
            .map(|mode| {
                let fx = fixture();
                provision(&fx.config, mode);
                ServerConfig::resolve(mode, &fx.profile, &fx.config, RenderTarget::Binary)
                    .unwrap()
                    .render()
            })
            .collect();

        for section in BOILERPLATE_SECTIONS {
            let first = rendered[0].section_text(section).unwrap();
            for doc in &rendered[1..] {
                assert_eq!(doc.section_text(section).unwrap(), first, "[{section}]");
            }
        }
        assert_eq!(rendered[0].get("security", "INSTALL_LOCK"), Some("false"));
    }

    #[test]
    fn test_container_target_listens_on_3000() {
        let fx = fixture();
        let mode = DeploymentMode::HttpsLocalhost;
        provision(&fx.config, &mode);
        let server =
            ServerConfig::resolve(&mode, &fx.profile, &fx.config, RenderTarget::Container)
                .unwrap();

        assert_eq!(server.http_port, 3000);
        assert_eq!(server.root_url, "https://localhost/");
        assert_eq!(
            server.tls.as_ref().unwrap().cert_file,
            PathBuf::from("/data/gitea/certs/cert.pem")
        );

        let env = server.env_overrides();
        assert!(env.contains(&("GITEA__SERVER__PROTOCOL".to_string(), "https".to_string())));
        assert!(env.contains(&("GITEA__DATABASE__HOST".to_string(), "db:5432".to_string())));
        assert!(env.contains(&("GITEA____APP_NAME".to_string(), "Team Git".to_string())));
        assert!(env.contains(&("GITEA__MAILER__ENABLED".to_string(), "false".to_string())));
    }

    #[test]
    fn test_apply_server_section_switches_to_http() {
        let fx = fixture();
        let https = DeploymentMode::HttpsLocalhost;
        provision(&fx.config, &https);
        let mut live = ServerConfig::resolve(&https, &fx.profile, &fx.config, RenderTarget::Binary)
            .unwrap()
            .render();
        live.set("service", "DISABLE_REGISTRATION", "true");

        let http = ServerConfig::resolve(
            &DeploymentMode::http_local("git.lan"),
            &fx.profile,
            &fx.config,
            RenderTarget::Binary,
        )
        .unwrap();
        http.apply_server_section(&mut live);

        assert!(check_tls_invariant(&live, &fx.config.paths.certificate_material()));
        assert_eq!(live.get("server", "ROOT_URL"), Some("http://git.lan:3000/"));
        assert_eq!(live.get("service", "DISABLE_REGISTRATION"), Some("true"));
    }

    #[test]
    fn test_subject_kinds_for_certificate_modes() {
        let mode = DeploymentMode::HttpsDomain {
            domain: "git.example.com".to_string(),
            issuance: IssuanceMethod::CaIssued,
        };
        let request = mode.certificate_request().unwrap();
        assert_eq!(
            request.subject,
            CertSubject::Domain("git.example.com".to_string())
        );
        assert_eq!(request.method, IssuanceMethod::CaIssued);
    }
}
