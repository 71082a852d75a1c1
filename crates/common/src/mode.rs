//! 部署模式
//!
//! 一次运行只选择一次部署模式，之后不可变。模式决定三件事：
//! 对外暴露的端口、是否需要证书请求、以及证书主体。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::cert::{CertSubject, CertificateRequest, IssuanceMethod};
use crate::error::ValidationError;

/// Gitea 明文 HTTP 端口
pub const HTTP_PORT: u16 = 3000;
/// HTTPS 模式端口
pub const HTTPS_PORT: u16 = 443;
/// CA 域名验证使用的明文端口
pub const ACME_VALIDATION_PORT: u16 = 80;

/// 不带负载的模式选择器，对应菜单中的四个选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    HttpLocal,
    HttpsLocalhost,
    HttpsDomain,
    HttpsIp,
}

impl ModeKind {
    pub const ALL: [ModeKind; 4] = [
        ModeKind::HttpLocal,
        ModeKind::HttpsLocalhost,
        ModeKind::HttpsDomain,
        ModeKind::HttpsIp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModeKind::HttpLocal => "http_local",
            ModeKind::HttpsLocalhost => "https_localhost",
            ModeKind::HttpsDomain => "https_domain",
            ModeKind::HttpsIp => "https_ip",
        }
    }

    /// 菜单中展示的描述
    pub fn description(&self) -> &'static str {
        match self {
            ModeKind::HttpLocal => "HTTP on port 3000 (local / LAN use)",
            ModeKind::HttpsLocalhost => "HTTPS for localhost (self-signed certificate)",
            ModeKind::HttpsDomain => "HTTPS for a domain name (self-signed or Let's Encrypt)",
            ModeKind::HttpsIp => "HTTPS for a public IP address (self-signed certificate)",
        }
    }

    pub fn is_https(&self) -> bool {
        !matches!(self, ModeKind::HttpLocal)
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModeKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "http_local" => Ok(ModeKind::HttpLocal),
            "2" | "https_localhost" => Ok(ModeKind::HttpsLocalhost),
            "3" | "https_domain" => Ok(ModeKind::HttpsDomain),
            "4" | "https_ip" => Ok(ModeKind::HttpsIp),
            _ => Err(ValidationError::InvalidMode {
                input: s.to_string(),
            }),
        }
    }
}

/// 已解析的部署模式，每个变体只携带在该分支有效的数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentMode {
    /// 纯 HTTP，端口 3000
    HttpLocal { domain: String },
    /// localhost 自签名 HTTPS
    HttpsLocalhost,
    /// 域名 HTTPS，证书可自签或由 CA 签发
    HttpsDomain {
        domain: String,
        issuance: IssuanceMethod,
    },
    /// IP HTTPS，自签名
    HttpsIp { ip: IpAddr },
}

/// 模式暴露的一个网络端口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposedPort {
    pub port: u16,
    /// 仅在证书签发验证期间开放
    pub transient: bool,
}

impl DeploymentMode {
    /// 纯 HTTP 模式；空输入解析为 `localhost`
    pub fn http_local(domain_input: &str) -> Self {
        let domain = domain_input.trim();
        let domain = if domain.is_empty() {
            "localhost".to_string()
        } else {
            domain.to_string()
        };
        DeploymentMode::HttpLocal { domain }
    }

    /// IP 模式：操作员确认检测到的地址时使用检测值，否则解析手工输入
    pub fn https_ip(
        detected: Option<IpAddr>,
        accept_detected: bool,
        manual: Option<&str>,
    ) -> Result<Self, ValidationError> {
        match (detected, accept_detected) {
            (Some(ip), true) => Ok(DeploymentMode::HttpsIp { ip }),
            _ => {
                let input = manual.map(str::trim).unwrap_or_default();
                if input.is_empty() {
                    return Err(ValidationError::Required {
                        field: "ip".to_string(),
                    });
                }
                let ip = input.parse::<IpAddr>().map_err(|_| ValidationError::InvalidIp {
                    input: input.to_string(),
                })?;
                Ok(DeploymentMode::HttpsIp { ip })
            }
        }
    }

    pub fn kind(&self) -> ModeKind {
        match self {
            DeploymentMode::HttpLocal { .. } => ModeKind::HttpLocal,
            DeploymentMode::HttpsLocalhost => ModeKind::HttpsLocalhost,
            DeploymentMode::HttpsDomain { .. } => ModeKind::HttpsDomain,
            DeploymentMode::HttpsIp { .. } => ModeKind::HttpsIp,
        }
    }

    pub fn is_https(&self) -> bool {
        self.kind().is_https()
    }

    pub fn protocol(&self) -> &'static str {
        if self.is_https() { "https" } else { "http" }
    }

    /// Gitea 的 DOMAIN 值
    pub fn domain(&self) -> String {
        match self {
            DeploymentMode::HttpLocal { domain } => domain.clone(),
            DeploymentMode::HttpsLocalhost => "localhost".to_string(),
            DeploymentMode::HttpsDomain { domain, .. } => domain.clone(),
            DeploymentMode::HttpsIp { ip } => ip.to_string(),
        }
    }

    /// 对外访问端口
    pub fn public_port(&self) -> u16 {
        if self.is_https() { HTTPS_PORT } else { HTTP_PORT }
    }

    /// 对外的根 URL；默认端口不出现在 URL 中
    pub fn root_url(&self) -> String {
        let host = match self {
            DeploymentMode::HttpsIp { ip: IpAddr::V6(v6) } => format!("[{v6}]"),
            _ => self.domain(),
        };
        if self.is_https() {
            format!("https://{host}/")
        } else {
            format!("http://{host}:{HTTP_PORT}/")
        }
    }

    /// 防火墙需要开放的端口
    pub fn exposed_ports(&self) -> Vec<ExposedPort> {
        let mut ports = vec![ExposedPort {
            port: self.public_port(),
            transient: false,
        }];
        if self.certificate_request().map(|r| r.method) == Some(IssuanceMethod::CaIssued) {
            ports.push(ExposedPort {
                port: ACME_VALIDATION_PORT,
                transient: true,
            });
        }
        ports
    }

    /// HTTPS 模式生成证书请求，HTTP 模式返回 None
    pub fn certificate_request(&self) -> Option<CertificateRequest> {
        match self {
            DeploymentMode::HttpLocal { .. } => None,
            DeploymentMode::HttpsLocalhost => Some(CertificateRequest::self_signed(
                CertSubject::Localhost,
            )),
            DeploymentMode::HttpsDomain { domain, issuance } => Some(CertificateRequest::new(
                CertSubject::Domain(domain.clone()),
                *issuance,
            )),
            DeploymentMode::HttpsIp { ip } => {
                Some(CertificateRequest::self_signed(CertSubject::Ip(*ip)))
            }
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind(), self.root_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_mode_kind_parsing() {
        assert_eq!("1".parse::<ModeKind>().unwrap(), ModeKind::HttpLocal);
        assert_eq!(" 4 ".parse::<ModeKind>().unwrap(), ModeKind::HttpsIp);
        assert_eq!(
            "HTTPS_DOMAIN".parse::<ModeKind>().unwrap(),
            ModeKind::HttpsDomain
        );

        for bad in ["", "0", "5", "https", "http-local"] {
            let err = bad.parse::<ModeKind>().unwrap_err();
            assert!(matches!(err, ValidationError::InvalidMode { .. }), "{bad}");
        }
    }

    #[test]
    fn test_http_local_defaults_to_localhost() {
        let mode = DeploymentMode::http_local("   ");
        assert_eq!(mode.domain(), "localhost");
        assert_eq!(mode.protocol(), "http");
        assert_eq!(mode.public_port(), 3000);
        assert_eq!(mode.root_url(), "http://localhost:3000/");
        assert!(mode.certificate_request().is_none());
    }

    #[test]
    fn test_https_ip_uses_detected_address() {
        let detected = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 10));
        let mode = DeploymentMode::https_ip(Some(detected), true, None).unwrap();
        assert_eq!(mode.domain(), "203.0.113.10");
        assert_eq!(mode.root_url(), "https://203.0.113.10/");

        let request = mode.certificate_request().unwrap();
        assert_eq!(request.subject, CertSubject::Ip(detected));
        assert_eq!(request.method, IssuanceMethod::SelfSigned);
    }

    #[test]
    fn test_https_ip_rejected_detection_requires_valid_input() {
        let detected = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));
        let err = DeploymentMode::https_ip(Some(detected), false, Some("not-an-ip")).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidIp { .. }));

        let err = DeploymentMode::https_ip(None, true, None).unwrap_err();
        assert!(matches!(err, ValidationError::Required { .. }));

        let mode = DeploymentMode::https_ip(Some(detected), false, Some("198.51.100.7")).unwrap();
        assert_eq!(mode.domain(), "198.51.100.7");
    }

    #[test]
    fn test_exposed_ports_per_mode() {
        let http = DeploymentMode::http_local("");
        assert_eq!(
            http.exposed_ports(),
            vec![ExposedPort {
                port: 3000,
                transient: false
            }]
        );

        let self_signed = DeploymentMode::HttpsDomain {
            domain: "git.example.com".to_string(),
            issuance: IssuanceMethod::SelfSigned,
        };
        assert_eq!(self_signed.exposed_ports().len(), 1);
        assert_eq!(self_signed.exposed_ports()[0].port, 443);

        let ca = DeploymentMode::HttpsDomain {
            domain: "git.example.com".to_string(),
            issuance: IssuanceMethod::CaIssued,
        };
        let ports = ca.exposed_ports();
        assert_eq!(ports.len(), 2);
        assert!(ports.contains(&ExposedPort {
            port: 80,
            transient: true
        }));
    }

    #[test]
    fn test_ipv6_root_url_is_bracketed() {
        let mode = DeploymentMode::HttpsIp {
            ip: "2001:db8::1".parse().unwrap(),
        };
        assert_eq!(mode.root_url(), "https://[2001:db8::1]/");
    }
}
