//! 证书请求与证书材料
//!
//! 证书主体只能是域名或 IP 之一（localhost 为特例，同时带有两类 SAN）。
//! 证书材料固定放在同一目录：`cert.pem` 对所有用户可读，`key.pem` 仅属主可读写。

mod acme;
mod self_signed;

pub use acme::{
    AcmePlan, LETSENCRYPT_LIVE_DIR, RENEWAL_MARKER, RENEWAL_SCHEDULE, merge_crontab, remove_renewal,
    renewal_cron_entry,
};
pub use self_signed::{GeneratedCertificate, generate_self_signed};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use crate::error::{CertificateError, Result};

/// 自签名证书的有效期（天）
pub const SELF_SIGNED_VALIDITY_DAYS: u32 = 3650;
/// 证书文件名
pub const CERT_FILE_NAME: &str = "cert.pem";
/// 私钥文件名
pub const KEY_FILE_NAME: &str = "key.pem";
/// 私钥权限：仅属主读写
pub const KEY_FILE_MODE: u32 = 0o600;
/// 证书权限：所有人可读
pub const CERT_FILE_MODE: u32 = 0o644;

/// 证书签发方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuanceMethod {
    SelfSigned,
    CaIssued,
}

impl fmt::Display for IssuanceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssuanceMethod::SelfSigned => f.write_str("self_signed"),
            IssuanceMethod::CaIssued => f.write_str("ca_issued"),
        }
    }
}

/// 证书主体
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CertSubject {
    Localhost,
    Domain(String),
    Ip(IpAddr),
}

/// 主体备用名称条目
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SanEntry {
    Dns(String),
    Ip(IpAddr),
}

impl fmt::Display for SanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SanEntry::Dns(name) => write!(f, "DNS:{name}"),
            SanEntry::Ip(ip) => write!(f, "IP:{ip}"),
        }
    }
}

impl CertSubject {
    /// 证书 CN
    pub fn common_name(&self) -> String {
        match self {
            CertSubject::Localhost => "localhost".to_string(),
            CertSubject::Domain(domain) => domain.clone(),
            CertSubject::Ip(ip) => ip.to_string(),
        }
    }

    /// 按主体类型生成 SAN：域名只有 DNS，IP 只有 IP，localhost 两者都有
    pub fn san_entries(&self) -> Vec<SanEntry> {
        match self {
            CertSubject::Localhost => vec![
                SanEntry::Dns("localhost".to_string()),
                SanEntry::Ip(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            ],
            CertSubject::Domain(domain) => vec![SanEntry::Dns(domain.clone())],
            CertSubject::Ip(ip) => vec![SanEntry::Ip(*ip)],
        }
    }
}

impl fmt::Display for CertSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.common_name())
    }
}

/// 证书请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub subject: CertSubject,
    pub validity_days: u32,
    pub method: IssuanceMethod,
}

impl CertificateRequest {
    pub fn new(subject: CertSubject, method: IssuanceMethod) -> Self {
        Self {
            subject,
            validity_days: SELF_SIGNED_VALIDITY_DAYS,
            method,
        }
    }

    pub fn self_signed(subject: CertSubject) -> Self {
        Self::new(subject, IssuanceMethod::SelfSigned)
    }

    /// CA 签发只接受域名主体
    pub fn ca_domain(&self) -> Result<&str> {
        match (&self.subject, self.method) {
            (CertSubject::Domain(domain), IssuanceMethod::CaIssued) => Ok(domain),
            (subject, _) => Err(CertificateError::NotIssuable {
                subject: subject.to_string(),
                reason: "only domain subjects can be issued by a certificate authority"
                    .to_string(),
            }
            .into()),
        }
    }
}

/// 证书材料：同目录下的证书与私钥
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateMaterial {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl CertificateMaterial {
    /// 证书目录下的固定位置
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            cert_path: dir.join(CERT_FILE_NAME),
            key_path: dir.join(KEY_FILE_NAME),
        }
    }

    /// 两个文件都存在
    pub fn exists(&self) -> bool {
        self.cert_path.is_file() && self.key_path.is_file()
    }

    /// 校验材料存在，缺失时返回第一个缺失的路径
    pub fn ensure_exists(&self) -> Result<()> {
        for path in [&self.cert_path, &self.key_path] {
            if !path.is_file() {
                return Err(CertificateError::MissingMaterial { path: path.clone() }.into());
            }
        }
        Ok(())
    }

    /// 写入 PEM 内容（无条件覆盖）并立即应用权限
    pub fn write(&self, cert_pem: &str, key_pem: &str) -> Result<()> {
        if let Some(parent) = self.cert_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.key_path, key_pem)?;
        fs::write(&self.cert_path, cert_pem)?;
        self.apply_permissions()?;
        tracing::info!(
            cert = %self.cert_path.display(),
            key = %self.key_path.display(),
            "certificate material written"
        );
        Ok(())
    }

    /// 私钥 0600，证书 0644
    pub fn apply_permissions(&self) -> Result<()> {
        set_mode(&self.key_path, KEY_FILE_MODE)?;
        set_mode(&self.cert_path, CERT_FILE_MODE)?;
        Ok(())
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
