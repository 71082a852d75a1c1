//! 自签名证书生成

use rcgen::{CertificateParams, DistinguishedName, DnType, Ia5String, KeyPair, SanType};
use time::{Duration, OffsetDateTime};

use super::{CertificateMaterial, CertificateRequest, SanEntry};
use crate::error::{CertificateError, Result};

/// 生成结果（PEM 文本）
#[derive(Debug, Clone)]
pub struct GeneratedCertificate {
    pub cert_pem: String,
    pub key_pem: String,
}

impl GeneratedCertificate {
    /// 写入证书材料位置，覆盖已有文件
    pub fn install(&self, material: &CertificateMaterial) -> Result<()> {
        material.write(&self.cert_pem, &self.key_pem)
    }
}

fn to_rcgen_san(entry: &SanEntry) -> Result<SanType> {
    match entry {
        SanEntry::Dns(name) => {
            let name = Ia5String::try_from(name.as_str()).map_err(CertificateError::Generation)?;
            Ok(SanType::DnsName(name))
        }
        SanEntry::Ip(ip) => Ok(SanType::IpAddress(*ip)),
    }
}

/// 生成新的密钥对与自签名证书；不检查已有证书是否仍然有效
pub fn generate_self_signed(request: &CertificateRequest) -> Result<GeneratedCertificate> {
    let mut params = CertificateParams::default();

    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::CommonName, request.subject.common_name());
    params.distinguished_name = distinguished_name;

    params.subject_alt_names = request
        .subject
        .san_entries()
        .iter()
        .map(to_rcgen_san)
        .collect::<Result<Vec<_>>>()?;

    params.not_before = OffsetDateTime::now_utc();
    params.not_after = params.not_before + Duration::days(i64::from(request.validity_days));

    let key_pair = KeyPair::generate().map_err(CertificateError::Generation)?;
    let cert = params
        .self_signed(&key_pair)
        .map_err(CertificateError::Generation)?;

    tracing::info!(
        subject = %request.subject,
        days = request.validity_days,
        "generated self-signed certificate"
    );

    Ok(GeneratedCertificate {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
    })
}
