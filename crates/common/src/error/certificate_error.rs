//! 证书相关错误类型

use std::path::PathBuf;
use thiserror::Error;

/// 证书生成、签发与校验错误
#[derive(Error, Debug)]
pub enum CertificateError {
    #[error("Failed to generate certificate: {0}")]
    Generation(#[from] rcgen::Error),

    #[error("Certificate material missing: {}", path.display())]
    MissingMaterial { path: PathBuf },

    #[error("Certificate issuance for {domain} failed:\n{output}")]
    Issuance { domain: String, output: String },

    #[error("Certificate request for {subject} is not CA-issuable: {reason}")]
    NotIssuable { subject: String, reason: String },
}
