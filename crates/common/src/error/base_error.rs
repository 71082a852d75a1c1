//! 顶层错误枚举
//!
//! 聚合所有子模块的错误类型，提供统一的错误处理接口

use super::{CertificateError, CommandError, ConfigError, NetworkError, ValidationError};
use thiserror::Error;

/// 顶层错误枚举
#[derive(Error, Debug)]
pub enum DeployError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 验证错误
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// 网络错误
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// 证书错误
    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),

    /// 外部命令错误
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl DeployError {
    /// 创建序列化错误
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// 是否属于前置条件类错误（平台、配置缺失），此类错误不重试
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::Config(ConfigError::FileNotFound { .. })
                | Self::Validation(ValidationError::UnsupportedPlatform { .. })
        )
    }
}

impl From<serde_json::Error> for DeployError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for DeployError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, DeployError>;
