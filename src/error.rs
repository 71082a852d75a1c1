//! 统一错误处理模型
//!
//! 提供部署工具的顶层错误类型，聚合核心库与外部命令的错误

use thiserror::Error;

/// 主应用的统一错误枚举
#[derive(Debug, Error)]
pub enum Error {
    // ========== 核心库错误 ==========
    /// 核心库聚合错误
    #[error("{0}")]
    Deploy(Box<gitea_deploy_common::DeployError>),

    // ========== 系统级错误 ==========
    /// I/O 操作错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 交互输入错误
    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),

    // ========== 业务逻辑错误 ==========
    /// 前置条件不满足（平台、依赖、环境文件、权限）
    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    /// 服务启动失败
    #[error("Service startup failed: {message}")]
    ServiceStartup { message: String },

    // ========== 通用错误 ==========
    /// Anyhow 错误兼容层
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    /// 自定义错误消息
    #[error("{message}")]
    Custom { message: String },
}

impl From<gitea_deploy_common::DeployError> for Error {
    fn from(err: gitea_deploy_common::DeployError) -> Self {
        Error::Deploy(Box::new(err))
    }
}

impl From<gitea_deploy_common::CommandError> for Error {
    fn from(err: gitea_deploy_common::CommandError) -> Self {
        Error::from(gitea_deploy_common::DeployError::from(err))
    }
}

impl From<gitea_deploy_common::CertificateError> for Error {
    fn from(err: gitea_deploy_common::CertificateError) -> Self {
        Error::from(gitea_deploy_common::DeployError::from(err))
    }
}

impl From<gitea_deploy_common::ValidationError> for Error {
    fn from(err: gitea_deploy_common::ValidationError) -> Self {
        Error::from(gitea_deploy_common::DeployError::from(err))
    }
}

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// 创建自定义错误
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    /// 创建前置条件错误
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// 创建服务启动失败错误
    pub fn service_startup(message: impl Into<String>) -> Self {
        Self::ServiceStartup {
            message: message.into(),
        }
    }
}
