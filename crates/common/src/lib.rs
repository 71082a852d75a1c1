//! Gitea 部署核心库
//!
//! 为部署工具提供与系统交互无关的核心逻辑：部署模式选择、证书请求与生成、
//! 配置渲染、重试策略、版本查询与下载、环境文件与工具设置

pub mod cert;
pub mod config;
pub mod error;
pub mod mode;
pub mod profile;
pub mod release;
pub mod render;
pub mod retry;

// Re-export commonly used types for convenience
pub use cert::{
    AcmePlan, CertSubject, CertificateMaterial, CertificateRequest, GeneratedCertificate,
    IssuanceMethod, SanEntry, generate_self_signed,
};
pub use config::DeployConfig;
pub use error::{
    CertificateError, CommandError, ConfigError, DeployError, NetworkError, Result,
    ValidationError,
};
pub use mode::{DeploymentMode, ExposedPort, ModeKind};
pub use profile::EnvironmentProfile;
pub use release::{HttpReleaseSource, Platform, ReleaseSource};
pub use render::{ComposeDescriptor, IniDocument, RenderTarget, ServerConfig};
pub use retry::RetryPolicy;
