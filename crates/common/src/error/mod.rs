//! 错误处理模块
//!
//! 按概念分离的错误类型定义，遵循一个文件一个核心概念的原则

mod base_error;
mod certificate_error;
mod command_error;
mod config_error;
mod network_error;
mod validation_error;

pub use base_error::{DeployError, Result};
pub use certificate_error::CertificateError;
pub use command_error::CommandError;
pub use config_error::ConfigError;
pub use network_error::NetworkError;
pub use validation_error::ValidationError;
