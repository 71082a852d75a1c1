//! 验证相关错误类型
//!
//! 定义操作员输入与运行平台检查相关的错误

use thiserror::Error;

/// 验证相关错误
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error(
        "Invalid deployment mode '{input}': expected 1-4 or one of http_local, https_localhost, https_domain, https_ip"
    )]
    InvalidMode { input: String },

    #[error("Invalid IP address: {input}")]
    InvalidIp { input: String },

    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Unsupported render target for mode {mode}: {reason}")]
    UnsupportedTarget { mode: String, reason: String },
}
