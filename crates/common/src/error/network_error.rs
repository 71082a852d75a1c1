//! 网络相关错误类型
//!
//! 定义版本查询与二进制下载过程中的错误

use thiserror::Error;

/// 网络相关错误
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("HTTP error {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("Received markup instead of a binary from {url} (content-type: {content_type})")]
    MarkupPayload { url: String, content_type: String },

    #[error("Unexpected response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    #[error("{operation} failed after {attempts} attempts: {last_error}\n{hint}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
        hint: String,
    },
}
