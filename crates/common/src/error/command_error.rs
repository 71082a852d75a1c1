//! 外部命令错误类型

use thiserror::Error;

/// 外部命令执行失败，携带原始输出
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to spawn '{command}': {message}")]
    Spawn { command: String, message: String },

    #[error("'{command}' exited with status {status}:\n{stderr}")]
    Failed {
        command: String,
        status: i32,
        stderr: String,
    },
}
