//! 命令行界面定义

mod args;
mod commands;

pub use args::Cli;
pub use commands::{Commands, InstallTarget};
