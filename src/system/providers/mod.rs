//! 平台相关的系统提供者

pub mod debian;
pub mod macos;
