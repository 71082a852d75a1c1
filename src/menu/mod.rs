//! Interactive post-install menu

pub mod app;
pub mod framework;
pub mod navigation;
pub mod pages;

pub use app::MenuApplication;
