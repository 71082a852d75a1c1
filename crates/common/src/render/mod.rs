//! Gitea 配置渲染
//!
//! - [`IniDocument`]: 保留原始行的 INI 文档，用于生成与就地改写 app.ini
//! - [`ServerConfig`]: 由部署模式解析出的配置键值
//! - [`ComposeDescriptor`]: 容器部署的 docker-compose.yml

mod compose;
mod ini;
mod server_config;

pub use compose::{ComposeDescriptor, GITEA_IMAGE, POSTGRES_IMAGE};
pub use ini::IniDocument;
pub use server_config::{
    BOILERPLATE, BOILERPLATE_SECTIONS, CONTAINER_CERT_DIR, DatabaseSection, RenderTarget,
    ServerConfig, TlsFiles, check_tls_invariant,
};
