//! Gitea 发行版：平台识别、版本查询与二进制下载
//!
//! 版本查询在重试耗尽后退回到内置版本号；下载在重试耗尽后直接失败。

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{DeployError, NetworkError, Result, ValidationError};
use crate::retry::RetryPolicy;

/// 版本查询失败时使用的最后已知可用版本
pub const FALLBACK_VERSION: &str = "1.22.3";
/// 官方下载站点
pub const DOWNLOAD_BASE_URL: &str = "https://dl.gitea.com/gitea";
/// 最新版本描述文件
pub const VERSION_URL: &str = "https://dl.gitea.com/gitea/version.json";

/// 支持的运行平台
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    LinuxAmd64,
    LinuxArm64,
    LinuxArm6,
    DarwinAmd64,
    DarwinArm64,
}

impl Platform {
    /// 按 `std::env::consts` 的 OS/ARCH 组合识别
    pub fn from_parts(os: &str, arch: &str) -> std::result::Result<Self, ValidationError> {
        match (os, arch) {
            ("linux", "x86_64") => Ok(Platform::LinuxAmd64),
            ("linux", "aarch64") => Ok(Platform::LinuxArm64),
            ("linux", "arm") => Ok(Platform::LinuxArm6),
            ("macos", "x86_64") => Ok(Platform::DarwinAmd64),
            ("macos", "aarch64") => Ok(Platform::DarwinArm64),
            _ => Err(ValidationError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            }),
        }
    }

    pub fn detect() -> std::result::Result<Self, ValidationError> {
        Self::from_parts(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// 发行文件名中的平台后缀
    pub fn asset_suffix(&self) -> &'static str {
        match self {
            Platform::LinuxAmd64 => "linux-amd64",
            Platform::LinuxArm64 => "linux-arm64",
            Platform::LinuxArm6 => "linux-arm-6",
            Platform::DarwinAmd64 => "darwin-10.12-amd64",
            Platform::DarwinArm64 => "darwin-10.12-arm64",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.asset_suffix())
    }
}

/// 指定版本与平台的二进制下载地址
pub fn download_url(version: &str, platform: Platform) -> String {
    format!(
        "{DOWNLOAD_BASE_URL}/{version}/gitea-{version}-{}",
        platform.asset_suffix()
    )
}

/// HTTP 响应体
#[derive(Debug, Clone)]
pub struct Payload {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Payload {
    /// HTML 错误页而不是二进制
    pub fn is_markup(&self) -> bool {
        let by_header = self
            .content_type
            .as_deref()
            .map(|ct| {
                let ct = ct.to_ascii_lowercase();
                ct.starts_with("text/html") || ct.starts_with("application/xhtml")
            })
            .unwrap_or(false);
        if by_header {
            return true;
        }
        let head: String = String::from_utf8_lossy(&self.bytes[..self.bytes.len().min(64)])
            .trim_start()
            .to_ascii_lowercase();
        head.starts_with("<!doctype html") || head.starts_with("<html")
    }
}

/// 发行版来源，便于在测试中替换网络访问
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// 查询最新版本号
    async fn latest_version(&self) -> Result<String>;

    /// 下载任意地址的内容
    async fn fetch(&self, url: &str) -> Result<Payload>;
}

/// 基于 reqwest 的实现
#[derive(Debug, Clone)]
pub struct HttpReleaseSource {
    client: reqwest::Client,
    version_url: String,
}

impl HttpReleaseSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("gitea-deploy/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| NetworkError::Request {
                url: VERSION_URL.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            version_url: VERSION_URL.to_string(),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NetworkError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }
        Ok(response)
    }
}

#[async_trait]
impl ReleaseSource for HttpReleaseSource {
    async fn latest_version(&self) -> Result<String> {
        let response = self.get(&self.version_url).await?;
        let body: serde_json::Value =
            response.json().await.map_err(|e| NetworkError::InvalidResponse {
                url: self.version_url.clone(),
                message: e.to_string(),
            })?;
        parse_version_document(&body).ok_or_else(|| {
            NetworkError::InvalidResponse {
                url: self.version_url.clone(),
                message: "missing latest.version".to_string(),
            }
            .into()
        })
    }

    async fn fetch(&self, url: &str) -> Result<Payload> {
        let response = self.get(url).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(|e| NetworkError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(Payload {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

/// 解析 `{"latest": {"version": "x.y.z"}}`
pub fn parse_version_document(body: &serde_json::Value) -> Option<String> {
    body.get("latest")?
        .get("version")?
        .as_str()
        .map(|v| v.trim().trim_start_matches('v').to_string())
        .filter(|v| !v.is_empty())
}

/// 查询最新版本；重试耗尽时退回 [`FALLBACK_VERSION`]
pub async fn resolve_version(source: &dyn ReleaseSource, policy: &RetryPolicy) -> String {
    match policy
        .run("version lookup", |_| source.latest_version())
        .await
    {
        Ok(version) => {
            tracing::info!(version = %version, "resolved latest Gitea version");
            version
        }
        Err(exhausted) => {
            tracing::warn!(
                attempts = exhausted.attempts,
                error = %exhausted.last_error,
                fallback = FALLBACK_VERSION,
                "version lookup failed, using fallback version"
            );
            FALLBACK_VERSION.to_string()
        }
    }
}

/// 下载二进制到 `dest`；标记语言响应视为失败尝试
pub async fn download_binary(
    source: &dyn ReleaseSource,
    url: &str,
    dest: &Path,
    policy: &RetryPolicy,
) -> Result<PathBuf> {
    let outcome = policy
        .run("binary download", |_| async move {
            let payload = source.fetch(url).await?;
            if payload.is_markup() {
                return Err(DeployError::from(NetworkError::MarkupPayload {
                    url: url.to_string(),
                    content_type: payload
                        .content_type
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string()),
                }));
            }
            Ok(payload)
        })
        .await;

    let payload = outcome.map_err(|exhausted| NetworkError::RetriesExhausted {
        operation: format!("Downloading {url}"),
        attempts: exhausted.attempts,
        last_error: exhausted.last_error.to_string(),
        hint: format!(
            "Download the binary manually and re-run:\n  curl -fL -o {dest} {url}\n  chmod 755 {dest}",
            dest = dest.display()
        ),
    })?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(dest, &payload.bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dest, std::fs::Permissions::from_mode(0o755))?;
    }
    tracing::info!(
        url,
        dest = %dest.display(),
        bytes = payload.bytes.len(),
        "binary downloaded"
    );
    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// 按预设脚本返回结果的来源
    struct ScriptedSource {
        version_calls: AtomicU32,
        fetch_calls: AtomicU32,
        version: Option<String>,
        payload: Payload,
    }

    impl ScriptedSource {
        fn new(version: Option<&str>, payload: Payload) -> Self {
            Self {
                version_calls: AtomicU32::new(0),
                fetch_calls: AtomicU32::new(0),
                version: version.map(str::to_string),
                payload,
            }
        }
    }

    #[async_trait]
    impl ReleaseSource for ScriptedSource {
        async fn latest_version(&self) -> Result<String> {
            self.version_calls.fetch_add(1, Ordering::SeqCst);
            self.version.clone().ok_or_else(|| {
                NetworkError::Request {
                    url: VERSION_URL.to_string(),
                    message: "connection refused".to_string(),
                }
                .into()
            })
        }

        async fn fetch(&self, _url: &str) -> Result<Payload> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.payload.clone())
        }
    }

    fn html_payload() -> Payload {
        Payload {
            content_type: Some("text/html; charset=utf-8".to_string()),
            bytes: b"<!DOCTYPE html><html><body>502 Bad Gateway</body></html>".to_vec(),
        }
    }

    fn binary_payload() -> Payload {
        Payload {
            content_type: Some("application/octet-stream".to_string()),
            bytes: vec![0x7f, b'E', b'L', b'F', 2, 1, 1],
        }
    }

    #[test]
    fn test_platform_detection() {
        assert_eq!(
            Platform::from_parts("linux", "x86_64").unwrap(),
            Platform::LinuxAmd64
        );
        assert_eq!(
            Platform::from_parts("macos", "aarch64").unwrap(),
            Platform::DarwinArm64
        );
        assert!(Platform::from_parts("windows", "x86_64").is_err());
        assert!(Platform::from_parts("linux", "riscv64").is_err());
    }

    #[test]
    fn test_download_url() {
        assert_eq!(
            download_url("1.22.3", Platform::LinuxArm64),
            "https://dl.gitea.com/gitea/1.22.3/gitea-1.22.3-linux-arm64"
        );
    }

    #[test]
    fn test_markup_detection() {
        assert!(html_payload().is_markup());
        assert!(!binary_payload().is_markup());

        let sniffed = Payload {
            content_type: None,
            bytes: b"  <html><head></head></html>".to_vec(),
        };
        assert!(sniffed.is_markup());
    }

    #[test]
    fn test_parse_version_document() {
        let doc = serde_json::json!({"latest": {"version": "v1.23.1"}});
        assert_eq!(parse_version_document(&doc).as_deref(), Some("1.23.1"));
        assert!(parse_version_document(&serde_json::json!({})).is_none());
    }

    #[tokio::test]
    async fn test_version_lookup_falls_back_after_exhaustion() {
        let source = ScriptedSource::new(None, binary_payload());
        let policy = RetryPolicy::new(3, Duration::ZERO);

        let version = resolve_version(&source, &policy).await;

        assert_eq!(version, FALLBACK_VERSION);
        assert_eq!(source.version_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_version_lookup_success() {
        let source = ScriptedSource::new(Some("1.23.0"), binary_payload());
        let version = resolve_version(&source, &RetryPolicy::new(3, Duration::ZERO)).await;
        assert_eq!(version, "1.23.0");
        assert_eq!(source.version_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_download_rejects_markup_until_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("gitea");
        let source = ScriptedSource::new(None, html_payload());
        let policy = RetryPolicy::new(5, Duration::ZERO);

        let err = download_binary(&source, "https://dl.example/gitea", &dest, &policy)
            .await
            .unwrap_err();

        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 5);
        match err {
            DeployError::Network(NetworkError::RetriesExhausted { attempts, hint, .. }) => {
                assert_eq!(attempts, 5);
                assert!(hint.contains("curl -fL"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_download_writes_executable() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("bin").join("gitea");
        let source = ScriptedSource::new(None, binary_payload());

        let path = download_binary(
            &source,
            "https://dl.example/gitea",
            &dest,
            &RetryPolicy::new(5, Duration::ZERO),
        )
        .await
        .unwrap();

        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read(&path).unwrap(), binary_payload().bytes);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }
}
