//! 有界重试策略
//!
//! 固定的最大尝试次数，尝试之间的等待按尝试序号线性增长：
//! 第 n 次失败后等待 `base_delay * n`。

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "duration_secs", rename = "base_delay_secs")]
    pub base_delay: Duration,
}

/// 重试耗尽
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// 版本查询：3 次，2 秒起
    pub const fn version_lookup() -> Self {
        Self::new(3, Duration::from_secs(2))
    }

    /// 二进制下载：5 次，3 秒起
    pub const fn download() -> Self {
        Self::new(5, Duration::from_secs(3))
    }

    /// 包管理器锁竞争：5 次，10 秒起
    pub const fn package_lock() -> Self {
        Self::new(5, Duration::from_secs(10))
    }

    /// 服务启动检查：5 次，2 秒起
    pub const fn service_start() -> Self {
        Self::new(5, Duration::from_secs(2))
    }

    /// 第 `attempt` 次失败后的等待时间（从 1 开始）
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// 异步重试
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut f: F) -> Result<T, Exhausted<E>>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.attempts();
        let mut attempt = 1;
        loop {
            match f(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= attempts => {
                    tracing::warn!(operation, attempt, error = %err, "giving up");
                    return Err(Exhausted {
                        attempts: attempt,
                        last_error: err,
                    });
                }
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = attempts,
                        error = %err,
                        "attempt failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// 阻塞重试，用于包管理器与服务管理这类同步外部命令
    pub fn run_blocking<T, E, F>(&self, operation: &str, mut f: F) -> Result<T, Exhausted<E>>
    where
        E: Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let attempts = self.attempts();
        let mut attempt = 1;
        loop {
            match f(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= attempts => {
                    tracing::warn!(operation, attempt, error = %err, "giving up");
                    return Err(Exhausted {
                        attempts: attempt,
                        last_error: err,
                    });
                }
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = attempts,
                        error = %err,
                        "attempt failed, retrying in {:?}",
                        delay
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
