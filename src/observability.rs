use gitea_deploy_common::config::{DeployConfig, LogConfig};
use std::fs;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::error::Result;

const LOG_FILE_NAME: &str = "gitea-deploy.log";

/// Guard for observability resources (log writer)
#[derive(Default)]
pub struct ObservabilityGuard {
    _log_guard: Option<WorkerGuard>,
}

/// Initialize logging based on configuration
pub fn init_observability(config: &DeployConfig, debug: bool) -> Result<ObservabilityGuard> {
    let mut guard = ObservabilityGuard::default();
    let observability_config = &config.observability;

    match observability_config.log.output.as_str() {
        "file" => {
            fs::create_dir_all(&observability_config.log.path)?;
            let (non_blocking, worker_guard) = build_file_writer(&observability_config.log)?;
            guard._log_guard = Some(worker_guard);

            init_subscriber_with_writer(non_blocking, false, config, debug);
        }
        _ => {
            init_subscriber_with_writer(std::io::stderr, true, config, debug);
        }
    }

    Ok(guard)
}

/// Create an EnvFilter from config; RUST_LOG wins over `--debug`
fn create_env_filter(config: &DeployConfig, debug: bool) -> EnvFilter {
    let directive = if debug && std::env::var_os("RUST_LOG").is_none() {
        "debug".to_string()
    } else {
        config.get_filter_level()
    };

    EnvFilter::try_new(&directive).unwrap_or_else(|_| {
        eprintln!(
            "Failed to parse filter directive: {}. Falling back to default: info",
            directive
        );
        EnvFilter::new("info")
    })
}

fn init_subscriber_with_writer<W>(
    writer: W,
    use_ansi: bool,
    config: &DeployConfig,
    debug: bool,
) where
    W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let fmt_layer = fmt::layer()
        .with_target(debug)
        .with_level(true)
        .with_line_number(debug)
        .with_file(debug)
        .with_ansi(use_ansi)
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(create_env_filter(config, debug))
        .with(fmt_layer)
        .try_init()
        .ok();
}

fn build_file_writer(log_config: &LogConfig) -> Result<(NonBlocking, WorkerGuard)> {
    if log_config.rotate {
        let file_appender = tracing_appender::rolling::daily(&log_config.path, LOG_FILE_NAME);
        Ok(tracing_appender::non_blocking(file_appender))
    } else {
        let log_file_path = std::path::Path::new(&log_config.path).join(LOG_FILE_NAME);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path)?;
        Ok(tracing_appender::non_blocking(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_file_output_creates_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DeployConfig::default();
        config.observability.log.output = "file".to_string();
        config.observability.log.path = dir.path().join("logs").display().to_string();

        let guard = init_observability(&config, false).unwrap();
        assert!(dir.path().join("logs").join(LOG_FILE_NAME).is_file());
        drop(guard);
    }

    #[test]
    #[serial]
    fn test_debug_flag_raises_filter_without_rust_log() {
        unsafe { std::env::remove_var("RUST_LOG") };
        let config = DeployConfig::default();
        assert_eq!(create_env_filter(&config, true).to_string(), "debug");
        assert_eq!(create_env_filter(&config, false).to_string(), "info");
    }
}
