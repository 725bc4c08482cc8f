//! Tracing subscriber setup

use std::path::PathBuf;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

/// Name of the log file written under `LOG_DIR`
pub const LOG_FILE_NAME: &str = "modwatch.log";

pub const LOG_FORMAT: &str = "LOG_FORMAT";
pub const LOG_DIR: &str = "LOG_DIR";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable single-line output
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Directory of an additional JSON log file
    pub dir: Option<PathBuf>,
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unknown formats fall back to pretty output
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let format = match lookup(LOG_FORMAT).as_deref().map(str::trim) {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        let dir = lookup(LOG_DIR)
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .map(PathBuf::from);

        Self { format, dir }
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(LOG_FILE_NAME))
    }
}

/// Install the global subscriber
///
/// The filter comes from `RUST_LOG` and defaults to `info`. The returned guard
/// flushes the file writer and must be held until exit.
pub fn init(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    layers.push(match config.format {
        LogFormat::Pretty => fmt::layer()
            .compact()
            .with_writer(std::io::stdout)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stdout)
            .boxed(),
    });

    let guard = match &config.dir {
        Some(dir) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(LOG_FILE_NAME)
                .build(dir)
                .with_context(|| format!("Failed to open log file in {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(path) = config.log_path() {
        tracing::info!("Writing JSON logs to {}", path.display());
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, LogFormat::Pretty)]
    #[case(Some("json"), LogFormat::Json)]
    #[case(Some(" json "), LogFormat::Json)]
    #[case(Some("xml"), LogFormat::Pretty)]
    fn log_format_from_lookup(#[case] value: Option<&'static str>, #[case] expected: LogFormat) {
        let config = LogConfig::from_lookup(|key| {
            (key == LOG_FORMAT).then_some(value).flatten().map(str::to_string)
        });

        assert_eq!(config.format, expected);
    }

    #[test]
    fn log_path_is_inside_log_dir() {
        let config =
            LogConfig::from_lookup(|key| (key == LOG_DIR).then(|| "/var/log/bot".to_string()));

        assert_eq!(
            config.log_path(),
            Some(PathBuf::from("/var/log/bot/modwatch.log"))
        );
        assert_eq!(LogConfig::from_lookup(|_| None).log_path(), None);
    }
}
