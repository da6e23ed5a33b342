//! Structured stderr logging for the library and the CLI.

use std::env;
use std::io;
use std::sync::OnceLock;

use thiserror::Error;
use tracing::debug;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOGGING_INSTALLED: OnceLock<()> = OnceLock::new();

/// Errors that can arise while standing up logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid logging filter: {0}")]
    Filter(#[from] ParseError),
    #[error("failed to install logging subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global stderr subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter` when it is set and
/// non-empty. The first call wins; later calls are no-ops.
pub fn init_logging(default_filter: &str) -> Result<(), LoggingError> {
    if LOGGING_INSTALLED.get().is_some() {
        return Ok(());
    }

    let filter = build_filter(default_filter)?;
    let stderr_layer = tracing_subscriber::fmt::layer()
        .event_format(
            tracing_subscriber::fmt::format()
                .with_level(true)
                .with_target(false)
                .with_ansi(false),
        )
        .with_writer(io::stderr)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init()?;
    let _ = LOGGING_INSTALLED.set(());

    debug!(filter = default_filter, "Logging initialized");
    Ok(())
}

fn build_filter(default_filter: &str) -> Result<EnvFilter, ParseError> {
    if let Ok(directives) = env::var(EnvFilter::DEFAULT_ENV) {
        if !directives.trim().is_empty() {
            return EnvFilter::try_new(directives);
        }
    }
    EnvFilter::try_new(default_filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_levels() {
        if env::var(EnvFilter::DEFAULT_ENV).is_ok() {
            return;
        }
        assert!(build_filter("warn").is_ok());
        assert!(build_filter("turn_normalizer_core=debug,info").is_ok());
    }

    #[test]
    fn test_build_filter_rejects_garbage() {
        if env::var(EnvFilter::DEFAULT_ENV).is_ok() {
            return;
        }
        assert!(build_filter("turn_normalizer_core=loudest").is_err());
    }
}
