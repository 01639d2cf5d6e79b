//! Tracing subscriber setup for the `elastic-wasm` binary.
//!
//! Output goes to stderr so stdout stays reserved for the guest's return
//! code and the optional event dump.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tracing output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TracingFormat {
    /// Human-readable multi-line format with colors.
    Pretty,

    /// Single-line format.
    Compact,

    /// JSON format (recommended for production).
    Json,
}

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level filter.
    ///
    /// If None, uses RUST_LOG environment variable or defaults to "info".
    pub level: Option<tracing::Level>,

    /// Output format.
    pub format: TracingFormat,

    /// Include timestamps in output.
    pub timestamps: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: TracingFormat::Compact,
            timestamps: true,
        }
    }
}

impl TracingConfig {
    fn filter(&self) -> EnvFilter {
        match self.level {
            Some(level) => EnvFilter::new(level.to_string()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        }
    }
}

/// Initialize the global subscriber.
///
/// # Environment Variables
///
/// - `RUST_LOG=debug` - Enable debug logs (includes the capability call trace)
/// - `RUST_LOG=elastic_wasm::guest=debug` - Only guest log lines
///
/// Returns an error if a global subscriber is already installed.
pub fn init_subscriber(
    config: TracingConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = config.filter();
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match (config.format, config.timestamps) {
        (TracingFormat::Pretty, true) => tracing_subscriber::registry()
            .with(filter)
            .with(layer.pretty())
            .try_init(),
        (TracingFormat::Pretty, false) => tracing_subscriber::registry()
            .with(filter)
            .with(layer.pretty().without_time())
            .try_init(),
        (TracingFormat::Compact, true) => tracing_subscriber::registry()
            .with(filter)
            .with(layer.compact())
            .try_init(),
        (TracingFormat::Compact, false) => tracing_subscriber::registry()
            .with(filter)
            .with(layer.compact().without_time())
            .try_init(),
        (TracingFormat::Json, true) => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init(),
        (TracingFormat::Json, false) => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json().without_time())
            .try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.format, TracingFormat::Compact);
        assert!(config.timestamps);
        assert!(config.level.is_none());
    }

    #[test]
    fn test_explicit_level_overrides_env() {
        let config = TracingConfig {
            level: Some(tracing::Level::DEBUG),
            ..Default::default()
        };
        let filter = config.filter().to_string();
        assert!(filter.to_lowercase().contains("debug"));
    }
}
