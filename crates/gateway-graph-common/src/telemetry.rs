//! Tracing subscriber setup
//!
//! Library code only emits `tracing` events. Binaries and test harnesses that
//! embed the discovery engine call [`init_tracing`] once to decide where
//! those events go.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable selecting the log format ("json" or "text")
pub const ENV_LOG_FORMAT: &str = "GATEWAY_GRAPH_LOG_FORMAT";

/// Errors that can occur during telemetry initialization
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directive could not be parsed
    #[error("invalid log filter '{directive}': {message}")]
    Filter {
        /// The rejected directive
        directive: String,
        /// Parser message
        message: String,
    },

    /// A global subscriber was already installed
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Output format for log lines
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Configuration for telemetry initialization
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is not set (e.g., "info,kube=warn")
    pub default_directive: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let format = match std::env::var(ENV_LOG_FORMAT).ok().as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        Self {
            default_directive: "info".to_string(),
            format,
        }
    }
}

/// Build the event filter: `RUST_LOG` wins over the configured default
pub fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.default_directive).map_err(|e| TelemetryError::Filter {
        directive: config.default_directive.clone(),
        message: e.to_string(),
    })
}

/// Install the global tracing subscriber
///
/// Fails if a subscriber is already installed, so call it once per process.
pub fn init_tracing(config: TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(&config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init(),
    };

    result.map_err(|e| TelemetryError::SubscriberInit(e.to_string()))
}
