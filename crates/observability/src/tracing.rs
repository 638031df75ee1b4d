//! Tracing/logging initialization.
//!
//! Filtering follows `RUST_LOG` when set, otherwise the configured default
//! directive. Output is JSON lines for services and human-readable text for
//! interactive use, always on stderr so stdout stays free for command output.

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Filter directive used when `RUST_LOG` is unset or unparsable.
    pub default_filter: String,
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            default_filter: DEFAULT_FILTER.to_string(),
            json: true,
        }
    }
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(filter) = lookup("TIMECLOCK_LOG").filter(|v| !v.trim().is_empty()) {
            config.default_filter = filter.trim().to_string();
        }
        if let Some(json) = lookup("TIMECLOCK_LOG_JSON") {
            config.json = !matches!(json.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off");
        }
        config
    }

    /// Human-readable output, e.g. for a terminal.
    pub fn pretty(mut self) -> Self {
        self.json = false;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.default_filter))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(config: &ObservabilityConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = if config.json {
        builder
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .try_init()
    } else {
        builder.compact().try_init()
    };
}
