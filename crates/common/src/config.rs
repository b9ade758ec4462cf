//! Common configuration types for Dark Tower components.

use serde::{Deserialize, Serialize};

/// Default log level when neither `RUST_LOG` nor a service override is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
        }
    }
}

impl ObservabilityConfig {
    /// Default `EnvFilter` directive for a service crate.
    ///
    /// The service's own crate logs at the configured level, `tower_http`
    /// request tracing follows it, everything else stays at `warn`.
    #[must_use]
    pub fn filter_directive(&self, crate_name: &str) -> String {
        format!(
            "warn,{crate_name}={level},tower_http={level}",
            level = self.log_level
        )
    }
}
