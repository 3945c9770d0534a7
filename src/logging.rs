//! Tracing setup for crud-demo
//!
//! Usage:
//!   crud-demo --debug ...               # Debug logging to console
//!   RUST_LOG=crud_demo_lib=debug crud-demo  # Fine-grained log control
//!
//! Without `RUST_LOG` the level from `[logging]` in the config file applies.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Enable debug logging (overrides the configured level)
    pub debug: bool,
    /// Filter used when RUST_LOG is unset
    pub level: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: "info".to_string(),
        }
    }
}

/// Filter from RUST_LOG, falling back to the configured level
pub fn build_filter(config: &TracingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = if config.debug { "debug" } else { config.level.as_str() };
    EnvFilter::try_new(level).map_err(|err| anyhow!("invalid log level '{}': {}", level, err))
}

/// Initialize tracing with console output
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let filter = build_filter(config)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.debug) // Show targets in debug mode
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_levels() {
        for level in ["info", "warn", "crud_demo_lib=debug,sqlx=warn"] {
            let config = TracingConfig {
                debug: false,
                level: level.to_string(),
            };
            assert!(build_filter(&config).is_ok(), "level {}", level);
        }
    }

    #[test]
    fn test_init_twice_fails() {
        let config = TracingConfig::default();
        assert!(init_tracing(&config).is_ok());
        assert!(init_tracing(&config).is_err());
    }
}
