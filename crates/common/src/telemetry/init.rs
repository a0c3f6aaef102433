use anyhow::{anyhow, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::TelemetryConfig;

/// Installs the global subscriber: JSON lines on stdout filtered by
/// `RUST_LOG`, falling back to the configured level.
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_span_list(true)
        .with_current_span(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

    info!(service = %config.service_name, "telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "chronicle");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_second_init_fails() {
        let config = TelemetryConfig {
            service_name: "test-service".to_string(),
            log_level: "debug".to_string(),
        };

        // Another test in this binary may have won the race for the global
        // subscriber, so only the second call is asserted.
        let _ = init_telemetry(&config);
        assert!(init_telemetry(&config).is_err());
    }
}
