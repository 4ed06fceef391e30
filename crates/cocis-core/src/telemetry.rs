//! Tracing subscriber setup

use crate::config::{LogFormat, TelemetryConfig};
use crate::error::{CocisError, CocisResult};
use tracing_subscriber::EnvFilter;

/// Filter directive for a verbosity count
///
/// 0 uses the configured filter, 1 is `cocis=debug`, 2+ is `cocis=trace`.
#[must_use]
pub fn filter_directive(config: &TelemetryConfig, verbosity: u8) -> String {
    match verbosity {
        0 => config.filter.clone(),
        1 => "cocis=debug".to_string(),
        _ => "cocis=trace".to_string(),
    }
}

/// Install the global fmt subscriber
///
/// `RUST_LOG` takes precedence over the configured filter and verbosity.
///
/// # Errors
/// Returns `Config` for an invalid filter directive or when a global
/// subscriber is already installed
pub fn init(config: &TelemetryConfig, verbosity: u8) -> CocisResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directive(config, verbosity))
            .map_err(|e| CocisError::config(format!("invalid log filter: {e}")))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| CocisError::config(format!("installing subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_overrides_configured_filter() {
        let config = TelemetryConfig::default();
        assert_eq!(filter_directive(&config, 0), "cocis=info");
        assert_eq!(filter_directive(&config, 1), "cocis=debug");
        assert_eq!(filter_directive(&config, 5), "cocis=trace");
    }
}
