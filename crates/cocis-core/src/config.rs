//! Configuration for COCIS
//!
//! Loaded from TOML; every section and key is optional.
//!
//! ```toml
//! [telemetry]
//! filter = "cocis=debug"
//! format = "json"
//!
//! [guard]
//! scope = "isolated"
//!
//! [stress]
//! threads = 16
//! iterations = 5000
//! ```

use crate::error::{CocisError, CocisResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CocisConfig {
    /// Logging settings
    pub telemetry: TelemetryConfig,

    /// Singleton guard settings
    pub guard: GuardConfig,

    /// Defaults for `cocis stress`
    pub stress: StressConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: "cocis=info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Which guard the facade binds to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardScope {
    /// The process-wide guard
    #[default]
    Process,

    /// A guard private to one facade
    Isolated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub scope: GuardScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    /// Concurrent worker threads
    pub threads: usize,

    /// Keys per worker
    pub iterations: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 8,
            iterations: 1000,
        }
    }
}

impl CocisConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from `path`; a missing file yields defaults
    ///
    /// # Errors
    /// - `Io` if the file exists but cannot be read
    /// - `Config` if it is not valid configuration TOML
    pub fn load(path: &Path) -> CocisResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| CocisError::io(format!("reading config from {}", path.display()), e))?;
        let config = toml::from_str::<Self>(&content)
            .map_err(|e| CocisError::invalid_config(path, e))?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Parse configuration from a TOML string
    ///
    /// # Errors
    /// Returns `Config` for malformed TOML or invalid values
    pub fn from_toml_str(content: &str) -> CocisResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Encode as TOML
    ///
    /// # Errors
    /// Returns `Serialization` if encoding fails
    pub fn to_toml_string(&self) -> CocisResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.telemetry.filter = filter.into();
        self
    }

    #[must_use]
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.telemetry.format = format;
        self
    }

    #[must_use]
    pub fn with_guard_scope(mut self, scope: GuardScope) -> Self {
        self.guard.scope = scope;
        self
    }

    #[must_use]
    pub fn with_stress(mut self, threads: usize, iterations: usize) -> Self {
        self.stress = StressConfig {
            threads,
            iterations,
        };
        self
    }

    fn validate(&self) -> CocisResult<()> {
        if self.stress.threads == 0 {
            return Err(CocisError::config("stress.threads must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn empty_toml_gives_defaults() {
        assert_eq!(CocisConfig::from_toml_str("").unwrap(), CocisConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = CocisConfig::from_toml_str(
            r#"
            [telemetry]
            format = "json"

            [guard]
            scope = "isolated"
            "#,
        )
        .unwrap();

        assert_eq!(config.telemetry.format, LogFormat::Json);
        assert_eq!(config.telemetry.filter, "cocis=info");
        assert_eq!(config.guard.scope, GuardScope::Isolated);
        assert_eq!(config.stress, StressConfig::default());
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = CocisConfig::from_toml_str("[guard]\nscope = \"per-thread\"").unwrap_err();
        assert!(matches!(err, CocisError::Config(_)));
    }

    #[test]
    fn zero_threads_rejected() {
        let err = CocisConfig::from_toml_str("[stress]\nthreads = 0").unwrap_err();
        assert!(matches!(err, CocisError::Config(_)));
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CocisConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, CocisConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[stress]\nthreads = 3\niterations = 7").unwrap();

        let config = CocisConfig::load(file.path()).unwrap();
        assert_eq!(
            config.stress,
            StressConfig {
                threads: 3,
                iterations: 7
            }
        );
    }

    #[test]
    fn load_reports_path_on_parse_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[stress\nthreads = ").unwrap();

        let err = CocisConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn toml_round_trip() {
        let config = CocisConfig::new()
            .with_filter("cocis=trace")
            .with_log_format(LogFormat::Json)
            .with_guard_scope(GuardScope::Isolated)
            .with_stress(2, 50);

        let encoded = config.to_toml_string().unwrap();
        assert_eq!(CocisConfig::from_toml_str(&encoded).unwrap(), config);
    }
}
