//! Configuration parsing and validation for solarvisor
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Nominal voltage table with default thresholds and range checks
//! - Failsafe window and daily stop limit
//! - Command-line overrides layered on top of the file
//! - Validation with clear error messages

mod nominal;
mod schema;
mod settings;
mod validation;

pub use nominal::*;
pub use schema::*;
pub use settings::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Settings> {
    resolve_settings(load_raw_config(path)?, ConfigOverrides::default())
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Settings> {
    resolve_settings(parse_raw_config(content)?, ConfigOverrides::default())
}

/// Read a TOML file without validating its values
pub fn load_raw_config(path: impl AsRef<Path>) -> ConfigResult<RawConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_raw_config(&content)
}

/// Parse a TOML string and check its version
pub fn parse_raw_config(content: &str) -> ConfigResult<RawConfig> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    Ok(raw)
}

/// Apply command-line overrides and validate the result
pub fn resolve_settings(raw: RawConfig, overrides: ConfigOverrides) -> ConfigResult<Settings> {
    Settings::from_raw(raw.with_overrides(overrides))
        .map_err(|errors| ConfigError::ValidationFailed { errors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_minimal_config() {
        let config = r#"
            config_version = 1
            load_cmd = "/usr/bin/miner"
        "#;

        let settings = parse_config(config).unwrap();
        assert_eq!(settings.load_command, "/usr/bin/miner");
    }

    #[test]
    fn reject_wrong_version() {
        let config = r#"
            config_version = 99
            load_cmd = "/usr/bin/miner"
        "#;

        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_invalid_thresholds() {
        let config = r#"
            config_version = 1
            load_cmd = "/usr/bin/miner"
            volts_min = 53.0
            volts_start_min = 52.0
        "#;

        match parse_config(config) {
            Err(ConfigError::ValidationFailed { errors }) => {
                assert!(matches!(errors[0], ValidationError::ThresholdOrder { .. }));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn load_from_file_with_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            config_version = 1
            load_cmd = "from-file"
            max_stops_per_day = 3

            [failsafe_window]
            start = "8:30"
            stop = "18:00"
            "#
        )
        .unwrap();

        let raw = load_raw_config(file.path()).unwrap();
        let settings = resolve_settings(
            raw,
            ConfigOverrides {
                volts_min: Some(50.0),
                force_start: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(settings.load_command, "from-file");
        assert_eq!(settings.max_stops_per_day, 3);
        assert_eq!(settings.volts_min, 50.0);
        assert!(settings.force_start);
        assert_eq!(settings.failsafe_window.to_string(), "[08:30, 18:00)");
    }

    #[test]
    fn missing_file_is_read_error() {
        let result = load_config("/nonexistent/solarvisor/config.toml");
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }
}
