//! Configuration loading and validation for the healthcheck binary

use healthcheck::{EndpointConfig, LoadOutcome, LoadPolicy, RejectedEndpoint, load_descriptors};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: &'static str },

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Invalid {0}")]
    Endpoint(#[from] RejectedEndpoint),

    #[error("No valid endpoints configured")]
    NoEndpoints,
}

impl From<ConfigError> for common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::IoError(e) => common::Error::Io(e),
            other => common::Error::config(other),
        }
    }
}

/// Rendering of reported events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultSettings,

    #[serde(default)]
    pub policy: LoadPolicy,

    #[serde(default)]
    pub reporting: ReportingSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub metrics: MetricsSettings,

    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        self.defaults.validate()?;
        self.reporting.validate()?;
        self.logging.validate()?;
        self.metrics.validate()?;
        Ok(())
    }
}

/// Values applied to endpoint records that leave them out
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DefaultSettings {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_probe_duration")]
    pub interval: Duration,

    /// Clamped to the record's interval
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_probe_duration")]
    pub timeout: Duration,
}

/// What gets reported and how often
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ReportingSettings {
    pub format: OutputFormat,

    /// Report every verdict, not only state changes
    pub every_tick: bool,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_summary_interval")]
    pub summary_interval: Duration,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingSettings {
    #[validate(custom = "validate_log_level")]
    pub level: String,
    pub format: OutputFormat,
}

/// Prometheus endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,

    #[validate(custom = "validate_listen_addr")]
    pub listen_addr: String,
}

// Default implementations

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            timeout: healthcheck::descriptor::DEFAULT_TIMEOUT,
        }
    }
}

impl Default for ReportingSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            every_tick: false,
            summary_interval: Duration::from_secs(15),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: OutputFormat::Text,
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1:9464".to_string(),
        }
    }
}

// Custom validators

fn validate_probe_duration(duration: &Duration) -> Result<(), ValidationError> {
    if duration.is_zero() || *duration > Duration::from_secs(24 * 60 * 60) {
        return Err(ValidationError::new("probe_duration_out_of_range"));
    }
    Ok(())
}

fn validate_summary_interval(interval: &Duration) -> Result<(), ValidationError> {
    let millis = interval.as_millis();
    if !(100..=3_600_000).contains(&millis) {
        return Err(ValidationError::new("summary_interval_out_of_range"));
    }
    Ok(())
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new("log_level_unknown")),
    }
}

fn validate_listen_addr(addr: &str) -> Result<(), ValidationError> {
    addr.parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("listen_addr_invalid"))
}

/// Check that `path` names an existing YAML file
pub fn check_config_path(path: &Path) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidPath {
        path: path.to_path_buf(),
        reason,
    };

    if !path.exists() {
        return Err(invalid("file does not exist"));
    }
    if !path.is_file() {
        return Err(invalid("not a regular file"));
    }
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => Ok(()),
        _ => Err(invalid("expected a .yaml or .yml file")),
    }
}

// Configuration loading implementation

impl Config {
    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        check_config_path(path)?;
        tracing::debug!(path = %path.display(), "Loading configuration");
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parse a document that is either a bare endpoint list or a full mapping
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let document: serde_yaml::Value = if contents.trim().is_empty() {
            serde_yaml::Value::Null
        } else {
            serde_yaml::from_str(contents)?
        };

        let config = if document.is_null() {
            Config::default()
        } else if document.is_sequence() {
            Config {
                endpoints: serde_yaml::from_value(document)?,
                ..Config::default()
            }
        } else {
            serde_yaml::from_value(document)?
        };

        config.validate()?;
        Ok(config)
    }

    /// Endpoint records with the `defaults` section filled in
    pub fn endpoint_records(&self) -> Vec<EndpointConfig> {
        self.endpoints
            .iter()
            .cloned()
            .map(|mut record| {
                let interval = *record.interval.get_or_insert(self.defaults.interval);
                if record.timeout.is_none() && !interval.is_zero() {
                    record.timeout = Some(self.defaults.timeout.min(interval));
                }
                record
            })
            .collect()
    }

    /// Validate the endpoint records under the configured policy
    pub fn load_descriptors(&self) -> Result<LoadOutcome, ConfigError> {
        let outcome = load_descriptors(self.endpoint_records(), self.policy)?;
        if outcome.descriptors.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthcheck::DescriptorError;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bare_endpoint_list() {
        let yaml = r#"
- name: index
  url: https://example.com/
- name: careers
  url: https://example.com/careers
  method: GET
  headers:
    user-agent: fetch-synthetic-monitor
"#;

        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.policy, LoadPolicy::AllOrNothing);

        let outcome = config.load_descriptors().unwrap();
        let careers = &outcome.descriptors[1];
        assert_eq!(careers.id(), "careers");
        assert_eq!(careers.interval(), Duration::from_secs(15));
        assert_eq!(careers.timeout(), Duration::from_millis(500));
        assert_eq!(careers.headers()["user-agent"], "fetch-synthetic-monitor");
    }

    #[test]
    fn test_full_document() {
        let yaml = r#"
defaults:
  interval: 5s
  timeout: 2s
policy: partial
reporting:
  format: json
  every_tick: true
  summary_interval: 30s
logging:
  level: debug
metrics:
  enabled: true
  listen_addr: "0.0.0.0:9100"
endpoints:
  - id: api
    url: http://localhost:8080/health
    expected_status: [200, 204]
    interval: 1s
"#;

        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.policy, LoadPolicy::Partial);
        assert_eq!(config.reporting.format, OutputFormat::Json);
        assert!(config.reporting.every_tick);
        assert_eq!(config.reporting.summary_interval, Duration::from_secs(30));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, OutputFormat::Text);
        assert!(config.metrics.enabled);

        let records = config.endpoint_records();
        assert_eq!(records[0].interval, Some(Duration::from_secs(1)));
        // default timeout is clamped to the record's shorter interval
        assert_eq!(records[0].timeout, Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let yaml = r#"
endpoints:
  - url: http://localhost/
"#;

        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.defaults.interval, Duration::from_secs(15));
        assert_eq!(config.reporting.summary_interval, Duration::from_secs(15));
        assert_eq!(config.metrics.listen_addr, "127.0.0.1:9464");
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_humantime_serde_parsing() {
        let yaml = r#"
defaults:
  interval: 1m 30s
  timeout: 250ms
"#;

        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.defaults.interval, Duration::from_secs(90));
        assert_eq!(config.defaults.timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        for yaml in [
            "defaults:\n  interval: 0s\n",
            "reporting:\n  summary_interval: 2h\n",
            "logging:\n  level: loud\n",
            "metrics:\n  listen_addr: not-an-address\n",
        ] {
            assert!(
                matches!(Config::from_yaml_str(yaml), Err(ConfigError::ValidationError(_))),
                "accepted {yaml:?}"
            );
        }
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        assert!(matches!(
            Config::from_yaml_str("endpoints: [unclosed"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            Config::from_yaml_str("policy: sometimes\n"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_all_or_nothing_rejects_document() {
        let yaml = r#"
- url: http://localhost/ok
- name: broken
  url: not a url
"#;

        let err = Config::from_yaml_str(yaml)
            .unwrap()
            .load_descriptors()
            .unwrap_err();
        match err {
            ConfigError::Endpoint(rejected) => {
                assert_eq!(rejected.index, 1);
                assert_eq!(rejected.label, "broken");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_partial_keeps_valid_records() {
        let yaml = r#"
policy: partial
endpoints:
  - url: http://localhost/ok
  - name: dup
    url: http://localhost/a
  - name: dup
    url: http://localhost/b
"#;

        let outcome = Config::from_yaml_str(yaml)
            .unwrap()
            .load_descriptors()
            .unwrap();
        assert_eq!(outcome.descriptors.len(), 2);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(
            outcome.rejected[0].error,
            DescriptorError::DuplicateId("dup".to_string())
        );
    }

    #[test]
    fn test_empty_document_has_no_endpoints() {
        let config = Config::from_yaml_str("").unwrap();
        assert!(matches!(config.load_descriptors(), Err(ConfigError::NoEndpoints)));
    }

    #[test]
    fn test_log_level_validation() {
        assert!(validate_log_level("info").is_ok());
        assert!(validate_log_level("WARN").is_ok());
        assert!(validate_log_level("verbose").is_err());
    }

    #[test]
    fn test_check_config_path() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            check_config_path(&missing),
            Err(ConfigError::InvalidPath { reason: "file does not exist", .. })
        ));

        assert!(matches!(
            check_config_path(dir.path()),
            Err(ConfigError::InvalidPath { reason: "not a regular file", .. })
        ));

        let txt = dir.path().join("endpoints.txt");
        std::fs::write(&txt, "[]").unwrap();
        assert!(check_config_path(&txt).is_err());

        let yml = dir.path().join("endpoints.yml");
        std::fs::write(&yml, "[]").unwrap();
        assert!(check_config_path(&yml).is_ok());
    }
}
