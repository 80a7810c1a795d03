use std::time::Duration;

use serde::Deserialize;

use crate::error::EngineError;

/// Root configuration, parsed from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SettleConfig {
    /// HTTP API port.
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Debounce settings.
    #[serde(default)]
    pub batching: BatchingConfig,

    /// Remote analysis service. Without a URL every message is only logged.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Slack Events API ingestion.
    #[serde(default)]
    pub slack: SlackConfig,
}

fn default_api_port() -> u16 {
    9300
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            batching: BatchingConfig::default(),
            analyzer: AnalyzerConfig::default(),
            slack: SlackConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchingConfig {
    /// Quiet period (seconds) after the last message before a batch is flushed.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// How long shutdown waits for flushes that are already analyzing.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_shutdown_grace_secs() -> u64 {
    5
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl BatchingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.timeout_secs == 0 {
            return Err(EngineError::Config(
                "batching.timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalyzerConfig {
    /// Endpoint receiving one POST per flushed message.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SlackConfig {
    /// Workspace URL used to build message permalinks.
    #[serde(default = "default_archive_base_url")]
    pub archive_base_url: String,
}

fn default_archive_base_url() -> String {
    "https://slack.com".into()
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            archive_base_url: default_archive_base_url(),
        }
    }
}

impl SettleConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, EngineError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::Config(format!("{path}: {e}")))?;
        Self::parse(&content).map_err(|e| e.with_context(path))
    }

    /// Like [`SettleConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &str) -> Result<Self, EngineError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).map_err(|e| e.with_context(path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(config = %path, "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(EngineError::Config(format!("{path}: {e}"))),
        }
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| EngineError::Config(e.to_string()))?;
        config.batching.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = SettleConfig::parse("").unwrap();
        assert_eq!(config, SettleConfig::default());
        assert_eq!(config.batching.timeout(), Duration::from_secs(30));
        assert_eq!(config.api_port, 9300);
        assert!(config.analyzer.url.is_none());
    }

    #[test]
    fn parses_all_sections() {
        let config = SettleConfig::parse(
            r#"
            api_port = 8080

            [batching]
            timeout_secs = 12
            shutdown_grace_secs = 1

            [analyzer]
            url = "http://analysis:8000/analyze"
            request_timeout_secs = 3

            [slack]
            archive_base_url = "https://acme.slack.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.api_port, 8080);
        assert_eq!(config.batching.timeout(), Duration::from_secs(12));
        assert_eq!(config.batching.shutdown_grace(), Duration::from_secs(1));
        assert_eq!(config.analyzer.url.as_deref(), Some("http://analysis:8000/analyze"));
        assert_eq!(config.analyzer.request_timeout_secs, 3);
        assert_eq!(config.slack.archive_base_url, "https://acme.slack.com");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = SettleConfig::parse("[batching]\ntimeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, EngineError::Config(ref msg) if msg.contains("timeout_secs")));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = SettleConfig::parse("api_port = \"not a number\"").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = SettleConfig::load_or_default("/nonexistent/settle.toml").unwrap();
        assert_eq!(config, SettleConfig::default());
        assert!(SettleConfig::load("/nonexistent/settle.toml").is_err());
    }
}
