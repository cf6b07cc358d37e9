// Harness configuration loaded from TOML

use crate::error::{Result, TestingError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use tracing::debug;
use trellis_core::ServerValue;
use trellis_core::logging::LogLevel;

/// Environment variable naming a TOML file to load the configuration from.
pub const CONFIG_ENV: &str = "TRELLIS_TEST_CONFIG";

/// A server variable as written in TOML: text or a number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<ConfigValue> for ServerValue {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::Int(i) => ServerValue::Int(i),
            ConfigValue::Float(f) => ServerValue::Float(f),
            ConfigValue::Text(s) => ServerValue::Text(s),
        }
    }
}

/// Settings for [`crate::TestHarness`].
///
/// ```toml
/// disable_error_handler = true
/// pass_through = ["auth", "csrf"]
/// log_level = "debug"
///
/// [server]
/// HTTPS = "on"
/// SERVER_PORT = 8443
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base server variables for every request
    pub server: BTreeMap<String, ConfigValue>,
    /// Middleware names replaced with pass-through stages
    pub pass_through: Vec<String>,
    /// Replace the error handler so handler errors reach the test
    pub disable_error_handler: bool,
    /// `trace`, `debug`, `info`, `warn` or `error`; no subscriber when unset
    pub log_level: Option<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            server: BTreeMap::new(),
            pass_through: Vec::new(),
            disable_error_handler: true,
            log_level: None,
        }
    }
}

impl HarnessConfig {
    /// Parse TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: HarnessConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            TestingError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded harness configuration");
        Self::from_toml(&content)
    }

    /// Load the file named by `TRELLIS_TEST_CONFIG`, or the defaults when the
    /// variable is unset.
    pub fn from_env() -> Result<Self> {
        match env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }

    /// The configured log level, if any.
    pub fn log_level(&self) -> Result<Option<LogLevel>> {
        match &self.log_level {
            None => Ok(None),
            Some(level) => LogLevel::parse(level)
                .map(Some)
                .ok_or_else(|| TestingError::Config(format!("Unknown log level '{}'", level))),
        }
    }

    /// Server variables converted for the request builder.
    pub fn server_variables(&self) -> impl Iterator<Item = (String, ServerValue)> + '_ {
        self.server
            .iter()
            .map(|(key, value)| (key.clone(), ServerValue::from(value.clone())))
    }

    fn validate(&self) -> Result<()> {
        self.log_level()?;
        if let Some(name) = self.pass_through.iter().find(|name| name.is_empty()) {
            return Err(TestingError::Config(format!(
                "Empty middleware name in pass_through: {:?}",
                name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::from_toml("").unwrap();
        assert!(config.disable_error_handler);
        assert!(config.pass_through.is_empty());
        assert_eq!(config.log_level().unwrap(), None);
    }

    #[test]
    fn test_parse_full() {
        let config = HarnessConfig::from_toml(
            r#"
            disable_error_handler = false
            pass_through = ["auth"]
            log_level = "debug"

            [server]
            HTTPS = "on"
            SERVER_PORT = 8443
            "#,
        )
        .unwrap();

        assert!(!config.disable_error_handler);
        assert_eq!(config.pass_through, vec!["auth".to_string()]);
        assert_eq!(config.log_level().unwrap(), Some(LogLevel::Debug));

        let server: BTreeMap<String, ServerValue> = config.server_variables().collect();
        assert_eq!(server["HTTPS"], ServerValue::from("on"));
        assert_eq!(server["SERVER_PORT"], ServerValue::Int(8443));
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            HarnessConfig::from_toml("log_level = \"loud\""),
            Err(TestingError::Config(_))
        ));
        assert!(matches!(
            HarnessConfig::from_toml("pass_through = 3"),
            Err(TestingError::Config(_))
        ));
        assert!(matches!(
            HarnessConfig::from_toml("pass_through = [\"\"]"),
            Err(TestingError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = HarnessConfig::from_file("/nonexistent/trellis.toml");
        assert!(matches!(result, Err(TestingError::Config(msg)) if msg.contains("trellis.toml")));
    }
}
