//! Configuration loading and management for nibiru.
//!
//! Loads settings from `nibiru.toml` with environment variable overrides for
//! API keys. A missing file is not an error; every field has a default.

use crate::options::{ApiType, SummaryOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CONFIG_FILE: &str = "nibiru.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("missing required API key for provider: {0}")]
    MissingApiKey(String),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// LLM request defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// "gemini", "openai" or "auto"
    pub provider: ApiType,
    /// Pin one model instead of searching the defaults
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub prefer_classifier: bool,
    pub rubric_only: bool,
    pub strict_fields: bool,
    pub legacy_combined: bool,
    /// Custom endpoint (OpenAI-compatible URL or Gemini API root)
    pub endpoint: Option<String>,
    pub list_models: bool,
    pub attempt_timeout_secs: u64,
    pub search_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let defaults = SummaryOptions::new("");
        Self {
            provider: ApiType::Auto,
            model: None,
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
            prefer_classifier: defaults.prefer_classifier,
            rubric_only: defaults.rubric_only,
            strict_fields: defaults.strict_fields,
            legacy_combined: defaults.legacy_combined,
            endpoint: None,
            list_models: defaults.list_models,
            attempt_timeout_secs: defaults.attempt_timeout.as_secs(),
            search_timeout_secs: defaults.search_timeout.as_secs(),
        }
    }
}

/// API keys configuration (environment wins over the file)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub gemini_key: Option<String>,
    #[serde(default)]
    pub openai_key: Option<String>,
}

/// Storage paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the sled database
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let path = dirs::data_local_dir()
            .map(|dir| dir.join("nibiru"))
            .unwrap_or_else(|| PathBuf::from("./data"));
        Self { path }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from the default location (nibiru.toml in cwd or home)
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::find_config_file() {
            Some(path) => Self::parse_file(&path)?,
            None => Config::default(),
        };
        config.apply_env(
            std::env::var("GEMINI_API_KEY").ok(),
            std::env::var("OPENAI_API_KEY").ok(),
        );
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::parse_file(path)?;
        config.apply_env(
            std::env::var("GEMINI_API_KEY").ok(),
            std::env::var("OPENAI_API_KEY").ok(),
        );
        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let local_config = PathBuf::from(CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::home_dir()
            .map(|home| home.join(".config").join("nibiru").join(CONFIG_FILE))
            .filter(|path| path.exists())
    }

    /// Override API keys with environment values. Blank values are ignored.
    pub fn apply_env(&mut self, gemini_key: Option<String>, openai_key: Option<String>) {
        if let Some(key) = gemini_key.filter(|k| !k.trim().is_empty()) {
            self.api.gemini_key = Some(key);
        }
        if let Some(key) = openai_key.filter(|k| !k.trim().is_empty()) {
            self.api.openai_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.agent.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be between 0 and 2, got {}",
                self.agent.temperature
            )));
        }
        if self.agent.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be positive".to_string()));
        }
        if self.agent.attempt_timeout_secs == 0 || self.agent.search_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be positive".to_string()));
        }
        Ok(())
    }

    /// Get the API key for the configured provider
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        let gemini = self.api.gemini_key.as_deref();
        let openai = self.api.openai_key.as_deref();
        match self.agent.provider {
            ApiType::Gemini => gemini.ok_or_else(|| ConfigError::MissingApiKey("gemini".to_string())),
            ApiType::OpenAi => openai.ok_or_else(|| ConfigError::MissingApiKey("openai".to_string())),
            ApiType::Auto => gemini
                .or(openai)
                .ok_or_else(|| ConfigError::MissingApiKey("gemini or openai".to_string())),
        }
    }

    /// Per-call options seeded from the `[agent]` section.
    pub fn summary_options(&self, api_key: impl Into<String>) -> SummaryOptions {
        let agent = &self.agent;
        let mut opts = SummaryOptions::new(api_key)
            .with_api_type(agent.provider)
            .with_rubric_only(agent.rubric_only)
            .with_prefer_classifier(agent.prefer_classifier)
            .with_list_models(agent.list_models)
            .with_timeouts(
                Duration::from_secs(agent.attempt_timeout_secs),
                Duration::from_secs(agent.search_timeout_secs),
            );
        opts.model = agent.model.clone();
        opts.endpoint = agent.endpoint.clone();
        opts.temperature = agent.temperature;
        opts.max_tokens = agent.max_tokens;
        opts.strict_fields = agent.strict_fields;
        opts.legacy_combined = agent.legacy_combined;
        opts.gemini_key_in_env = self.api.gemini_key.is_some();
        opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.agent.provider, ApiType::Auto);
        assert_eq!(config.agent.temperature, 0.3);
        assert_eq!(config.agent.max_tokens, 1200);
        assert_eq!(config.agent.attempt_timeout_secs, 30);
        assert_eq!(config.agent.search_timeout_secs, 120);
        assert!(config.agent.list_models);
        assert!(config.api.gemini_key.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [agent]
            provider = "openai"
            model = "gpt-4o"
            rubric_only = true

            [storage]
            path = "/tmp/nibiru-test"
            "#,
        )
        .unwrap();
        assert_eq!(config.agent.provider, ApiType::OpenAi);
        assert_eq!(config.agent.model.as_deref(), Some("gpt-4o"));
        assert!(config.agent.rubric_only);
        assert_eq!(config.agent.max_tokens, 1200);
        assert_eq!(config.storage.path, PathBuf::from("/tmp/nibiru-test"));
    }

    #[test]
    fn environment_keys_override_file_keys() {
        let mut config: Config = toml::from_str(
            r#"
            [api]
            gemini_key = "from-file"
            openai_key = "sk-file"
            "#,
        )
        .unwrap();
        config.apply_env(Some("from-env".to_string()), Some("  ".to_string()));
        assert_eq!(config.api.gemini_key.as_deref(), Some("from-env"));
        assert_eq!(config.api.openai_key.as_deref(), Some("sk-file"));
    }

    #[test]
    fn api_key_follows_provider() {
        let mut config = Config::default();
        assert!(matches!(config.api_key(), Err(ConfigError::MissingApiKey(_))));

        config.api.openai_key = Some("sk-test".to_string());
        assert_eq!(config.api_key().unwrap(), "sk-test");

        config.api.gemini_key = Some("AIza".to_string());
        assert_eq!(config.api_key().unwrap(), "AIza");

        config.agent.provider = ApiType::OpenAi;
        assert_eq!(config.api_key().unwrap(), "sk-test");
    }

    #[test]
    fn summary_options_carry_agent_section() {
        let mut config = Config::default();
        config.agent.model = Some("gemini-2.5-flash".to_string());
        config.agent.strict_fields = true;
        config.agent.attempt_timeout_secs = 5;
        config.api.gemini_key = Some("AIza".to_string());

        let opts = config.summary_options("key");
        assert_eq!(opts.api_key, "key");
        assert_eq!(opts.model.as_deref(), Some("gemini-2.5-flash"));
        assert!(opts.strict_fields);
        assert!(opts.gemini_key_in_env);
        assert_eq!(opts.attempt_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = Config::default();
        config.agent.temperature = 3.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.agent.max_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent]\ntemperature = 0.7").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.agent.temperature, 0.7);
    }

    #[test]
    fn load_from_reports_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent\ntemperature = ").unwrap();
        assert!(matches!(
            Config::load_from(file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }
}
