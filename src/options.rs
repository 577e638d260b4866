//! Per-call summarisation options.

use crate::classifier::Category;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 1200;
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Which vendor calling convention to use. `Auto` defers to provider detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
    #[default]
    Auto,
}

impl fmt::Display for ApiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiType::OpenAi => write!(f, "openai"),
            ApiType::Gemini => write!(f, "gemini"),
            ApiType::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for ApiType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ApiType::OpenAi),
            "gemini" => Ok(ApiType::Gemini),
            "auto" | "" => Ok(ApiType::Auto),
            other => Err(format!("unknown api type '{}' (expected openai, gemini or auto)", other)),
        }
    }
}

/// Options recognised by [`crate::Agent::summarize`].
///
/// Built once per request by the caller; the orchestrator never reads the
/// environment or storage itself.
#[derive(Debug, Clone)]
pub struct SummaryOptions {
    /// Vendor API key. Required.
    pub api_key: String,
    /// Explicit model. `None` searches the provider's default candidate list.
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the model to classify the page instead of using the keyword heuristic.
    pub prefer_classifier: bool,
    /// Skip classification entirely.
    pub force_category: Option<Category>,
    /// Extract grading criteria only, whatever the category.
    pub rubric_only: bool,
    pub api_type: ApiType,
    /// Custom endpoint. Full chat-completions URL for OpenAI-style providers,
    /// API root for Gemini native.
    pub endpoint: Option<String>,
    /// Omit unknown fields instead of writing "Not specified".
    pub strict_fields: bool,
    /// Use the single-pass template where the model picks the page type.
    pub legacy_combined: bool,
    /// Narrow the candidate list with a "list models" call when supported.
    pub list_models: bool,
    /// A Gemini key is configured in the environment; feeds provider detection.
    pub gemini_key_in_env: bool,
    pub attempt_timeout: Duration,
    pub search_timeout: Duration,
}

impl SummaryOptions {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            prefer_classifier: false,
            force_category: None,
            rubric_only: false,
            api_type: ApiType::Auto,
            endpoint: None,
            strict_fields: false,
            legacy_combined: false,
            list_models: true,
            gemini_key_in_env: false,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_api_type(mut self, api_type: ApiType) -> Self {
        self.api_type = api_type;
        self
    }

    pub fn with_force_category(mut self, category: Category) -> Self {
        self.force_category = Some(category);
        self
    }

    pub fn with_rubric_only(mut self, rubric_only: bool) -> Self {
        self.rubric_only = rubric_only;
        self
    }

    pub fn with_prefer_classifier(mut self, prefer: bool) -> Self {
        self.prefer_classifier = prefer;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_list_models(mut self, list_models: bool) -> Self {
        self.list_models = list_models;
        self
    }

    pub fn with_timeouts(mut self, attempt: Duration, search: Duration) -> Self {
        self.attempt_timeout = attempt;
        self.search_timeout = search;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts = SummaryOptions::new("key");
        assert_eq!(opts.temperature, 0.3);
        assert_eq!(opts.max_tokens, 1200);
        assert!(!opts.prefer_classifier);
        assert!(!opts.rubric_only);
        assert_eq!(opts.api_type, ApiType::Auto);
        assert!(opts.model.is_none());
        assert!(opts.force_category.is_none());
    }

    #[test]
    fn api_type_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<ApiType>().unwrap(), ApiType::OpenAi);
        assert_eq!("gemini".parse::<ApiType>().unwrap(), ApiType::Gemini);
        assert_eq!("auto".parse::<ApiType>().unwrap(), ApiType::Auto);
        assert!("claude".parse::<ApiType>().is_err());
    }

    #[test]
    fn api_type_round_trips_through_toml_names() {
        let json = serde_json::to_string(&ApiType::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
    }
}
