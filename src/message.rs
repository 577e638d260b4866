//! Trigger message contract and its handler.
//!
//! A caller sends `{"action": "summarize", ...}` and gets back
//! `{"success": true, "summary": ...}` or `{"success": false, "error": ...}`.
//! When the message carries no text, the handler pulls it from a
//! [`ContentSource`].

use crate::agent::Agent;
use crate::options::SummaryOptions;
use crate::scraper::{fetch_content, ExtractedContent, ScraperError};
use crate::storage::{Storage, StoredSummary};
use crate::transport::Transport;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const API_KEY_NOT_SET: &str =
    "API key not set. Please configure your Gemini API key in the extension settings.";
pub const NO_CONTENT: &str = "No content found on the page";

/// Fields of a `summarize` request; all optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum TriggerMessage {
    Summarize(SummarizeRequest),
}

impl TriggerMessage {
    /// Summarise text already in hand.
    pub fn with_text(text: impl Into<String>, context: impl Into<String>) -> Self {
        TriggerMessage::Summarize(SummarizeRequest {
            text: Some(text.into()),
            context: Some(context.into()),
            ..Default::default()
        })
    }

    /// Summarise whatever the handler's content source yields.
    pub fn from_source() -> Self {
        TriggerMessage::Summarize(SummarizeRequest::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MessageResponse {
    pub fn ok(summary: impl Into<String>) -> Self {
        Self {
            success: true,
            summary: Some(summary.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: None,
            error: Some(error.into()),
        }
    }
}

/// Where page content comes from when a message carries no text.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn extract(&self) -> Result<ExtractedContent, ScraperError>;
}

/// Fetches and extracts a URL on demand.
pub struct UrlSource {
    pub url: String,
}

impl UrlSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl ContentSource for UrlSource {
    async fn extract(&self) -> Result<ExtractedContent, ScraperError> {
        fetch_content(&self.url).await
    }
}

/// Content captured ahead of time.
#[async_trait]
impl ContentSource for ExtractedContent {
    async fn extract(&self) -> Result<ExtractedContent, ScraperError> {
        Ok(self.clone())
    }
}

/// Runs trigger messages against an agent, caching each summary.
pub struct MessageHandler<T: Transport> {
    agent: Agent<T>,
    storage: Storage,
    source: Option<Box<dyn ContentSource>>,
    defaults: SummaryOptions,
}

impl<T: Transport> MessageHandler<T> {
    /// `defaults.api_key` may be empty; the stored key is used then.
    pub fn new(agent: Agent<T>, storage: Storage, defaults: SummaryOptions) -> Self {
        Self {
            agent,
            storage,
            source: None,
            defaults,
        }
    }

    pub fn with_source(mut self, source: impl ContentSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn agent(&self) -> &Agent<T> {
        &self.agent
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub async fn handle(&self, message: TriggerMessage, cancel: CancellationToken) -> MessageResponse {
        match message {
            TriggerMessage::Summarize(request) => self.summarize(request, cancel).await,
        }
    }

    async fn summarize(&self, request: SummarizeRequest, cancel: CancellationToken) -> MessageResponse {
        let Some(api_key) = self.resolve_key() else {
            return MessageResponse::failure(API_KEY_NOT_SET);
        };

        let mut context = request.context.unwrap_or_default();
        let mut origin = None;
        let text = match request.text.filter(|t| !t.is_empty()) {
            Some(text) => text,
            None => match &self.source {
                Some(source) => match source.extract().await {
                    Ok(content) => {
                        let text = if content.text.is_empty() {
                            content.html
                        } else {
                            content.text
                        };
                        context = if content.context.is_empty() {
                            content.title
                        } else {
                            content.context
                        };
                        origin = Some(content.url).filter(|url| !url.is_empty());
                        text
                    }
                    Err(e) => {
                        return MessageResponse::failure(format!(
                            "Failed to extract content: {}. Make sure you are on a page with viewable content.",
                            e
                        ))
                    }
                },
                None => String::new(),
            },
        };

        if text.trim().is_empty() {
            return MessageResponse::failure(NO_CONTENT);
        }

        let mut opts = self.defaults.clone();
        opts.api_key = api_key;
        if let Some(model) = request.model.filter(|m| !m.trim().is_empty()) {
            opts.model = Some(model);
        }
        if let Some(temperature) = request.temperature {
            opts.temperature = temperature;
        }
        if let Some(max_tokens) = request.max_tokens {
            opts.max_tokens = max_tokens;
        }

        match self
            .agent
            .summarize_with_cancel(&text, &context, &opts, cancel)
            .await
        {
            Ok(summary) => {
                info!(model = %summary.model, category = %summary.category, "summary ready");
                let stored = StoredSummary::new(summary.text.clone(), origin, Some(summary.category));
                if let Err(e) = self.storage.set_last_summary(&stored) {
                    warn!(error = %e, "could not cache summary");
                }
                MessageResponse::ok(summary.text)
            }
            Err(e) => MessageResponse::failure(e.to_string()),
        }
    }

    fn resolve_key(&self) -> Option<String> {
        if !self.defaults.api_key.trim().is_empty() {
            return Some(self.defaults.api_key.clone());
        }
        match self.storage.api_key() {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "could not read stored API key");
                None
            }
        }
    }
}
