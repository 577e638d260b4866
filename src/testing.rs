//! Testing utilities.
//!
//! [`ScriptedTransport`] replays canned vendor responses in order and records
//! every request, so callers can assert on call counts and URLs without
//! touching the network.

use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Step {
    Respond(HttpResponse),
    Fail(String),
    Stall,
}

/// A transport that answers from a script.
///
/// An unscripted call fails with [`TransportError::Unreachable`].
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with the given status and body.
    pub fn with_response(self, status: u16, body: impl Into<String>) -> Self {
        self.push(Step::Respond(HttpResponse::new(status, body)));
        self
    }

    /// Queue the same response `times` times.
    pub fn with_repeated(self, times: usize, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        for _ in 0..times {
            self.push(Step::Respond(HttpResponse::new(status, body.clone())));
        }
        self
    }

    /// Queue a network failure.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.push(Step::Fail(message.into()));
        self
    }

    /// Queue a call that never answers.
    pub fn with_stall(self) -> Self {
        self.push(Step::Stall);
        self
    }

    /// Number of requests sent so far.
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// URLs of every request sent so far.
    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    /// Steps that were scripted but never consumed.
    pub fn remaining(&self) -> usize {
        self.steps.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn push(&self, step: Step) {
        self.steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(step);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let step = self
            .steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match step {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::Fail(message)) => Err(TransportError::Unreachable(message)),
            Some(Step::Stall) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TransportError::Unreachable("stalled".to_string()))
            }
            None => Err(TransportError::Unreachable(format!(
                "no scripted response for {}",
                request.redacted_url()
            ))),
        }
    }
}

/// OpenAI-style chat completion body carrying `text`.
pub fn openai_text(text: &str) -> String {
    json!({
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": text } }]
    })
    .to_string()
}

/// Gemini `generateContent` body carrying `text`.
pub fn gemini_text(text: &str) -> String {
    json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
    })
    .to_string()
}

/// Vendor error body with `error.message` set.
pub fn error_body(message: &str) -> String {
    json!({ "error": { "message": message } }).to_string()
}

/// Gemini model listing body.
pub fn model_list(models: &[(&str, &[&str])]) -> String {
    let models: Vec<_> = models
        .iter()
        .map(|(name, methods)| json!({ "name": name, "supportedGenerationMethods": methods }))
        .collect();
    json!({ "models": models }).to_string()
}
