//! HTTP transport seam.
//!
//! The orchestrator only sees [`Transport`]; production uses reqwest, tests use
//! [`crate::testing::ScriptedTransport`].

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// User-Agent string sent with every request
const USER_AGENT: &str = concat!("nibiru/", env!("CARGO_PKG_VERSION"), " (https://github.com/cladam/nibiru)");

/// Transport-level ceiling; the orchestrator applies its own, usually shorter, deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

lazy_static! {
    static ref KEY_PARAM: Regex = Regex::new(r"([?&]key=)[^&]*").unwrap();
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("connection failed: {0}")]
    Unreachable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    /// URL with any `key=` query value masked, safe for logs.
    pub fn redacted_url(&self) -> String {
        KEY_PARAM.replace_all(&self.url, "${1}***").into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request. Non-2xx statuses are responses, not errors.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_query_keys() {
        let request = HttpRequest {
            method: Method::Get,
            url: "https://example.com/v1/models?key=secret&pageSize=5".to_string(),
            headers: Vec::new(),
            body: None,
        };
        assert_eq!(
            request.redacted_url(),
            "https://example.com/v1/models?key=***&pageSize=5"
        );
    }

    #[test]
    fn success_range() {
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(404, "").is_success());
    }
}
