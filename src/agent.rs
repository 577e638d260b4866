//! Summarisation orchestrator.
//!
//! Resolves the page category, renders the prompt, then walks the
//! (API version, model) candidates in order until one answers. Every attempt
//! ends in exactly one [`Outcome`]; the dispatch from HTTP status to outcome is
//! in [`dispatch`].

use crate::classifier;
use crate::lecture::{self, LectureError, LectureNotes};
use crate::options::SummaryOptions;
use crate::prompt::{self, FieldPolicy, Template};
use crate::provider::{self, Attempt, Completion, ProviderKind, ResponseError};
use crate::summary::Summary;
use crate::transport::{HttpResponse, Transport};
use lazy_static::lazy_static;
use regex::Regex;
use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Retry-after reported when the vendor gives no hint.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

const BILLING_URL: &str = "https://console.cloud.google.com/billing";
const USAGE_URL: &str = "https://ai.dev/usage?tab=rate-limit";
const ENABLE_API_URL: &str =
    "https://console.cloud.google.com/apis/library/generativelanguage.googleapis.com";
const AI_STUDIO_KEYS_URL: &str = "https://aistudio.google.com/app/apikey";

lazy_static! {
    static ref RETRY_IN: Regex = Regex::new(r"(?i)retry in ([\d.]+)s").unwrap();
    static ref SECONDS: Regex = Regex::new(r"(?i)(\d+\.?\d*)\s*seconds?").unwrap();
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{vendor} API authentication error ({status}): {message}. Please check your API key and ensure the API is enabled for your project.{}", auth_help(.status))]
    Auth {
        vendor: &'static str,
        status: u16,
        message: String,
    },

    #[error("{vendor} API quota exceeded: {message}{}", quota_help(.message, .retry_after_secs))]
    QuotaExceeded {
        vendor: &'static str,
        message: String,
        retry_after_secs: u64,
    },

    #[error("{vendor} API rate limit: {message}\n\nPlease retry in {retry_after_secs} seconds.")]
    RateLimited {
        vendor: &'static str,
        message: String,
        retry_after_secs: u64,
    },

    #[error("model {model} is not available on {api_version}: {message}")]
    ModelUnavailable {
        model: String,
        api_version: String,
        message: String,
    },

    #[error("API error {status} from {model}: {message}")]
    Api {
        model: String,
        status: u16,
        message: String,
    },

    #[error("request to {model} failed: {message}")]
    Transport { model: String, message: String },

    #[error("{vendor} API error: could not find an available model. Tried: {}. Error: {last_error}{}", .tried.join(", "), exhausted_help(.not_found))]
    AllModelsExhausted {
        vendor: &'static str,
        tried: Vec<String>,
        last_error: String,
        not_found: bool,
    },

    #[error("{vendor} API returned an empty response from {model} ({detail}). Check API key and model availability.")]
    EmptyResponse {
        vendor: &'static str,
        model: String,
        detail: String,
    },

    #[error("{0}")]
    MalformedLecture(#[from] LectureError),

    #[error("summarisation cancelled")]
    Cancelled,

    #[error("no summary within {0} seconds")]
    DeadlineExceeded(u64),
}

impl AgentError {
    /// Fatal errors end the candidate search; the rest advance it.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AgentError::ModelUnavailable { .. } | AgentError::Api { .. } | AgentError::Transport { .. }
        )
    }

    /// Seconds to wait before retrying, for quota and rate-limit failures.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AgentError::QuotaExceeded {
                retry_after_secs, ..
            }
            | AgentError::RateLimited {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Any other non-2xx status gives up on the current API version.
    fn skips_version(&self) -> bool {
        matches!(self, AgentError::Api { .. })
    }
}

fn auth_help(status: &u16) -> String {
    if *status == 403 {
        "\n\nPermission error: your API key may not have access to this API.\n\
         Please check:\n\
         1. The API key is from the correct project\n\
         2. The Generative Language API is enabled\n\
         3. The API key has the correct permissions"
            .to_string()
    } else {
        String::new()
    }
}

fn quota_help(message: &str, retry_after: &u64) -> String {
    if message.contains("limit: 0") {
        format!(
            "\n\nIMPORTANT: Your quota limit is 0, which usually means billing is not enabled.\n\n\
             Even though the free tier is free, Google requires billing to be enabled:\n\
             1. Go to: {}\n\
             2. Link a billing account to your project\n\
             3. You won't be charged for free tier usage\n\
             4. This will increase your quota limits\n\n\
             Or wait {} seconds for the quota to reset.",
            BILLING_URL, retry_after
        )
    } else {
        format!(
            "\n\nOptions:\n\
             1. Wait {} seconds and try again (quota resets)\n\
             2. Enable billing in Google Cloud Console for higher limits\n\
             3. Check your usage: {}",
            retry_after, USAGE_URL
        )
    }
}

fn exhausted_help(not_found: &bool) -> String {
    if *not_found {
        format!(
            "\n\nIMPORTANT: The Gemini API may not be enabled for your project!\n\n\
             Please follow these steps:\n\
             1. Go to Google Cloud Console: https://console.cloud.google.com/\n\
             2. Select your project\n\
             3. Enable the Generative Language API: {}\n\
             4. Wait a few minutes for the API to activate\n\
             5. Verify your API key has access to the enabled API\n\
             6. Try again\n\n\
             If you're using Google AI Studio, make sure the key comes from {}",
            ENABLE_API_URL, AI_STUDIO_KEYS_URL
        )
    } else {
        String::new()
    }
}

/// Seconds from a vendor message such as "Please retry in 12.5s" or
/// "retry after 30 seconds", rounded up. Defaults to 60.
pub fn parse_retry_after(message: &str) -> u64 {
    RETRY_IN
        .captures(message)
        .or_else(|| SECONDS.captures(message))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| secs.ceil() as u64)
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

/// 429 bodies mentioning a quota are account-wide; anything else is a rate limit.
fn too_many_requests(vendor: &'static str, message: String) -> AgentError {
    let retry_after_secs = parse_retry_after(&message);
    let lower = message.to_lowercase();
    if lower.contains("quota") || lower.contains("limit: 0") {
        AgentError::QuotaExceeded {
            vendor,
            message,
            retry_after_secs,
        }
    } else {
        AgentError::RateLimited {
            vendor,
            message,
            retry_after_secs,
        }
    }
}

/// Result of a single attempt.
#[derive(Debug)]
pub enum Outcome {
    Success(String),
    Retryable(AgentError),
    Fatal(AgentError),
}

/// Map one vendor response to an outcome.
pub fn dispatch(kind: ProviderKind, attempt: &Attempt, response: &HttpResponse) -> Outcome {
    let vendor = kind.vendor();

    if response.is_success() {
        return match provider::parse_response(kind, &response.body) {
            Ok(text) => Outcome::Success(text),
            Err(e) => Outcome::Fatal(AgentError::EmptyResponse {
                vendor,
                model: attempt.model.clone(),
                detail: match e {
                    ResponseError::Empty => "no text".to_string(),
                    other => other.to_string(),
                },
            }),
        };
    }

    let message = provider::error_message(&response.body);
    match response.status {
        401 | 403 => Outcome::Fatal(AgentError::Auth {
            vendor,
            status: response.status,
            message,
        }),
        429 => Outcome::Fatal(too_many_requests(vendor, message)),
        404 => Outcome::Retryable(AgentError::ModelUnavailable {
            model: attempt.model.clone(),
            api_version: attempt.api_version.clone(),
            message,
        }),
        status => Outcome::Retryable(AgentError::Api {
            model: attempt.model.clone(),
            status,
            message,
        }),
    }
}

/// Ordered candidate space: every model is tried under each version in turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSpace {
    pub versions: Vec<String>,
    pub models: Vec<String>,
}

impl SearchSpace {
    /// Summary search: the explicit model alone, or the provider defaults.
    pub fn for_request(kind: ProviderKind, opts: &SummaryOptions) -> Self {
        Self {
            versions: kind.default_versions(),
            models: match &opts.model {
                Some(model) => vec![model.clone()],
                None => kind.default_models(),
            },
        }
    }

    /// Classifier search: a shorter list when no model is pinned.
    pub fn for_classifier(kind: ProviderKind, opts: &SummaryOptions) -> Self {
        Self {
            versions: kind.default_versions(),
            models: match &opts.model {
                Some(model) => vec![model.clone()],
                None => kind.classifier_models(),
            },
        }
    }

    /// Replace the candidates with a live listing from `api_version`.
    pub fn narrow(&mut self, api_version: String, models: Vec<String>) {
        if models.is_empty() {
            return;
        }
        self.versions = vec![api_version];
        self.models = models;
    }
}

/// A successful attempt.
#[derive(Debug, Clone)]
pub struct Hit {
    pub attempt: Attempt,
    pub text: String,
}

async fn attempt_once<T: Transport + ?Sized>(
    transport: &T,
    kind: ProviderKind,
    attempt: &Attempt,
    completion: &Completion<'_>,
    opts: &SummaryOptions,
) -> Outcome {
    let request = provider::build_request(kind, attempt, completion, opts);
    debug!(
        model = %attempt.model,
        api_version = %attempt.api_version,
        url = %request.redacted_url(),
        "trying candidate"
    );

    match tokio::time::timeout(opts.attempt_timeout, transport.send(&request)).await {
        Ok(Ok(response)) => dispatch(kind, attempt, &response),
        Ok(Err(e)) => Outcome::Retryable(AgentError::Transport {
            model: attempt.model.clone(),
            message: e.to_string(),
        }),
        Err(_) => Outcome::Retryable(AgentError::Transport {
            model: attempt.model.clone(),
            message: format!("no response within {}s", opts.attempt_timeout.as_secs_f32()),
        }),
    }
}

/// Walk the search space until an attempt succeeds or fails fatally.
pub async fn search<T: Transport + ?Sized>(
    transport: &T,
    kind: ProviderKind,
    space: &SearchSpace,
    completion: &Completion<'_>,
    opts: &SummaryOptions,
) -> Result<Hit, AgentError> {
    let mut tried: Vec<String> = Vec::new();
    let mut last_error: Option<AgentError> = None;

    for version in &space.versions {
        for model in &space.models {
            let attempt = Attempt::new(version.as_str(), model.as_str());
            if !tried.contains(model) {
                tried.push(model.clone());
            }

            match attempt_once(transport, kind, &attempt, completion, opts).await {
                Outcome::Success(text) => {
                    info!(model = %attempt.model, api_version = %attempt.api_version, "candidate answered");
                    return Ok(Hit { attempt, text });
                }
                Outcome::Fatal(e) => return Err(e),
                Outcome::Retryable(e) => {
                    warn!(error = %e, "candidate failed");
                    let skip_version = e.skips_version();
                    last_error = Some(e);
                    if skip_version {
                        break;
                    }
                }
            }
        }
    }

    let not_found = matches!(last_error, Some(AgentError::ModelUnavailable { .. }));
    Err(AgentError::AllModelsExhausted {
        vendor: kind.vendor(),
        tried,
        last_error: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no candidates to try".to_string()),
        not_found,
    })
}

/// First API version whose listing yields generation-capable models.
pub async fn list_models<T: Transport + ?Sized>(
    transport: &T,
    kind: ProviderKind,
    versions: &[String],
    opts: &SummaryOptions,
) -> Option<(String, Vec<String>)> {
    for version in versions {
        let request = provider::list_models_request(kind, version, opts)?;
        let response =
            match tokio::time::timeout(opts.attempt_timeout, transport.send(&request)).await {
                Ok(Ok(response)) if response.is_success() => response,
                Ok(Ok(response)) => {
                    debug!(status = response.status, %version, "model listing refused");
                    continue;
                }
                Ok(Err(e)) => {
                    debug!(error = %e, %version, "model listing failed");
                    continue;
                }
                Err(_) => {
                    debug!(%version, "model listing timed out");
                    continue;
                }
            };

        match provider::parse_model_list(&response.body) {
            Ok(models) if !models.is_empty() => {
                debug!(count = models.len(), %version, "available models listed");
                return Some((version.clone(), models));
            }
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, %version, "unreadable model listing");
                continue;
            }
        }
    }
    None
}

/// Run `work` under the search deadline, abandoning it when `cancel` fires.
async fn guarded<R>(
    work: impl Future<Output = Result<R, AgentError>>,
    opts: &SummaryOptions,
    cancel: CancellationToken,
) -> Result<R, AgentError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AgentError::Cancelled),
        result = tokio::time::timeout(opts.search_timeout, work) => {
            result.unwrap_or_else(|_| Err(AgentError::DeadlineExceeded(opts.search_timeout.as_secs())))
        }
    }
}

/// The summarisation orchestrator.
pub struct Agent<T: Transport> {
    transport: T,
}

impl<T: Transport> Agent<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Summarise `text` with the template chosen for its category.
    pub async fn summarize(
        &self,
        text: &str,
        context: &str,
        opts: &SummaryOptions,
    ) -> Result<Summary, AgentError> {
        self.summarize_with_cancel(text, context, opts, CancellationToken::new())
            .await
    }

    /// [`Agent::summarize`], abandoned as soon as `cancel` fires.
    pub async fn summarize_with_cancel(
        &self,
        text: &str,
        context: &str,
        opts: &SummaryOptions,
        cancel: CancellationToken,
    ) -> Result<Summary, AgentError> {
        validate(text, opts)?;
        guarded(self.run(text, context, opts), opts, cancel).await
    }

    /// Slide-by-slide lecture notes as structured JSON.
    pub async fn summarize_lecture(
        &self,
        text: &str,
        context: &str,
        opts: &SummaryOptions,
    ) -> Result<LectureNotes, AgentError> {
        self.summarize_lecture_with_cancel(text, context, opts, CancellationToken::new())
            .await
    }

    pub async fn summarize_lecture_with_cancel(
        &self,
        text: &str,
        context: &str,
        opts: &SummaryOptions,
        cancel: CancellationToken,
    ) -> Result<LectureNotes, AgentError> {
        validate(text, opts)?;
        guarded(self.run_lecture(text, context, opts), opts, cancel).await
    }

    async fn run(
        &self,
        text: &str,
        context: &str,
        opts: &SummaryOptions,
    ) -> Result<Summary, AgentError> {
        let kind = detect(opts);

        // Category first; the classifier may spend its own calls
        let category = classifier::classify(&self.transport, kind, context, text, opts).await;
        let template = Template::select(category, opts.rubric_only, opts.legacy_combined);
        debug!(provider = %kind, %category, %template, "prompt selected");

        let prompt = prompt::render(
            template,
            FieldPolicy::from_strict(opts.strict_fields),
            category,
            text,
            context,
        );

        let space = self.candidates(kind, opts).await;
        let completion = Completion {
            system: prompt::SUMMARY_SYSTEM,
            prompt: &prompt,
            temperature: opts.temperature,
            max_tokens: opts.max_tokens,
        };
        let hit = search(&self.transport, kind, &space, &completion, opts).await?;

        Ok(Summary {
            text: hit.text,
            category,
            template,
            model: hit.attempt.model,
            api_version: hit.attempt.api_version,
        })
    }

    async fn run_lecture(
        &self,
        text: &str,
        context: &str,
        opts: &SummaryOptions,
    ) -> Result<LectureNotes, AgentError> {
        let kind = detect(opts);
        let prompt = lecture::lecture_prompt(text, context);

        let space = self.candidates(kind, opts).await;
        let completion = Completion {
            system: lecture::LECTURE_SYSTEM,
            prompt: &prompt,
            temperature: opts.temperature,
            max_tokens: opts.max_tokens.max(lecture::LECTURE_MAX_TOKENS),
        };
        let hit = search(&self.transport, kind, &space, &completion, opts).await?;

        // A reply that is not the expected JSON is not retried on another model
        let summary = lecture::parse_lecture(&hit.text)?;
        info!(slides = summary.slides.len(), model = %hit.attempt.model, "lecture notes ready");

        Ok(LectureNotes {
            summary,
            model: hit.attempt.model,
            api_version: hit.attempt.api_version,
        })
    }

    /// Static candidates, narrowed by a live listing when enabled.
    async fn candidates(&self, kind: ProviderKind, opts: &SummaryOptions) -> SearchSpace {
        let mut space = SearchSpace::for_request(kind, opts);
        if opts.list_models && opts.model.is_none() {
            if let Some((version, models)) =
                list_models(&self.transport, kind, &space.versions, opts).await
            {
                space.narrow(version, models);
            }
        }
        space
    }
}

fn detect(opts: &SummaryOptions) -> ProviderKind {
    provider::detect(
        opts.api_type,
        opts.endpoint.as_deref(),
        &opts.api_key,
        opts.gemini_key_in_env,
    )
}

fn validate(text: &str, opts: &SummaryOptions) -> Result<(), AgentError> {
    if opts.api_key.trim().is_empty() {
        return Err(AgentError::InvalidInput(
            "Missing API key. Set one with `nibiru key set` or GEMINI_API_KEY / OPENAI_API_KEY."
                .to_string(),
        ));
    }
    if text.trim().is_empty() {
        return Err(AgentError::InvalidInput("Empty source text".to_string()));
    }
    Ok(())
}
