//! # Nibiru
//!
//! Summarises learning-hub pages (assignments, lectures, announcements) with an LLM.
//!
//! ## Features
//!
//! - **Category routing**: pages are classified as `ASSIGNMENT` or `GENERAL` (keyword heuristic
//!   or a one-token model call) and summarised with a matching Markdown template
//! - **Model/version fallback**: candidates are tried in order until one answers; auth and quota
//!   failures stop the search immediately
//! - **Provider agnostic**: OpenAI chat completions, Gemini native and Gemini's
//!   OpenAI-compatible surface share one orchestrator
//! - **Lecture notes**: lectures can be broken into slide-by-slide JSON (overview, definitions,
//!   worked examples, practice questions) instead of a Markdown summary
//! - **Local cache**: the last summary, API key and theme live in a sled store

pub mod agent;
pub mod classifier;
pub mod config;
pub mod lecture;
pub mod logging;
pub mod message;
pub mod options;
pub mod prompt;
pub mod provider;
pub mod render;
pub mod scraper;
pub mod storage;
pub mod summary;
pub mod testing;
pub mod transport;

pub use agent::{Agent, AgentError};
pub use classifier::Category;
pub use config::Config;
pub use lecture::{LectureNotes, LectureSummary};
pub use message::{MessageHandler, MessageResponse, TriggerMessage};
pub use options::{ApiType, SummaryOptions};
pub use prompt::Template;
pub use provider::ProviderKind;
pub use crate::scraper::ExtractedContent;
pub use storage::Storage;
pub use summary::Summary;
pub use transport::{ReqwestTransport, Transport};
