//! Page category classification.
//!
//! A page is either an `ASSIGNMENT` (tasks, due dates, submission steps) or
//! `GENERAL` (lectures, announcements, everything else). The keyword heuristic
//! runs offline; the model-backed classifier is opt-in and always falls back to
//! the heuristic on failure.

use crate::agent::{self, SearchSpace};
use crate::options::SummaryOptions;
use crate::prompt;
use crate::provider::{Completion, ProviderKind};
use crate::transport::Transport;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Distinct keywords that signal an assignment page. Presence counts, not frequency.
pub const ASSIGNMENT_SIGNALS: [&str; 14] = [
    "assignment",
    "assignments",
    "due",
    "deadline",
    "submit",
    "submission",
    "deliverable",
    "rubric",
    "marks",
    "grading",
    "evaluation",
    "late penalty",
    "points",
    "weight",
];

/// Minimum number of distinct signals for an `ASSIGNMENT` verdict.
pub const SIGNAL_THRESHOLD: usize = 2;

/// The model classifier only sees the start of the page.
pub const CLASSIFIER_SNIPPET_CHARS: usize = 2000;

pub const CLASSIFIER_TEMPERATURE: f32 = 0.0;
pub const CLASSIFIER_MAX_TOKENS: u32 = 4;

lazy_static! {
    static ref NUMBERED_ASSIGNMENT: Regex = Regex::new(r"(?i)assignment\s*\d+").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Assignment,
    General,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Assignment => write!(f, "ASSIGNMENT"),
            Category::General => write!(f, "GENERAL"),
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASSIGNMENT" => Ok(Category::Assignment),
            "GENERAL" => Ok(Category::General),
            other => Err(format!("unknown category '{}' (expected ASSIGNMENT or GENERAL)", other)),
        }
    }
}

/// Number of distinct assignment signals found in `context` + `body`.
pub fn signal_score(context: &str, body: &str) -> usize {
    let blob = format!("{} {}", context, body).to_lowercase();
    ASSIGNMENT_SIGNALS
        .iter()
        .filter(|signal| blob.contains(*signal))
        .count()
}

/// Offline keyword classifier.
///
/// A single generic word such as "points" is not enough; two distinct signals
/// or an "Assignment 2"-style reference are.
pub fn heuristic_category(context: &str, body: &str) -> Category {
    let score = signal_score(context, body);
    if score >= SIGNAL_THRESHOLD || NUMBERED_ASSIGNMENT.is_match(&format!("{} {}", context, body)) {
        Category::Assignment
    } else {
        Category::General
    }
}

/// Interpret a classifier reply. Anything but a literal `ASSIGNMENT` is `GENERAL`.
pub fn parse_label(reply: &str) -> Category {
    let first_line = reply.lines().next().unwrap_or("").trim().to_uppercase();
    if first_line == "ASSIGNMENT" {
        Category::Assignment
    } else {
        Category::General
    }
}

/// Resolve the category for a request.
///
/// `force_category` always wins. Classifier errors are never surfaced.
pub async fn classify<T: Transport + ?Sized>(
    transport: &T,
    provider: ProviderKind,
    context: &str,
    body: &str,
    opts: &SummaryOptions,
) -> Category {
    if let Some(category) = opts.force_category {
        return category;
    }

    if !opts.prefer_classifier {
        return heuristic_category(context, body);
    }

    let prompt = prompt::classifier_prompt(context, body);
    let completion = Completion {
        system: prompt::CLASSIFIER_SYSTEM,
        prompt: &prompt,
        temperature: CLASSIFIER_TEMPERATURE,
        max_tokens: CLASSIFIER_MAX_TOKENS,
    };
    let space = SearchSpace::for_classifier(provider, opts);

    match agent::search(transport, provider, &space, &completion, opts).await {
        Ok(hit) => {
            let category = parse_label(&hit.text);
            debug!(model = %hit.attempt.model, %category, "model classifier answered");
            category
        }
        Err(e) => {
            warn!(error = %e, "AI classification failed, using heuristic classification");
            heuristic_category(context, body)
        }
    }
}
