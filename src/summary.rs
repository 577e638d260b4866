//! Summary - the orchestrator's output.

use crate::classifier::Category;
use crate::prompt::Template;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A finished summary and the candidate that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Trimmed model output, Markdown allowed
    pub text: String,
    pub category: Category,
    pub template: Template,
    /// Model that answered
    pub model: String,
    /// API version the answering model was reached on
    pub api_version: String,
}

impl Summary {
    /// First Markdown heading in the text, if any.
    pub fn title(&self) -> Option<&str> {
        self.text
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with('#'))
            .map(|line| line.trim_start_matches('#').trim())
            .filter(|title| !title.is_empty())
    }

    /// Check if the summary has any content
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}
