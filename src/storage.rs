//! Sled-based storage for the API key, the last summary and the UI theme.
//!
//! Only one summary is kept; every successful run overwrites it.

use crate::classifier::Category;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const API_KEY: &str = "apiKey";
const SUMMARY: &str = "summary";
const THEME: &str = "theme";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    DbError(#[from] sled::Error),
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("stored value for '{0}' is not valid UTF-8")]
    Corrupt(&'static str),
}

/// The cached last summary with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSummary {
    pub summary: String,
    /// Where the text came from, when known
    pub source: Option<String>,
    pub category: Option<Category>,
    pub created_at: DateTime<Utc>,
}

impl StoredSummary {
    pub fn new(summary: impl Into<String>, source: Option<String>, category: Option<Category>) -> Self {
        Self {
            summary: summary.into(),
            source,
            category,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{}' (expected light or dark)", other)),
        }
    }
}

/// Sled-backed key-value store.
pub struct Storage {
    db: sled::Db,
}

impl Storage {
    /// Open or create storage at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Stored API key, if one is set and non-empty.
    pub fn api_key(&self) -> Result<Option<String>, StorageError> {
        Ok(self.get_string(API_KEY)?.filter(|key| !key.trim().is_empty()))
    }

    pub fn set_api_key(&self, key: &str) -> Result<(), StorageError> {
        self.db.insert(API_KEY, key.trim().as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    /// Remove the stored key. Returns whether one existed.
    pub fn clear_api_key(&self) -> Result<bool, StorageError> {
        let existed = self.db.remove(API_KEY)?.is_some();
        self.db.flush()?;
        Ok(existed)
    }

    pub fn last_summary(&self) -> Result<Option<StoredSummary>, StorageError> {
        match self.db.get(SUMMARY)? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Overwrite the cached summary.
    pub fn set_last_summary(&self, summary: &StoredSummary) -> Result<(), StorageError> {
        let value = serde_json::to_vec(summary)?;
        self.db.insert(SUMMARY, value)?;
        self.db.flush()?;
        Ok(())
    }

    /// Stored theme; unknown or missing values read as the default.
    pub fn theme(&self) -> Result<Theme, StorageError> {
        Ok(self
            .get_string(THEME)?
            .and_then(|value| value.parse().ok())
            .unwrap_or_default())
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), StorageError> {
        self.db.insert(THEME, theme.to_string().as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    fn get_string(&self, key: &'static str) -> Result<Option<String>, StorageError> {
        match self.db.get(key)? {
            Some(data) => String::from_utf8(data.to_vec())
                .map(Some)
                .map_err(|_| StorageError::Corrupt(key)),
            None => Ok(None),
        }
    }
}
