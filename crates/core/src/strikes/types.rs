//! Types for the strike ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from ledger persistence.
#[derive(Debug, Error)]
pub enum StrikeError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize strikes: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to parse strikes file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One tracked item.
///
/// A record exists only while `count > 0`; resetting removes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeRecord {
    pub count: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Job that most recently struck this item.
    pub job: String,
    /// Human-readable label, most recent non-empty value wins.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl StrikeRecord {
    pub(crate) fn new(job: &str, name: &str, now: DateTime<Utc>) -> Self {
        Self {
            count: 1,
            first_seen: now,
            last_seen: now,
            job: job.to_string(),
            name: name.to_string(),
        }
    }
}
