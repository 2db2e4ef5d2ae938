//! Types for download-client operations.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http_core::HttpError;

/// Errors that can occur during download-client operations.
#[derive(Debug, Error)]
pub enum DownloadClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,
}

impl From<HttpError> for DownloadClientError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Timeout => DownloadClientError::Timeout,
            HttpError::ConnectionFailed(msg) => DownloadClientError::ConnectionFailed(msg),
            HttpError::Status { status: 404, body } => DownloadClientError::TorrentNotFound(body),
            other => DownloadClientError::ApiError(other.to_string()),
        }
    }
}

/// State of a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    /// Downloading from peers.
    Downloading,
    /// Complete and seeding (or waiting for peers to seed to).
    Seeding,
    /// Download or upload is paused/stopped.
    Paused,
    /// Checking file integrity.
    Checking,
    /// Queued for download.
    Queued,
    /// Incomplete with no peers.
    Stalled,
    /// Error state.
    Error,
    /// Unknown state.
    Unknown,
}

impl TorrentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentState::Downloading => "downloading",
            TorrentState::Seeding => "seeding",
            TorrentState::Paused => "paused",
            TorrentState::Checking => "checking",
            TorrentState::Queued => "queued",
            TorrentState::Stalled => "stalled",
            TorrentState::Error => "error",
            TorrentState::Unknown => "unknown",
        }
    }
}

/// A torrent as reported by its download client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Torrent {
    /// Info hash (lowercase hex).
    pub hash: String,
    pub name: String,
    pub state: TorrentState,
    /// Download progress (0.0 - 1.0).
    pub progress: f64,
    pub size_bytes: u64,
    pub downloaded_bytes: u64,
    pub uploaded_bytes: u64,
    pub ratio: f64,
    /// Time spent seeding.
    pub seed_time: Duration,
    pub added_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub save_path: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    /// Current tracker URL, if any.
    pub tracker: Option<String>,
}

impl Torrent {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }
}

/// Per-torrent limits and flags not included in the list view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TorrentProperties {
    /// Ratio at which seeding should stop; `<= 0` means no per-torrent limit.
    pub ratio_limit: f64,
    /// Seeding time limit; `None` means no per-torrent limit.
    pub seeding_time_limit: Option<Duration>,
    pub seeding_time: Duration,
    pub share_ratio: f64,
    pub is_private: Option<bool>,
}

/// Download-client capability surface.
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Configured client name.
    fn name(&self) -> &str;

    async fn get_torrents(&self) -> Result<Vec<Torrent>, DownloadClientError>;

    async fn get_torrent(&self, hash: &str) -> Result<Torrent, DownloadClientError>;

    async fn delete_torrent(&self, hash: &str, delete_files: bool)
        -> Result<(), DownloadClientError>;

    async fn add_tags(&self, hash: &str, tags: &[String]) -> Result<(), DownloadClientError>;

    /// Whether the torrent came from a private tracker.
    async fn is_private_tracker(&self, hash: &str) -> Result<bool, DownloadClientError>;

    async fn get_torrent_properties(
        &self,
        hash: &str,
    ) -> Result<TorrentProperties, DownloadClientError>;
}
