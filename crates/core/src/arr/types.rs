//! Types for *arr queue operations.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http_core::HttpError;

/// Errors that can occur while talking to an *arr instance.
#[derive(Debug, Error)]
pub enum ArrError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("{kind} does not support {operation}")]
    Unsupported {
        kind: ArrKind,
        operation: &'static str,
    },
}

/// Which *arr application an instance runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrKind {
    Sonarr,
    Radarr,
    Lidarr,
    Readarr,
    Whisparr,
}

impl ArrKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArrKind::Sonarr => "sonarr",
            ArrKind::Radarr => "radarr",
            ArrKind::Lidarr => "lidarr",
            ArrKind::Readarr => "readarr",
            ArrKind::Whisparr => "whisparr",
        }
    }

    /// REST API version segment.
    pub fn api_version(&self) -> &'static str {
        match self {
            ArrKind::Sonarr | ArrKind::Radarr | ArrKind::Whisparr => "v3",
            ArrKind::Lidarr | ArrKind::Readarr => "v1",
        }
    }

    /// Command used to search for wanted items, if the application has one.
    pub fn search_command(&self) -> Option<SearchCommand> {
        match self {
            ArrKind::Sonarr => Some(SearchCommand::new("EpisodeSearch", "episodeIds")),
            ArrKind::Radarr => Some(SearchCommand::new("MoviesSearch", "movieIds")),
            ArrKind::Lidarr => Some(SearchCommand::new("AlbumSearch", "albumIds")),
            ArrKind::Readarr => Some(SearchCommand::new("BookSearch", "bookIds")),
            ArrKind::Whisparr => None,
        }
    }
}

impl fmt::Display for ArrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name and id field of a search command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchCommand {
    pub name: &'static str,
    pub ids_field: &'static str,
}

impl SearchCommand {
    const fn new(name: &'static str, ids_field: &'static str) -> Self {
        Self { name, ids_field }
    }
}

/// Library entity a queue item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryEntity {
    Series,
    Movie,
    Artist,
    Author,
}

impl LibraryEntity {
    /// Pick the entity type from `system/status` `appName`.
    pub fn from_app_name(app_name: &str) -> Option<Self> {
        match app_name.to_ascii_lowercase().as_str() {
            "sonarr" => Some(LibraryEntity::Series),
            "radarr" => Some(LibraryEntity::Movie),
            "lidarr" => Some(LibraryEntity::Artist),
            "readarr" => Some(LibraryEntity::Author),
            _ => None,
        }
    }

    /// API path segment, e.g. `series`.
    pub fn as_path(&self) -> &'static str {
        match self {
            LibraryEntity::Series => "series",
            LibraryEntity::Movie => "movie",
            LibraryEntity::Artist => "artist",
            LibraryEntity::Author => "author",
        }
    }

    /// The item's id for this entity, if set and positive.
    pub fn id_of(&self, item: &QueueItem) -> Option<i64> {
        let id = match self {
            LibraryEntity::Series => item.series_id,
            LibraryEntity::Movie => item.movie_id,
            LibraryEntity::Artist => item.artist_id,
            LibraryEntity::Author => item.author_id,
        };
        id.filter(|id| *id > 0)
    }
}

/// One status message attached to a queue item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<String>,
}

/// One record of an *arr download queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueItem {
    pub id: i64,
    pub title: String,
    pub status: String,
    pub tracked_download_status: String,
    pub tracked_download_state: String,
    pub status_messages: Vec<StatusMessage>,
    pub error_message: String,
    /// Download-client identifier (torrent hash for torrents).
    pub download_id: String,
    pub protocol: String,
    pub download_client: String,
    pub indexer: String,
    pub output_path: String,
    pub size: f64,
    pub sizeleft: f64,
    pub added: Option<DateTime<Utc>>,
    pub estimated_completion_time: Option<DateTime<Utc>>,
    pub series_id: Option<i64>,
    pub episode_id: Option<i64>,
    pub season_number: Option<i64>,
    pub movie_id: Option<i64>,
    pub artist_id: Option<i64>,
    pub album_id: Option<i64>,
    pub author_id: Option<i64>,
    pub book_id: Option<i64>,
}

impl QueueItem {
    /// Status-message titles.
    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.status_messages.iter().map(|m| m.title.as_str())
    }

    /// Status-message bodies.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.status_messages
            .iter()
            .flat_map(|m| m.messages.iter().map(String::as_str))
    }

    /// Every title, body and the error message.
    pub fn all_text(&self) -> impl Iterator<Item = &str> {
        self.titles()
            .chain(self.messages())
            .chain(std::iter::once(self.error_message.as_str()))
            .filter(|s| !s.is_empty())
    }

    /// Whether the item is linked to any library entity.
    pub fn has_library_id(&self) -> bool {
        [self.series_id, self.movie_id, self.artist_id, self.author_id]
            .iter()
            .any(|id| id.is_some_and(|id| id > 0))
    }
}

/// Parameters for removing a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOptions {
    /// Also remove the download from its download client.
    pub remove_from_client: bool,
    /// Blocklist the release so it isn't grabbed again.
    pub blocklist: bool,
    /// Don't search for a replacement.
    pub skip_redownload: bool,
}

impl DeleteOptions {
    pub const fn new(remove_from_client: bool, blocklist: bool, skip_redownload: bool) -> Self {
        Self {
            remove_from_client,
            blocklist,
            skip_redownload,
        }
    }

    pub(crate) fn to_query(self) -> String {
        format!(
            "removeFromClient={}&blocklist={}&skipRedownload={}",
            self.remove_from_client, self.blocklist, self.skip_redownload
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemStatus {
    pub app_name: String,
    pub instance_name: String,
    pub version: String,
}

/// An item from `wanted/missing` or `wanted/cutoff`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WantedItem {
    pub id: i64,
    pub title: String,
    pub monitored: bool,
    pub last_search_time: Option<DateTime<Utc>>,
}

/// Paged list wrapper used by queue and wanted endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Paged<T> {
    #[serde(default = "Vec::new")]
    pub records: Vec<T>,
}

/// Metadata-manager queue source.
#[async_trait]
pub trait ArrClient: Send + Sync {
    /// Instance name from configuration.
    fn name(&self) -> &str;

    fn kind(&self) -> ArrKind;

    async fn get_queue(&self) -> Result<Vec<QueueItem>, ArrError>;

    async fn delete_queue_item(&self, id: i64, options: DeleteOptions) -> Result<(), ArrError>;

    async fn get_system_status(&self) -> Result<SystemStatus, ArrError>;

    async fn get_monitored_status(&self, entity: LibraryEntity, id: i64)
        -> Result<bool, ArrError>;

    /// Monitored items with no file.
    async fn missing_items(&self) -> Result<Vec<WantedItem>, ArrError>;

    /// Monitored items whose file is below the quality cutoff.
    async fn cutoff_unmet_items(&self) -> Result<Vec<WantedItem>, ArrError>;

    async fn trigger_search(&self, ids: &[i64]) -> Result<(), ArrError>;
}
