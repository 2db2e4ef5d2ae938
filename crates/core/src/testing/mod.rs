//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the collaborator traits,
//! so the ledger, policy, jobs and orchestrator can be exercised without a
//! real *arr instance or download client.
//!
//! # Example
//!
//! ```rust,ignore
//! use sweeparr_core::testing::{fixtures, MockArrClient, MockDownloadClient};
//!
//! let sonarr = MockArrClient::new("sonarr", ArrKind::Sonarr);
//! sonarr.add_queue_item(fixtures::stalled_item(1, "ABC", "Show.S01E01")).await;
//!
//! let qbit = MockDownloadClient::new("qbit");
//! qbit.add_torrent(fixtures::torrent("abc")).await;
//! qbit.set_private("abc", true).await;
//! ```

mod mock_arr_client;
mod mock_download_client;

pub use mock_arr_client::MockArrClient;
pub use mock_download_client::MockDownloadClient;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::time::Duration;

    use chrono::{DateTime, Utc};

    use crate::arr::{QueueItem, StatusMessage, WantedItem};
    use crate::download_client::{Torrent, TorrentState};

    /// A healthy, downloading torrent queue item.
    pub fn queue_item(id: i64, download_id: &str, title: &str) -> QueueItem {
        QueueItem {
            id,
            title: title.to_string(),
            status: "downloading".to_string(),
            tracked_download_status: "ok".to_string(),
            tracked_download_state: "downloading".to_string(),
            download_id: download_id.to_string(),
            protocol: "torrent".to_string(),
            download_client: "qbit".to_string(),
            size: 1_000_000_000.0,
            sizeleft: 500_000_000.0,
            added: Some(Utc::now() - chrono::Duration::hours(1)),
            series_id: Some(id * 10),
            episode_id: Some(id * 100),
            ..Default::default()
        }
    }

    /// A queue item the stalled detector flags.
    pub fn stalled_item(id: i64, download_id: &str, title: &str) -> QueueItem {
        with_message(
            QueueItem {
                tracked_download_status: "warning".to_string(),
                ..queue_item(id, download_id, title)
            },
            "Download stalled",
            &["The download is stalled with no connections"],
        )
    }

    /// A downloading item with the given byte counts, added `age` ago.
    pub fn downloading_item(
        id: i64,
        download_id: &str,
        size: f64,
        sizeleft: f64,
        added: DateTime<Utc>,
    ) -> QueueItem {
        QueueItem {
            size,
            sizeleft,
            added: Some(added),
            ..queue_item(id, download_id, "Slow.Download")
        }
    }

    /// Append a status message.
    pub fn with_message(mut item: QueueItem, title: &str, messages: &[&str]) -> QueueItem {
        item.status_messages.push(StatusMessage {
            title: title.to_string(),
            messages: messages.iter().map(|m| m.to_string()).collect(),
        });
        item
    }

    /// A fully downloaded, seeding torrent.
    pub fn torrent(hash: &str) -> Torrent {
        Torrent {
            hash: hash.to_lowercase(),
            name: format!("Torrent {}", hash),
            state: TorrentState::Seeding,
            progress: 1.0,
            size_bytes: 1024 * 1024 * 100,
            downloaded_bytes: 1024 * 1024 * 100,
            uploaded_bytes: 0,
            ratio: 0.0,
            seed_time: Duration::ZERO,
            added_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            save_path: Some("/downloads".to_string()),
            category: Some("sonarr".to_string()),
            tags: Vec::new(),
            tracker: Some("https://tracker.example/announce".to_string()),
        }
    }

    pub fn tagged_torrent(hash: &str, tags: &[&str]) -> Torrent {
        Torrent {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..torrent(hash)
        }
    }

    /// A completed torrent with the given ratio and seed time.
    pub fn seeded_torrent(hash: &str, state: TorrentState, ratio: f64, seed_time: Duration) -> Torrent {
        Torrent {
            state,
            ratio,
            seed_time,
            ..torrent(hash)
        }
    }

    pub fn wanted_item(id: i64, last_search_time: Option<DateTime<Utc>>) -> WantedItem {
        WantedItem {
            id,
            title: format!("Wanted {}", id),
            monitored: true,
            last_search_time,
        }
    }
}
