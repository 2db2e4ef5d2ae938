//! SABnzbd download client implementation.
//!
//! Usenet jobs are exposed through the torrent-shaped [`DownloadClient`] surface:
//! the NZO id plays the role of the hash, so orphan detection and the removal
//! policy see SABnzbd queue slots like any other download.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::config::{GeneralConfig, SabnzbdConfig};
use crate::http_core::{HttpCore, HttpSettings};

use super::{DownloadClient, DownloadClientError, Torrent, TorrentProperties, TorrentState};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// SABnzbd JSON API client.
pub struct SabnzbdClient {
    name: String,
    http: HttpCore,
    api_key: String,
}

impl SabnzbdClient {
    pub fn new(config: &SabnzbdConfig, general: &GeneralConfig) -> Result<Self, DownloadClientError> {
        let settings = HttpSettings::new("sabnzbd", &config.url)
            .with_timeout(general.request_timeout())
            .with_tls_verification(general.ssl_verification);

        Ok(Self {
            name: config.name.clone(),
            http: HttpCore::new(settings)?,
            api_key: config.api_key.clone(),
        })
    }

    /// Call `/api` in `mode` with JSON output and the API key.
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        mode: &str,
        extra: &[(&str, &str)],
    ) -> Result<T, DownloadClientError> {
        let mut query = vec![
            ("mode", mode),
            ("apikey", self.api_key.as_str()),
            ("output", "json"),
        ];
        query.extend_from_slice(extra);
        Ok(self.http.get_json_query("/api", &query).await?)
    }

    async fn queue(&self) -> Result<Vec<SabSlot>, DownloadClientError> {
        let response: SabQueueResponse = self.call("queue", &[]).await?;
        Ok(response.queue.slots)
    }

    async fn slot(&self, nzo_id: &str) -> Result<SabSlot, DownloadClientError> {
        self.queue()
            .await?
            .into_iter()
            .find(|slot| slot.nzo_id.eq_ignore_ascii_case(nzo_id))
            .ok_or_else(|| DownloadClientError::TorrentNotFound(nzo_id.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct SabQueueResponse {
    queue: SabQueue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SabQueue {
    slots: Vec<SabSlot>,
}

/// One queue slot. SABnzbd reports most numbers as strings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SabSlot {
    nzo_id: String,
    filename: String,
    status: String,
    #[serde(deserialize_with = "lenient_f64")]
    percentage: f64,
    cat: String,
    #[serde(deserialize_with = "lenient_f64")]
    mb: f64,
    #[serde(deserialize_with = "lenient_f64")]
    mbleft: f64,
}

impl SabSlot {
    fn into_torrent(self) -> Torrent {
        let size = (self.mb.max(0.0) * BYTES_PER_MB) as u64;
        let left = (self.mbleft.max(0.0) * BYTES_PER_MB) as u64;
        Torrent {
            hash: self.nzo_id,
            name: self.filename,
            state: parse_sab_status(&self.status),
            progress: (self.percentage / 100.0).clamp(0.0, 1.0),
            size_bytes: size,
            downloaded_bytes: size.saturating_sub(left),
            uploaded_bytes: 0,
            ratio: 0.0,
            seed_time: Duration::ZERO,
            added_at: None,
            completed_at: None,
            save_path: None,
            category: (!self.cat.is_empty() && self.cat != "*").then_some(self.cat),
            tags: Vec::new(),
            tracker: None,
        }
    }
}

/// `mode=queue&name=delete` response.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SabStatusResponse {
    status: bool,
    error: Option<String>,
}

/// Accept a JSON number, a numeric string or an empty string (as 0).
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) if s.trim().is_empty() => Ok(0.0),
        NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn parse_sab_status(status: &str) -> TorrentState {
    match status {
        "Downloading" | "Fetching" | "Grabbing" => TorrentState::Downloading,
        "Paused" => TorrentState::Paused,
        "Queued" | "Propagating" => TorrentState::Queued,
        "Checking" | "QuickCheck" | "Verifying" | "Repairing" | "Extracting" | "Moving"
        | "Running" => TorrentState::Checking,
        "Failed" => TorrentState::Error,
        _ => TorrentState::Unknown,
    }
}

#[async_trait]
impl DownloadClient for SabnzbdClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_torrents(&self) -> Result<Vec<Torrent>, DownloadClientError> {
        let slots = self.queue().await?;
        debug!(client = %self.name, count = slots.len(), "Retrieved SABnzbd queue");
        Ok(slots.into_iter().map(SabSlot::into_torrent).collect())
    }

    async fn get_torrent(&self, hash: &str) -> Result<Torrent, DownloadClientError> {
        Ok(self.slot(hash).await?.into_torrent())
    }

    async fn delete_torrent(
        &self,
        hash: &str,
        delete_files: bool,
    ) -> Result<(), DownloadClientError> {
        let del_files = if delete_files { "1" } else { "0" };
        let response: SabStatusResponse = self
            .call(
                "queue",
                &[("name", "delete"), ("value", hash), ("del_files", del_files)],
            )
            .await?;

        if !response.status {
            return Err(DownloadClientError::ApiError(
                response
                    .error
                    .unwrap_or_else(|| format!("delete of {} was refused", hash)),
            ));
        }
        debug!(client = %self.name, nzo_id = hash, delete_files, "Deleted SABnzbd job");
        Ok(())
    }

    async fn add_tags(&self, hash: &str, _tags: &[String]) -> Result<(), DownloadClientError> {
        Err(DownloadClientError::ApiError(format!(
            "SABnzbd has no tags, cannot tag {}",
            hash
        )))
    }

    /// Usenet has no trackers.
    async fn is_private_tracker(&self, _hash: &str) -> Result<bool, DownloadClientError> {
        Ok(false)
    }

    async fn get_torrent_properties(
        &self,
        hash: &str,
    ) -> Result<TorrentProperties, DownloadClientError> {
        self.slot(hash).await?;
        Ok(TorrentProperties {
            is_private: Some(false),
            ..Default::default()
        })
    }
}
