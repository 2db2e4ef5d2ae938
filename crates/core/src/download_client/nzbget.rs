//! NZBGet download client implementation.
//!
//! Speaks JSON-RPC 1.1 on `/jsonrpc`. The NZBID, as a decimal string, is the
//! download id the *arr applications report, so it serves as the hash.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::{GeneralConfig, NzbgetConfig};
use crate::http_core::{HttpCore, HttpSettings};

use super::{DownloadClient, DownloadClientError, Torrent, TorrentProperties, TorrentState};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// NZBGet JSON-RPC client.
pub struct NzbgetClient {
    name: String,
    http: HttpCore,
}

impl NzbgetClient {
    pub fn new(config: &NzbgetConfig, general: &GeneralConfig) -> Result<Self, DownloadClientError> {
        let settings = HttpSettings::new("nzbget", &config.url)
            .with_timeout(general.request_timeout())
            .with_tls_verification(general.ssl_verification)
            .with_basic_auth(&config.username, &config.password);

        Ok(Self {
            name: config.name.clone(),
            http: HttpCore::new(settings)?,
        })
    }

    async fn rpc<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, DownloadClientError> {
        let request = RpcRequest {
            version: "1.1",
            method,
            params,
        };
        let response: RpcResponse<T> = self.http.post_json("/jsonrpc", &request).await?;
        response.into_result(method)
    }

    async fn groups(&self) -> Result<Vec<NzbgetGroup>, DownloadClientError> {
        self.rpc("listgroups", vec![Value::from(0)]).await
    }

    async fn group(&self, id: &str) -> Result<NzbgetGroup, DownloadClientError> {
        let nzb_id = parse_nzb_id(id)?;
        self.groups()
            .await?
            .into_iter()
            .find(|group| group.nzb_id == nzb_id)
            .ok_or_else(|| DownloadClientError::TorrentNotFound(id.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    version: &'static str,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<Value>,
}

impl<T> RpcResponse<T> {
    fn into_result(self, method: &str) -> Result<T, DownloadClientError> {
        if let Some(error) = self.error.filter(|e| !e.is_null()) {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| error.to_string());
            return Err(DownloadClientError::ApiError(format!(
                "{} failed: {}",
                method, message
            )));
        }
        self.result.ok_or_else(|| {
            DownloadClientError::ApiError(format!("{} returned no result", method))
        })
    }
}

/// `listgroups` entry (subset).
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct NzbgetGroup {
    #[serde(rename = "NZBID")]
    nzb_id: i64,
    #[serde(rename = "NZBName")]
    nzb_name: String,
    status: String,
    #[serde(rename = "FileSizeMB")]
    file_size_mb: u64,
    #[serde(rename = "RemainingSizeMB")]
    remaining_size_mb: u64,
    category: String,
}

impl NzbgetGroup {
    fn into_torrent(self) -> Torrent {
        let size = self.file_size_mb * BYTES_PER_MB;
        let downloaded = self.file_size_mb.saturating_sub(self.remaining_size_mb) * BYTES_PER_MB;
        let progress = if self.file_size_mb > 0 {
            downloaded as f64 / size as f64
        } else {
            0.0
        };

        Torrent {
            hash: self.nzb_id.to_string(),
            name: self.nzb_name,
            state: parse_nzbget_status(&self.status),
            progress,
            size_bytes: size,
            downloaded_bytes: downloaded,
            uploaded_bytes: 0,
            ratio: 0.0,
            seed_time: Duration::ZERO,
            added_at: None,
            completed_at: None,
            save_path: None,
            category: (!self.category.is_empty()).then_some(self.category),
            tags: Vec::new(),
            tracker: None,
        }
    }
}

fn parse_nzb_id(id: &str) -> Result<i64, DownloadClientError> {
    id.trim()
        .parse()
        .map_err(|_| DownloadClientError::TorrentNotFound(id.to_string()))
}

fn parse_nzbget_status(status: &str) -> TorrentState {
    match status {
        "DOWNLOADING" | "FETCHING" => TorrentState::Downloading,
        "PAUSED" => TorrentState::Paused,
        "QUEUED" | "PP_QUEUED" => TorrentState::Queued,
        "LOADING_PARS" | "VERIFYING_SOURCES" | "REPAIRING" | "VERIFYING_REPAIRED" | "RENAMING"
        | "UNPACKING" | "MOVING" | "EXECUTING_SCRIPT" | "PP_FINISHED" => TorrentState::Checking,
        _ => TorrentState::Unknown,
    }
}

/// `editqueue` action: drop the downloaded files, or park the job and keep them.
fn delete_action(delete_files: bool) -> &'static str {
    if delete_files {
        "GroupFinalDelete"
    } else {
        "GroupParkDelete"
    }
}

#[async_trait]
impl DownloadClient for NzbgetClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_torrents(&self) -> Result<Vec<Torrent>, DownloadClientError> {
        let groups = self.groups().await?;
        debug!(client = %self.name, count = groups.len(), "Retrieved NZBGet queue");
        Ok(groups.into_iter().map(NzbgetGroup::into_torrent).collect())
    }

    async fn get_torrent(&self, hash: &str) -> Result<Torrent, DownloadClientError> {
        Ok(self.group(hash).await?.into_torrent())
    }

    async fn delete_torrent(
        &self,
        hash: &str,
        delete_files: bool,
    ) -> Result<(), DownloadClientError> {
        let nzb_id = parse_nzb_id(hash)?;
        let action = delete_action(delete_files);
        let params = vec![
            Value::from(action),
            Value::from(""),
            Value::from(vec![nzb_id]),
        ];

        let accepted: bool = self.rpc("editqueue", params).await?;
        if !accepted {
            return Err(DownloadClientError::ApiError(format!(
                "{} of {} was refused",
                action, nzb_id
            )));
        }
        debug!(client = %self.name, nzb_id, action, "Deleted NZBGet job");
        Ok(())
    }

    async fn add_tags(&self, hash: &str, _tags: &[String]) -> Result<(), DownloadClientError> {
        Err(DownloadClientError::ApiError(format!(
            "NZBGet has no tags, cannot tag {}",
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
        self.group(hash).await?;
        Ok(TorrentProperties {
            is_private: Some(false),
            ..Default::default()
        })
    }
}
