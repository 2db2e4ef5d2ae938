//! qBittorrent download client implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::{GeneralConfig, QBittorrentConfig};
use crate::http_core::{HttpCore, HttpSettings};

use super::{DownloadClient, DownloadClientError, Torrent, TorrentProperties, TorrentState};

/// qBittorrent WebUI (API v2) client.
pub struct QBittorrentClient {
    name: String,
    http: HttpCore,
    username: String,
    password: String,
    /// Set after a successful login; the SID cookie lives in the cookie jar.
    authenticated: RwLock<bool>,
}

impl QBittorrentClient {
    pub fn new(
        config: &QBittorrentConfig,
        general: &GeneralConfig,
    ) -> Result<Self, DownloadClientError> {
        let settings = HttpSettings::new("qbittorrent", &config.url)
            .with_timeout(general.request_timeout())
            .with_tls_verification(general.ssl_verification);

        Ok(Self {
            name: config.name.clone(),
            http: HttpCore::new(settings)?,
            username: config.username.clone(),
            password: config.password.clone(),
            authenticated: RwLock::new(false),
        })
    }

    /// Login and mark the session as authenticated.
    async fn login(&self) -> Result<(), DownloadClientError> {
        let params = [
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
        ];

        let body = match self.http.post_form("/api/v2/auth/login", &params).await {
            Ok(body) => body,
            Err(e) if e.is_forbidden() => {
                return Err(DownloadClientError::AuthenticationFailed(
                    "Too many failed attempts or IP banned".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        if body.contains("Ok.") {
            debug!(client = %self.name, "qBittorrent login successful");
            *self.authenticated.write().await = true;
            Ok(())
        } else if body.contains("Fails.") {
            Err(DownloadClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(DownloadClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    /// Ensure we have a valid session, logging in if needed.
    async fn ensure_authenticated(&self) -> Result<(), DownloadClientError> {
        if *self.authenticated.read().await {
            return Ok(());
        }
        self.login().await
    }

    async fn relogin(&self) -> Result<(), DownloadClientError> {
        warn!(client = %self.name, "qBittorrent session expired, re-authenticating");
        *self.authenticated.write().await = false;
        self.login().await
    }

    /// Authenticated GET, retried once after re-login on 403.
    async fn get(&self, endpoint: &str) -> Result<String, DownloadClientError> {
        self.ensure_authenticated().await?;
        match self.http.get_text(endpoint).await {
            Err(e) if e.is_forbidden() => {
                self.relogin().await?;
                Ok(self.http.get_text(endpoint).await?)
            }
            other => Ok(other?),
        }
    }

    /// Authenticated form POST, retried once after re-login on 403.
    async fn post_form(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, DownloadClientError> {
        self.ensure_authenticated().await?;
        match self.http.post_form(endpoint, params).await {
            Err(e) if e.is_forbidden() => {
                self.relogin().await?;
                Ok(self.http.post_form(endpoint, params).await?)
            }
            other => Ok(other?),
        }
    }

    async fn info_for(&self, hash: &str) -> Result<QBTorrentInfo, DownloadClientError> {
        let endpoint = format!(
            "/api/v2/torrents/info?hashes={}",
            urlencoding::encode(&hash.to_lowercase())
        );
        let response = self.get(&endpoint).await?;
        parse_json::<Vec<QBTorrentInfo>>(&response)?
            .into_iter()
            .next()
            .ok_or_else(|| DownloadClientError::TorrentNotFound(hash.to_string()))
    }

    async fn properties_for(&self, hash: &str) -> Result<QBTorrentProperties, DownloadClientError> {
        let endpoint = format!(
            "/api/v2/torrents/properties?hash={}",
            urlencoding::encode(&hash.to_lowercase())
        );
        let response = self.get(&endpoint).await?;
        parse_json(&response)
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, DownloadClientError> {
    serde_json::from_str(body)
        .map_err(|e| DownloadClientError::ApiError(format!("Failed to parse response: {}", e)))
}

/// qBittorrent torrent info response.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    state: String,
    progress: f64,
    size: i64,
    downloaded: i64,
    uploaded: i64,
    ratio: f64,
    seeding_time: i64,
    added_on: i64,
    completion_on: i64,
    save_path: String,
    category: String,
    /// Comma-separated.
    tags: String,
    tracker: String,
    /// Minus values mean "global" (-2) or "unlimited" (-1).
    ratio_limit: f64,
    /// Minutes; minus values as for `ratio_limit`.
    seeding_time_limit: i64,
    /// Reported by qBittorrent 4.6+ in the list view.
    private: Option<bool>,
}

impl Default for QBTorrentInfo {
    fn default() -> Self {
        Self {
            hash: String::new(),
            name: String::new(),
            state: String::new(),
            progress: 0.0,
            size: 0,
            downloaded: 0,
            uploaded: 0,
            ratio: 0.0,
            seeding_time: 0,
            added_on: 0,
            completion_on: 0,
            save_path: String::new(),
            category: String::new(),
            tags: String::new(),
            tracker: String::new(),
            ratio_limit: -2.0,
            seeding_time_limit: -2,
            private: None,
        }
    }
}

impl QBTorrentInfo {
    fn into_torrent(self) -> Torrent {
        Torrent {
            hash: self.hash.to_lowercase(),
            name: self.name,
            state: parse_qb_state(&self.state),
            progress: self.progress,
            size_bytes: self.size.max(0) as u64,
            downloaded_bytes: self.downloaded.max(0) as u64,
            uploaded_bytes: self.uploaded.max(0) as u64,
            ratio: self.ratio,
            seed_time: Duration::from_secs(self.seeding_time.max(0) as u64),
            added_at: timestamp_to_datetime(self.added_on),
            completed_at: timestamp_to_datetime(self.completion_on),
            save_path: non_empty(self.save_path),
            category: non_empty(self.category),
            tags: parse_tags(&self.tags),
            tracker: non_empty(self.tracker),
        }
    }
}

/// `torrents/properties` response (subset).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QBTorrentProperties {
    is_private: Option<bool>,
    seeding_time: i64,
    share_ratio: f64,
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn parse_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Parse qBittorrent state string to TorrentState.
fn parse_qb_state(state: &str) -> TorrentState {
    match state {
        "downloading" | "forcedDL" | "metaDL" | "forcedMetaDL" | "allocating" => {
            TorrentState::Downloading
        }
        "uploading" | "forcedUP" | "stalledUP" => TorrentState::Seeding,
        "pausedDL" | "pausedUP" | "stoppedDL" | "stoppedUP" => TorrentState::Paused,
        "checkingDL" | "checkingUP" | "checkingResumeData" | "moving" => TorrentState::Checking,
        "queuedDL" | "queuedUP" => TorrentState::Queued,
        "stalledDL" => TorrentState::Stalled,
        "error" | "missingFiles" => TorrentState::Error,
        _ => TorrentState::Unknown,
    }
}

/// Convert Unix timestamp to DateTime<Utc>.
fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 0 {
        Utc.timestamp_opt(ts, 0).single()
    } else {
        None
    }
}

#[async_trait]
impl DownloadClient for QBittorrentClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_torrents(&self) -> Result<Vec<Torrent>, DownloadClientError> {
        let response = self.get("/api/v2/torrents/info").await?;
        let torrents: Vec<QBTorrentInfo> = parse_json(&response)?;
        debug!(client = %self.name, count = torrents.len(), "Retrieved torrents");
        Ok(torrents.into_iter().map(QBTorrentInfo::into_torrent).collect())
    }

    async fn get_torrent(&self, hash: &str) -> Result<Torrent, DownloadClientError> {
        Ok(self.info_for(hash).await?.into_torrent())
    }

    async fn delete_torrent(
        &self,
        hash: &str,
        delete_files: bool,
    ) -> Result<(), DownloadClientError> {
        let hash_lower = hash.to_lowercase();
        let delete_str = if delete_files { "true" } else { "false" };

        self.post_form(
            "/api/v2/torrents/delete",
            &[("hashes", &hash_lower), ("deleteFiles", delete_str)],
        )
        .await?;
        debug!(client = %self.name, hash = %hash_lower, delete_files, "Deleted torrent");
        Ok(())
    }

    async fn add_tags(&self, hash: &str, tags: &[String]) -> Result<(), DownloadClientError> {
        let hash_lower = hash.to_lowercase();
        let joined = tags.join(",");
        self.post_form(
            "/api/v2/torrents/addTags",
            &[("hashes", &hash_lower), ("tags", &joined)],
        )
        .await?;
        debug!(client = %self.name, hash = %hash_lower, tags = %joined, "Added tags");
        Ok(())
    }

    async fn is_private_tracker(&self, hash: &str) -> Result<bool, DownloadClientError> {
        if let Some(private) = self.properties_for(hash).await?.is_private {
            return Ok(private);
        }
        self.info_for(hash).await?.private.ok_or_else(|| {
            DownloadClientError::ApiError("private flag not reported".to_string())
        })
    }

    async fn get_torrent_properties(
        &self,
        hash: &str,
    ) -> Result<TorrentProperties, DownloadClientError> {
        let info = self.info_for(hash).await?;
        let props = self.properties_for(hash).await?;

        Ok(TorrentProperties {
            ratio_limit: info.ratio_limit,
            seeding_time_limit: (info.seeding_time_limit > 0)
                .then(|| Duration::from_secs(info.seeding_time_limit as u64 * 60)),
            seeding_time: Duration::from_secs(props.seeding_time.max(0) as u64),
            share_ratio: props.share_ratio,
            is_private: props.is_private.or(info.private),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_qb_state_downloading() {
        assert_eq!(parse_qb_state("downloading"), TorrentState::Downloading);
        assert_eq!(parse_qb_state("forcedDL"), TorrentState::Downloading);
        assert_eq!(parse_qb_state("metaDL"), TorrentState::Downloading);
    }

    #[test]
    fn test_parse_qb_state_seeding_includes_stalled_upload() {
        assert_eq!(parse_qb_state("uploading"), TorrentState::Seeding);
        assert_eq!(parse_qb_state("forcedUP"), TorrentState::Seeding);
        assert_eq!(parse_qb_state("stalledUP"), TorrentState::Seeding);
    }

    #[test]
    fn test_parse_qb_state_paused() {
        assert_eq!(parse_qb_state("pausedUP"), TorrentState::Paused);
        assert_eq!(parse_qb_state("stoppedUP"), TorrentState::Paused);
        assert_eq!(parse_qb_state("stoppedDL"), TorrentState::Paused);
    }

    #[test]
    fn test_parse_qb_state_other() {
        assert_eq!(parse_qb_state("stalledDL"), TorrentState::Stalled);
        assert_eq!(parse_qb_state("missingFiles"), TorrentState::Error);
        assert_eq!(parse_qb_state("queuedDL"), TorrentState::Queued);
        assert_eq!(parse_qb_state("something_else"), TorrentState::Unknown);
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags("sonarr, keep ,private"), vec!["sonarr", "keep", "private"]);
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn test_timestamp_to_datetime() {
        let dt = timestamp_to_datetime(1703980800).unwrap();
        assert_eq!(dt.year(), 2023);
        assert!(timestamp_to_datetime(0).is_none());
        assert!(timestamp_to_datetime(-1).is_none());
    }

    #[test]
    fn test_info_deserialize_with_missing_fields() {
        let json = r#"[{
            "hash": "ABC123",
            "name": "Movie.2020.1080p",
            "state": "pausedUP",
            "progress": 1.0,
            "size": 1000,
            "ratio": 2.5,
            "seeding_time": 7200,
            "category": "radarr",
            "tags": "radarr,done",
            "ratio_limit": 2.0,
            "seeding_time_limit": -2
        }]"#;
        let infos: Vec<QBTorrentInfo> = parse_json(json).unwrap();
        let info = infos.into_iter().next().unwrap();
        assert_eq!(info.ratio_limit, 2.0);
        assert_eq!(info.private, None);

        let torrent = info.into_torrent();
        assert_eq!(torrent.hash, "abc123");
        assert_eq!(torrent.state, TorrentState::Paused);
        assert!(torrent.is_complete());
        assert_eq!(torrent.seed_time, Duration::from_secs(7200));
        assert_eq!(torrent.category.as_deref(), Some("radarr"));
        assert!(torrent.has_tag("done"));
        assert!(torrent.save_path.is_none());
    }

    #[test]
    fn test_info_defaults_to_global_limits() {
        let info = QBTorrentInfo::default();
        assert_eq!(info.ratio_limit, -2.0);
        assert_eq!(info.seeding_time_limit, -2);
    }
}
