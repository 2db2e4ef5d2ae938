//! Mock download client for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::download_client::{DownloadClient, DownloadClientError, Torrent, TorrentProperties};

/// Mock implementation of the [`DownloadClient`] trait.
///
/// Provides controllable behavior for testing:
/// - Scripted torrent list, private flags and properties
/// - Recorded deletes and tag additions for assertions
/// - Simulated failures (one-shot or persistent)
///
/// Hash lookups are case-insensitive, the way *arr download ids (upper-case)
/// line up with client hashes (lower-case).
#[derive(Debug, Default)]
pub struct MockDownloadClient {
    name: String,
    torrents: Arc<RwLock<Vec<Torrent>>>,
    private: Arc<RwLock<HashMap<String, bool>>>,
    properties: Arc<RwLock<HashMap<String, TorrentProperties>>>,
    deleted: Arc<RwLock<Vec<(String, bool)>>>,
    tagged: Arc<RwLock<Vec<(String, Vec<String>)>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<DownloadClientError>>>,
    /// If set, every operation fails.
    unavailable: Arc<RwLock<bool>>,
}

impl MockDownloadClient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub async fn add_torrent(&self, torrent: Torrent) {
        self.torrents.write().await.push(torrent);
    }

    pub async fn set_private(&self, hash: &str, private: bool) {
        self.private.write().await.insert(hash.to_lowercase(), private);
    }

    pub async fn set_properties(&self, hash: &str, properties: TorrentProperties) {
        self.properties
            .write()
            .await
            .insert(hash.to_lowercase(), properties);
    }

    pub async fn set_next_error(&self, error: DownloadClientError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    /// Recorded `delete_torrent` calls as `(hash, delete_files)`.
    pub async fn delete_calls(&self) -> Vec<(String, bool)> {
        self.deleted.read().await.clone()
    }

    /// Recorded `add_tags` calls as `(hash, tags)`.
    pub async fn tag_calls(&self) -> Vec<(String, Vec<String>)> {
        self.tagged.read().await.clone()
    }

    pub async fn torrent_count(&self) -> usize {
        self.torrents.read().await.len()
    }

    async fn check_error(&self) -> Result<(), DownloadClientError> {
        if *self.unavailable.read().await {
            return Err(DownloadClientError::ConnectionFailed(format!(
                "{} unavailable",
                self.name
            )));
        }
        match self.next_error.write().await.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn find(&self, hash: &str) -> Result<Torrent, DownloadClientError> {
        let hash = hash.to_lowercase();
        self.torrents
            .read()
            .await
            .iter()
            .find(|t| t.hash.to_lowercase() == hash)
            .cloned()
            .ok_or(DownloadClientError::TorrentNotFound(hash))
    }
}

#[async_trait]
impl DownloadClient for MockDownloadClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_torrents(&self) -> Result<Vec<Torrent>, DownloadClientError> {
        self.check_error().await?;
        Ok(self.torrents.read().await.clone())
    }

    async fn get_torrent(&self, hash: &str) -> Result<Torrent, DownloadClientError> {
        self.check_error().await?;
        self.find(hash).await
    }

    async fn delete_torrent(
        &self,
        hash: &str,
        delete_files: bool,
    ) -> Result<(), DownloadClientError> {
        self.check_error().await?;
        self.find(hash).await?;
        let lower = hash.to_lowercase();
        self.torrents
            .write()
            .await
            .retain(|t| t.hash.to_lowercase() != lower);
        self.deleted
            .write()
            .await
            .push((hash.to_string(), delete_files));
        Ok(())
    }

    async fn add_tags(&self, hash: &str, tags: &[String]) -> Result<(), DownloadClientError> {
        self.check_error().await?;
        let lower = hash.to_lowercase();
        let mut torrents = self.torrents.write().await;
        let torrent = torrents
            .iter_mut()
            .find(|t| t.hash.to_lowercase() == lower)
            .ok_or_else(|| DownloadClientError::TorrentNotFound(hash.to_string()))?;
        for tag in tags {
            if !torrent.has_tag(tag) {
                torrent.tags.push(tag.clone());
            }
        }
        self.tagged
            .write()
            .await
            .push((hash.to_string(), tags.to_vec()));
        Ok(())
    }

    async fn is_private_tracker(&self, hash: &str) -> Result<bool, DownloadClientError> {
        self.check_error().await?;
        self.find(hash).await?;
        self.private
            .read()
            .await
            .get(&hash.to_lowercase())
            .copied()
            .ok_or_else(|| DownloadClientError::ApiError("private flag not reported".to_string()))
    }

    async fn get_torrent_properties(
        &self,
        hash: &str,
    ) -> Result<TorrentProperties, DownloadClientError> {
        self.check_error().await?;
        self.find(hash).await?;
        Ok(self
            .properties
            .read()
            .await
            .get(&hash.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let client = MockDownloadClient::new("qbit");
        client.add_torrent(fixtures::torrent("abcdef")).await;
        assert!(client.get_torrent("ABCDEF").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_removes_and_records() {
        let client = MockDownloadClient::new("qbit");
        client.add_torrent(fixtures::torrent("abc")).await;
        client.delete_torrent("ABC", true).await.unwrap();
        assert_eq!(client.torrent_count().await, 0);
        assert_eq!(client.delete_calls().await, vec![("ABC".to_string(), true)]);
        assert!(matches!(
            client.delete_torrent("abc", true).await,
            Err(DownloadClientError::TorrentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_next_error_is_one_shot() {
        let client = MockDownloadClient::new("qbit");
        client.set_next_error(DownloadClientError::Timeout).await;
        assert!(client.get_torrents().await.is_err());
        assert!(client.get_torrents().await.is_ok());
    }
}
