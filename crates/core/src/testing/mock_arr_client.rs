//! Mock *arr client for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::arr::{
    ArrClient, ArrError, ArrKind, DeleteOptions, LibraryEntity, QueueItem, SystemStatus,
    WantedItem,
};
use crate::http_core::HttpError;

/// Mock implementation of the [`ArrClient`] trait.
///
/// Provides controllable behavior for testing:
/// - Scripted queue, monitored flags and wanted lists
/// - Recorded queue deletions and search commands
/// - Simulated failures and slow searches (to observe concurrency)
///
/// Deleting a queue item removes it from the scripted queue, so the next
/// cycle sees what a real instance would.
#[derive(Debug)]
pub struct MockArrClient {
    name: String,
    kind: ArrKind,
    app_name: Arc<RwLock<String>>,
    queue: Arc<RwLock<Vec<QueueItem>>>,
    monitored: Arc<RwLock<HashMap<(&'static str, i64), bool>>>,
    missing: Arc<RwLock<Vec<WantedItem>>>,
    cutoff_unmet: Arc<RwLock<Vec<WantedItem>>>,
    deleted: Arc<RwLock<Vec<(i64, DeleteOptions)>>>,
    searches: Arc<RwLock<Vec<Vec<i64>>>>,
    /// If set, every operation fails.
    unavailable: Arc<RwLock<bool>>,
    search_delay: Arc<RwLock<Option<Duration>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockArrClient {
    pub fn new(name: impl Into<String>, kind: ArrKind) -> Self {
        let app_name = match kind {
            ArrKind::Sonarr => "Sonarr",
            ArrKind::Radarr => "Radarr",
            ArrKind::Lidarr => "Lidarr",
            ArrKind::Readarr => "Readarr",
            ArrKind::Whisparr => "Whisparr",
        };
        Self {
            name: name.into(),
            kind,
            app_name: Arc::new(RwLock::new(app_name.to_string())),
            queue: Arc::new(RwLock::new(Vec::new())),
            monitored: Arc::new(RwLock::new(HashMap::new())),
            missing: Arc::new(RwLock::new(Vec::new())),
            cutoff_unmet: Arc::new(RwLock::new(Vec::new())),
            deleted: Arc::new(RwLock::new(Vec::new())),
            searches: Arc::new(RwLock::new(Vec::new())),
            unavailable: Arc::new(RwLock::new(false)),
            search_delay: Arc::new(RwLock::new(None)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the whole queue.
    pub async fn set_queue(&self, items: Vec<QueueItem>) {
        *self.queue.write().await = items;
    }

    pub async fn add_queue_item(&self, item: QueueItem) {
        self.queue.write().await.push(item);
    }

    /// Replace a queue item with the same id (or add it).
    pub async fn update_queue_item(&self, item: QueueItem) {
        let mut queue = self.queue.write().await;
        match queue.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item,
            None => queue.push(item),
        }
    }

    pub async fn set_app_name(&self, app_name: &str) {
        *self.app_name.write().await = app_name.to_string();
    }

    pub async fn set_monitored(&self, entity: LibraryEntity, id: i64, monitored: bool) {
        self.monitored
            .write()
            .await
            .insert((entity.as_path(), id), monitored);
    }

    pub async fn set_missing(&self, items: Vec<WantedItem>) {
        *self.missing.write().await = items;
    }

    pub async fn set_cutoff_unmet(&self, items: Vec<WantedItem>) {
        *self.cutoff_unmet.write().await = items;
    }

    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    /// Make each `trigger_search` take this long.
    pub async fn set_search_delay(&self, delay: Duration) {
        *self.search_delay.write().await = Some(delay);
    }

    /// Recorded `delete_queue_item` calls.
    pub async fn delete_calls(&self) -> Vec<(i64, DeleteOptions)> {
        self.deleted.read().await.clone()
    }

    /// Recorded `trigger_search` id lists.
    pub async fn search_calls(&self) -> Vec<Vec<i64>> {
        self.searches.read().await.clone()
    }

    /// Highest number of searches observed in flight at once.
    pub fn max_concurrent_searches(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn check_available(&self) -> Result<(), ArrError> {
        if *self.unavailable.read().await {
            return Err(ArrError::Http(HttpError::ConnectionFailed(format!(
                "{} unavailable",
                self.name
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl ArrClient for MockArrClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ArrKind {
        self.kind
    }

    async fn get_queue(&self) -> Result<Vec<QueueItem>, ArrError> {
        self.check_available().await?;
        Ok(self.queue.read().await.clone())
    }

    async fn delete_queue_item(&self, id: i64, options: DeleteOptions) -> Result<(), ArrError> {
        self.check_available().await?;
        let mut queue = self.queue.write().await;
        let before = queue.len();
        queue.retain(|item| item.id != id);
        if queue.len() == before {
            return Err(ArrError::Http(HttpError::Status {
                status: 404,
                body: format!("queue item {} not found", id),
            }));
        }
        self.deleted.write().await.push((id, options));
        Ok(())
    }

    async fn get_system_status(&self) -> Result<SystemStatus, ArrError> {
        self.check_available().await?;
        Ok(SystemStatus {
            app_name: self.app_name.read().await.clone(),
            instance_name: self.name.clone(),
            version: "4.0.0".to_string(),
        })
    }

    async fn get_monitored_status(
        &self,
        entity: LibraryEntity,
        id: i64,
    ) -> Result<bool, ArrError> {
        self.check_available().await?;
        self.monitored
            .read()
            .await
            .get(&(entity.as_path(), id))
            .copied()
            .ok_or_else(|| {
                ArrError::Http(HttpError::Status {
                    status: 404,
                    body: format!("{} {} not found", entity.as_path(), id),
                })
            })
    }

    async fn missing_items(&self) -> Result<Vec<WantedItem>, ArrError> {
        self.check_available().await?;
        Ok(self.missing.read().await.clone())
    }

    async fn cutoff_unmet_items(&self) -> Result<Vec<WantedItem>, ArrError> {
        self.check_available().await?;
        Ok(self.cutoff_unmet.read().await.clone())
    }

    async fn trigger_search(&self, ids: &[i64]) -> Result<(), ArrError> {
        self.check_available().await?;
        if self.kind.search_command().is_none() {
            return Err(ArrError::Unsupported {
                kind: self.kind,
                operation: "search",
            });
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let delay = *self.search_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.searches.write().await.push(ids.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_delete_removes_from_queue() {
        let client = MockArrClient::new("sonarr", ArrKind::Sonarr);
        client
            .add_queue_item(fixtures::queue_item(1, "HASH1", "Show.S01E01"))
            .await;
        client
            .delete_queue_item(1, DeleteOptions::default())
            .await
            .unwrap();
        assert!(client.get_queue().await.unwrap().is_empty());
        assert_eq!(client.delete_calls().await.len(), 1);
        assert!(client
            .delete_queue_item(1, DeleteOptions::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_call() {
        let client = MockArrClient::new("radarr", ArrKind::Radarr);
        client.set_unavailable(true).await;
        assert!(client.get_queue().await.is_err());
        assert!(client.get_system_status().await.is_err());
        client.set_unavailable(false).await;
        assert_eq!(client.get_system_status().await.unwrap().app_name, "Radarr");
    }
}
