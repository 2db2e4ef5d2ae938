//! REST implementation of [`ArrClient`].

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::types::{
    ArrClient, ArrError, ArrKind, DeleteOptions, LibraryEntity, Paged, QueueItem, SystemStatus,
    WantedItem,
};
use crate::config::{GeneralConfig, InstanceConfig};
use crate::http_core::{HttpCore, HttpSettings};

const PAGE_SIZE: u32 = 1000;

/// One *arr instance reached over HTTP with an API key.
pub struct ArrApiClient {
    name: String,
    kind: ArrKind,
    http: HttpCore,
}

impl ArrApiClient {
    pub fn new(
        name: impl Into<String>,
        kind: ArrKind,
        settings: HttpSettings,
    ) -> Result<Self, ArrError> {
        Ok(Self {
            name: name.into(),
            kind,
            http: HttpCore::new(settings)?,
        })
    }

    /// Build from an instance block plus the global HTTP settings.
    pub fn from_config(
        kind: ArrKind,
        instance: &InstanceConfig,
        general: &GeneralConfig,
    ) -> Result<Self, ArrError> {
        let settings = HttpSettings::new(kind.as_str(), &instance.url)
            .with_timeout(general.request_timeout())
            .with_tls_verification(general.ssl_verification)
            .with_header("X-Api-Key", &instance.api_key);
        Self::new(&instance.name, kind, settings)
    }

    fn api_path(&self, endpoint: &str) -> String {
        format!("/api/{}/{}", self.kind.api_version(), endpoint)
    }

    async fn wanted(&self, endpoint: &str) -> Result<Vec<WantedItem>, ArrError> {
        let path = self.api_path(&format!(
            "wanted/{}?page=1&pageSize={}&monitored=true",
            endpoint, PAGE_SIZE
        ));
        let page: Paged<WantedItem> = self.http.get_json(&path).await?;
        debug!(instance = %self.name, endpoint, count = page.records.len(), "Fetched wanted items");
        Ok(page.records)
    }
}

#[derive(Deserialize)]
struct MonitoredFlag {
    #[serde(default)]
    monitored: bool,
}

#[async_trait]
impl ArrClient for ArrApiClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ArrKind {
        self.kind
    }

    async fn get_queue(&self) -> Result<Vec<QueueItem>, ArrError> {
        let path = self.api_path(&format!("queue?page=1&pageSize={}", PAGE_SIZE));
        let page: Paged<QueueItem> = self.http.get_json(&path).await?;
        debug!(instance = %self.name, count = page.records.len(), "Fetched queue");
        Ok(page.records)
    }

    async fn delete_queue_item(&self, id: i64, options: DeleteOptions) -> Result<(), ArrError> {
        let path = self.api_path(&format!("queue/{}?{}", id, options.to_query()));
        self.http.delete(&path).await?;
        debug!(instance = %self.name, queue_id = id, ?options, "Deleted queue item");
        Ok(())
    }

    async fn get_system_status(&self) -> Result<SystemStatus, ArrError> {
        Ok(self.http.get_json(&self.api_path("system/status")).await?)
    }

    async fn get_monitored_status(
        &self,
        entity: LibraryEntity,
        id: i64,
    ) -> Result<bool, ArrError> {
        let path = self.api_path(&format!("{}/{}", entity.as_path(), id));
        let flag: MonitoredFlag = self.http.get_json(&path).await?;
        Ok(flag.monitored)
    }

    async fn missing_items(&self) -> Result<Vec<WantedItem>, ArrError> {
        self.wanted("missing").await
    }

    async fn cutoff_unmet_items(&self) -> Result<Vec<WantedItem>, ArrError> {
        self.wanted("cutoff").await
    }

    async fn trigger_search(&self, ids: &[i64]) -> Result<(), ArrError> {
        let command = self.kind.search_command().ok_or(ArrError::Unsupported {
            kind: self.kind,
            operation: "search",
        })?;

        let mut body = serde_json::Map::new();
        body.insert("name".to_string(), command.name.into());
        body.insert(command.ids_field.to_string(), ids.into());

        self.http
            .post_json_unit(&self.api_path("command"), &body)
            .await?;
        debug!(instance = %self.name, command = command.name, count = ids.len(), "Triggered search");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(kind: ArrKind) -> ArrApiClient {
        let instance = InstanceConfig {
            name: "main".to_string(),
            url: "http://arr.local:8989/".to_string(),
            api_key: "secret".to_string(),
            enabled: true,
        };
        ArrApiClient::from_config(kind, &instance, &GeneralConfig::default()).unwrap()
    }

    #[test]
    fn test_api_path_per_kind() {
        assert_eq!(client(ArrKind::Sonarr).api_path("queue"), "/api/v3/queue");
        assert_eq!(client(ArrKind::Lidarr).api_path("queue"), "/api/v1/queue");
    }

    #[test]
    fn test_name_and_kind() {
        let c = client(ArrKind::Radarr);
        assert_eq!(c.name(), "main");
        assert_eq!(c.kind(), ArrKind::Radarr);
    }

    #[tokio::test]
    async fn test_whisparr_search_unsupported() {
        let c = client(ArrKind::Whisparr);
        let result = c.trigger_search(&[1, 2]).await;
        assert!(matches!(result, Err(ArrError::Unsupported { .. })));
    }

    #[test]
    fn test_paged_records_default_empty() {
        let page: Paged<QueueItem> = serde_json::from_str(r#"{"page": 1}"#).unwrap();
        assert!(page.records.is_empty());
    }
}
