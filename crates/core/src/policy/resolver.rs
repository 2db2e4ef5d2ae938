use std::sync::Arc;

use tracing::{debug, warn};

use super::types::{PolicyError, RemovalAction, TrackerHandling};
use crate::config::GeneralConfig;
use crate::download_client::{DownloadClient, DownloadClientError, Torrent};

/// Removal policy resolver.
///
/// Protection wins over tracker class. Lookup failures fall back to `Remove`
/// and classification failures to "public".
#[derive(Debug, Clone)]
pub struct RemovalPolicy {
    private_tracker_handling: String,
    public_tracker_handling: String,
    obsolete_tag: Option<String>,
    protected_tag: Option<String>,
}

impl RemovalPolicy {
    pub fn new(
        private_tracker_handling: impl Into<String>,
        public_tracker_handling: impl Into<String>,
        obsolete_tag: Option<String>,
        protected_tag: Option<String>,
    ) -> Self {
        Self {
            private_tracker_handling: private_tracker_handling.into(),
            public_tracker_handling: public_tracker_handling.into(),
            obsolete_tag: obsolete_tag.filter(|t| !t.is_empty()),
            protected_tag: protected_tag.filter(|t| !t.is_empty()),
        }
    }

    pub fn from_config(general: &GeneralConfig) -> Self {
        Self::new(
            general.private_tracker_handling.clone(),
            general.public_tracker_handling.clone(),
            Some(general.obsolete_tag.clone()),
            Some(general.protected_tag.clone()),
        )
    }

    /// Policy that removes everything: no tags, both modes `remove`.
    pub fn remove_all() -> Self {
        Self::new("remove", "remove", None, None)
    }

    pub fn obsolete_tag(&self) -> Option<&str> {
        self.obsolete_tag.as_deref()
    }

    pub fn protected_tag(&self) -> Option<&str> {
        self.protected_tag.as_deref()
    }

    /// Decide what to do with the download identified by `id`.
    pub async fn resolve(&self, id: &str, clients: &[Arc<dyn DownloadClient>]) -> RemovalAction {
        let Some((client, torrent)) = locate(id, clients).await else {
            debug!(download_id = id, "Not found in any download client, defaulting to remove");
            return RemovalAction::Remove;
        };

        if let Some(tag) = &self.protected_tag {
            if torrent.has_tag(tag) {
                debug!(download_id = id, tag = %tag, "Item is protected");
                return RemovalAction::Skip;
            }
        }

        let private = match client.is_private_tracker(id).await {
            Ok(private) => private,
            Err(e) => {
                warn!(
                    download_id = id,
                    client = client.name(),
                    error = %e,
                    "Failed to classify tracker, assuming public"
                );
                false
            }
        };

        let mode = if private {
            &self.private_tracker_handling
        } else {
            &self.public_tracker_handling
        };

        let action = match mode.parse::<TrackerHandling>() {
            Ok(handling) => handling.action(),
            Err(e) => {
                warn!(download_id = id, error = %e, "Defaulting to remove");
                RemovalAction::Remove
            }
        };

        debug!(download_id = id, private, %action, "Resolved removal action");
        action
    }

    /// Add the obsolete tag to the download, unless it already carries it.
    pub async fn apply_obsolete_tag(
        &self,
        id: &str,
        clients: &[Arc<dyn DownloadClient>],
    ) -> Result<(), PolicyError> {
        let tag = self.obsolete_tag.as_ref().ok_or(PolicyError::NoObsoleteTag)?;

        let (client, torrent) = locate(id, clients)
            .await
            .ok_or_else(|| PolicyError::NotFound(id.to_string()))?;

        if torrent.has_tag(tag) {
            debug!(download_id = id, tag = %tag, "Obsolete tag already present");
            return Ok(());
        }

        client
            .add_tags(id, std::slice::from_ref(tag))
            .await
            .map_err(|source| PolicyError::Client {
                client: client.name().to_string(),
                source,
            })
    }
}

/// First client that knows `id`, with its view of the torrent.
async fn locate<'a>(
    id: &str,
    clients: &'a [Arc<dyn DownloadClient>],
) -> Option<(&'a Arc<dyn DownloadClient>, Torrent)> {
    for client in clients {
        match client.get_torrent(id).await {
            Ok(torrent) => return Some((client, torrent)),
            Err(DownloadClientError::TorrentNotFound(_)) => {}
            Err(e) => {
                debug!(download_id = id, client = client.name(), error = %e, "Lookup failed");
            }
        }
    }
    None
}
