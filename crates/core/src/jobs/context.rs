use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::job::JobError;
use crate::arr::{ArrClient, QueueItem};
use crate::download_client::DownloadClient;
use crate::policy::RemovalPolicy;
use crate::strikes::StrikeLedger;

/// Everything a job needs for one run.
///
/// Built by the [`Manager`](super::Manager) at the start of each job; clients
/// are listed in registration order.
#[derive(Clone)]
pub struct JobContext {
    pub ledger: Arc<StrikeLedger>,
    pub arr_clients: Vec<Arc<dyn ArrClient>>,
    pub download_clients: Vec<Arc<dyn DownloadClient>>,
    pub policy: Arc<RemovalPolicy>,
    /// Log intended actions instead of performing them.
    pub test_run: bool,
    pub cancel: CancellationToken,
}

/// One instance's queue.
#[derive(Clone)]
pub struct InstanceQueue {
    pub client: Arc<dyn ArrClient>,
    pub items: Vec<QueueItem>,
}

/// Queues from every instance that answered, plus the ones that didn't.
#[derive(Clone, Default)]
pub struct QueueSnapshot {
    pub queues: Vec<InstanceQueue>,
    /// `"{instance}: {error}"` for each failed fetch.
    pub failures: Vec<String>,
}

impl QueueSnapshot {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Aggregate error for the failed fetches, if any.
    pub fn error(&self) -> Option<JobError> {
        (!self.failures.is_empty()).then(|| JobError::Sources(self.failures.clone()))
    }
}

impl JobContext {
    /// Start `fut` unless the cycle has been cancelled.
    ///
    /// Cancellation is only observed before a call starts. A call already in
    /// flight runs to completion so its outcome is never lost.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, JobError> {
        if self.cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        Ok(fut.await)
    }

    pub fn arr_client(&self, name: &str) -> Option<&Arc<dyn ArrClient>> {
        self.arr_clients.iter().find(|c| c.name() == name)
    }

    /// Fetch every instance's queue, continuing past per-instance errors.
    pub async fn fetch_queues(&self) -> Result<QueueSnapshot, JobError> {
        let mut snapshot = QueueSnapshot::default();

        for client in &self.arr_clients {
            match self.guard(client.get_queue()).await? {
                Ok(items) => {
                    debug!(instance = client.name(), items = items.len(), "Retrieved queue");
                    snapshot.queues.push(InstanceQueue {
                        client: Arc::clone(client),
                        items,
                    });
                }
                Err(e) => {
                    warn!(instance = client.name(), error = %e, "Failed to get queue");
                    snapshot.failures.push(format!("{}: {}", client.name(), e));
                }
            }
        }

        Ok(snapshot)
    }
}
