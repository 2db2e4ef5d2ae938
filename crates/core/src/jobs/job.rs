use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::context::JobContext;
use crate::arr::ArrError;
use crate::download_client::DownloadClientError;

/// Errors a job can return from [`Job::run`].
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Instance {instance}: {source}")]
    Arr {
        instance: String,
        #[source]
        source: ArrError,
    },

    #[error("Download client {client}: {source}")]
    DownloadClient {
        client: String,
        #[source]
        source: DownloadClientError,
    },

    /// Some instances or clients could not be processed.
    #[error("{} source(s) failed: {}", .0.len(), .0.join("; "))]
    Sources(Vec<String>),

    #[error("Cancelled")]
    Cancelled,
}

impl JobError {
    pub fn arr(instance: &str, source: ArrError) -> Self {
        JobError::Arr {
            instance: instance.to_string(),
            source,
        }
    }

    pub fn download_client(client: &str, source: DownloadClientError) -> Self {
        JobError::DownloadClient {
            client: client.to_string(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobError::Cancelled)
    }
}

/// Counts from a job's most recent run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    /// Items matching the job's predicate.
    pub found: usize,
    /// Items removed, tagged, searched or (in test runs) that would have been.
    pub removed: usize,
}

/// A unit of work run once per cycle.
#[async_trait]
pub trait Job: Send + Sync {
    /// Stable job name, also used as the strike record's `job` field.
    fn name(&self) -> &str;

    fn enabled(&self) -> bool;

    async fn run(&self, ctx: &JobContext) -> Result<(), JobError>;

    /// Counts from the last run, for jobs that track them.
    fn stats(&self) -> Option<JobStats> {
        None
    }
}

/// Per-run counters shared by the built-in jobs.
#[derive(Debug, Default)]
pub(crate) struct JobCounters {
    found: AtomicUsize,
    removed: AtomicUsize,
}

impl JobCounters {
    pub(crate) fn reset(&self) {
        self.found.store(0, Ordering::Relaxed);
        self.removed.store(0, Ordering::Relaxed);
    }

    pub(crate) fn add_found(&self, n: usize) {
        self.found.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_removed(&self, n: usize) {
        self.removed.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> JobStats {
        JobStats {
            found: self.found.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
        }
    }
}
