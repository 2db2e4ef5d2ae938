use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::arr::{ArrClient, ArrError, WantedItem};
use crate::config::SearchJobConfig;
use crate::jobs::context::JobContext;
use crate::jobs::job::{Job, JobCounters, JobError, JobStats};
use crate::metrics;

/// Which wanted list a [`SearchJob`] works through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    /// Monitored items with no file.
    Missing,
    /// Monitored items whose file is below the quality cutoff.
    CutoffUnmet,
}

impl SearchKind {
    pub fn job_name(&self) -> &'static str {
        match self {
            SearchKind::Missing => "search_missing",
            SearchKind::CutoffUnmet => "search_unmet_cutoff",
        }
    }

    async fn list(&self, client: &dyn ArrClient) -> Result<Vec<WantedItem>, ArrError> {
        match self {
            SearchKind::Missing => client.missing_items().await,
            SearchKind::CutoffUnmet => client.cutoff_unmet_items().await,
        }
    }
}

/// Triggers searches on every instance that supports them.
///
/// One task per instance; trigger calls across all instances share a semaphore
/// of `max_concurrent_searches` permits.
pub struct SearchJob {
    kind: SearchKind,
    enabled: bool,
    min_days_between_searches: u32,
    max_concurrent_searches: usize,
    counters: Arc<JobCounters>,
}

impl SearchJob {
    pub fn new(kind: SearchKind, config: &SearchJobConfig) -> Self {
        Self {
            kind,
            enabled: config.enabled,
            min_days_between_searches: config.min_days_between_searches,
            max_concurrent_searches: config.max_concurrent_searches.max(1),
            counters: Arc::new(JobCounters::default()),
        }
    }

    pub fn missing(config: &SearchJobConfig) -> Self {
        Self::new(SearchKind::Missing, config)
    }

    pub fn cutoff_unmet(config: &SearchJobConfig) -> Self {
        Self::new(SearchKind::CutoffUnmet, config)
    }

    /// Recency window, only applied to missing-item searches.
    fn recency_window(&self) -> Option<Duration> {
        (self.kind == SearchKind::Missing && self.min_days_between_searches > 0)
            .then(|| Duration::days(i64::from(self.min_days_between_searches)))
    }
}

/// Per-task inputs, cloned into each spawned instance task.
#[derive(Clone)]
struct SearchTask {
    kind: SearchKind,
    recency: Option<Duration>,
    test_run: bool,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    counters: Arc<JobCounters>,
}

impl SearchTask {
    async fn run(self, client: Arc<dyn ArrClient>) -> Result<(), String> {
        let job = self.kind.job_name();
        let name = client.name().to_string();

        if self.cancel.is_cancelled() {
            return Err(format!("{}: cancelled", name));
        }
        let items = self
            .kind
            .list(client.as_ref())
            .await
            .map_err(|e| format!("{}: {}", name, e))?;

        let now = Utc::now();
        let eligible: Vec<WantedItem> = items
            .into_iter()
            .filter(|item| match (self.recency, item.last_search_time) {
                (Some(window), Some(last)) => now - last >= window,
                _ => true,
            })
            .collect();

        self.counters.add_found(eligible.len());
        debug!(job, instance = %name, eligible = eligible.len(), "Listed wanted items");

        let results = join_all(
            eligible
                .iter()
                .map(|item| self.search(client.as_ref(), item)),
        )
        .await;
        let failed = results.iter().filter(|ok| !**ok).count();

        if failed > 0 {
            Err(format!("{}: {} search(es) failed", name, failed))
        } else {
            Ok(())
        }
    }

    /// Trigger one search under a semaphore permit. Returns false on failure.
    async fn search(&self, client: &dyn ArrClient, item: &WantedItem) -> bool {
        let job = self.kind.job_name();

        let _permit = tokio::select! {
            _ = self.cancel.cancelled() => return false,
            permit = self.semaphore.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => return false,
            },
        };

        if self.test_run {
            info!(
                job,
                instance = client.name(),
                item_id = item.id,
                title = %item.title,
                "[TEST RUN] Would trigger search"
            );
            self.counters.add_removed(1);
            return true;
        }

        // A trigger already sent is allowed to finish.
        if self.cancel.is_cancelled() {
            return false;
        }
        let ids = [item.id];
        let result = client.trigger_search(&ids).await;

        match result {
            Ok(()) => {
                debug!(
                    job,
                    instance = client.name(),
                    item_id = item.id,
                    title = %item.title,
                    "Triggered search"
                );
                self.counters.add_removed(1);
                metrics::SEARCHES_TRIGGERED.with_label_values(&[job]).inc();
                true
            }
            Err(e) => {
                warn!(
                    job,
                    instance = client.name(),
                    item_id = item.id,
                    error = %e,
                    "Failed to trigger search"
                );
                false
            }
        }
    }
}

#[async_trait]
impl Job for SearchJob {
    fn name(&self) -> &str {
        self.kind.job_name()
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        self.counters.reset();

        let task = SearchTask {
            kind: self.kind,
            recency: self.recency_window(),
            test_run: ctx.test_run,
            semaphore: Arc::new(Semaphore::new(self.max_concurrent_searches)),
            cancel: ctx.cancel.clone(),
            counters: Arc::clone(&self.counters),
        };

        let mut instances = JoinSet::new();
        for client in &ctx.arr_clients {
            if client.kind().search_command().is_none() {
                debug!(
                    job = self.kind.job_name(),
                    instance = client.name(),
                    "Search not supported, skipping"
                );
                continue;
            }
            instances.spawn(task.clone().run(Arc::clone(client)));
        }

        let mut failures = Vec::new();
        while let Some(result) = instances.join_next().await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(e),
                Err(e) => failures.push(format!("task failed: {}", e)),
            }
        }

        let stats = self.counters.snapshot();
        debug!(
            job = self.kind.job_name(),
            found = stats.found,
            searched = stats.removed,
            errors = failures.len(),
            "Search job completed"
        );

        if ctx.cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(JobError::Sources(failures))
        }
    }

    fn stats(&self) -> Option<JobStats> {
        Some(self.counters.snapshot())
    }
}
