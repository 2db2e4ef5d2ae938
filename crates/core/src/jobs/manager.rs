//! Cycle orchestration.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::context::JobContext;
use super::job::{Job, JobError, JobStats};
use super::removal::{
    BadFiles, DoneSeedingJob, FailedDownloads, FailedImports, MetadataFailed, MissingFiles,
    OrphansJob, QueueJob, Slow, Stalled, UnmonitoredJob,
};
use super::search::SearchJob;
use crate::arr::{ArrClient, QueueItem};
use crate::config::Config;
use crate::download_client::DownloadClient;
use crate::metrics;
use crate::policy::RemovalPolicy;
use crate::strikes::{StrikeError, StrikeLedger};

/// Strike records not touched for this long are dropped at the end of a cycle.
pub const CLEANUP_HORIZON: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Returned by [`Manager::run_all`] when at least one job failed.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("{count} job(s) failed: {}", .jobs.join(", "))]
    JobsFailed { count: usize, jobs: Vec<String> },
}

/// Summary of one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub jobs_run: usize,
    pub jobs_failed: usize,
    /// Per-job counts, for jobs that report them.
    pub jobs: BTreeMap<String, JobStats>,
    pub strikes_added: u64,
    pub strikes_reset: u64,
    pub strikes_tracked: usize,
    /// `"{job}: {error}"` for each failed job.
    pub errors: Vec<String>,
}

impl CycleStats {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            duration_ms: 0,
            jobs_run: 0,
            jobs_failed: 0,
            jobs: BTreeMap::new(),
            strikes_added: 0,
            strikes_reset: 0,
            strikes_tracked: 0,
            errors: Vec::new(),
        }
    }

    pub fn total_found(&self) -> usize {
        self.jobs.values().map(|s| s.found).sum()
    }

    pub fn total_removed(&self) -> usize {
        self.jobs.values().map(|s| s.removed).sum()
    }
}

/// Owns the ledger, the registered clients and the job list, and runs cycles.
///
/// Registration happens before the manager is shared; cycles never overlap.
pub struct Manager {
    ledger: Arc<StrikeLedger>,
    policy: Arc<RemovalPolicy>,
    test_run: bool,
    jobs: Vec<Box<dyn Job>>,
    arr_clients: Vec<Arc<dyn ArrClient>>,
    download_clients: Vec<Arc<dyn DownloadClient>>,
    last_stats: RwLock<Option<CycleStats>>,
    cycle_lock: Mutex<()>,
}

impl Manager {
    pub fn new(ledger: Arc<StrikeLedger>, policy: RemovalPolicy, test_run: bool) -> Self {
        Self {
            ledger,
            policy: Arc::new(policy),
            test_run,
            jobs: Vec::new(),
            arr_clients: Vec::new(),
            download_clients: Vec::new(),
            last_stats: RwLock::new(None),
            cycle_lock: Mutex::new(()),
        }
    }

    /// Append a job; jobs run in registration order.
    pub fn register_job(&mut self, job: impl Job + 'static) {
        debug!(job = job.name(), enabled = job.enabled(), "Registered job");
        self.jobs.push(Box::new(job));
    }

    /// Register every built-in job in its fixed run order.
    ///
    /// Disabled jobs are registered too and skipped at run time.
    pub fn register_configured_jobs(&mut self, config: &Config) {
        let jobs = &config.jobs;
        let defaults = &config.job_defaults;

        self.register_job(QueueJob::new(Stalled, &jobs.remove_stalled, defaults));
        self.register_job(QueueJob::new(
            FailedImports::from_config(&jobs.remove_failed_imports),
            &jobs.remove_failed_imports,
            defaults,
        ));
        self.register_job(QueueJob::new(
            FailedDownloads,
            &jobs.remove_failed_downloads,
            defaults,
        ));
        self.register_job(OrphansJob::new(&jobs.remove_orphans, defaults));
        self.register_job(QueueJob::new(
            MissingFiles,
            &jobs.remove_missing_files,
            defaults,
        ));
        self.register_job(UnmonitoredJob::new(&jobs.remove_unmonitored, defaults));
        self.register_job(QueueJob::new(
            Slow::from_config(&jobs.remove_slow, defaults),
            &jobs.remove_slow,
            defaults,
        ));
        self.register_job(QueueJob::new(BadFiles, &jobs.remove_bad_files, defaults));
        self.register_job(QueueJob::new(
            MetadataFailed,
            &jobs.remove_metadata_failed,
            defaults,
        ));
        self.register_job(DoneSeedingJob::new(&jobs.remove_done_seeding));
        self.register_job(SearchJob::missing(&jobs.search_missing));
        self.register_job(SearchJob::cutoff_unmet(&jobs.search_unmet_cutoff));
    }

    pub fn register_arr_client(&mut self, client: Arc<dyn ArrClient>) {
        debug!(instance = client.name(), kind = %client.kind(), "Registered arr client");
        self.arr_clients.push(client);
    }

    pub fn register_download_client(&mut self, client: Arc<dyn DownloadClient>) {
        debug!(client = client.name(), "Registered download client");
        self.download_clients.push(client);
    }

    pub fn get_arr_client(&self, name: &str) -> Option<Arc<dyn ArrClient>> {
        self.arr_clients.iter().find(|c| c.name() == name).cloned()
    }

    pub fn get_download_client(&self, name: &str) -> Option<Arc<dyn DownloadClient>> {
        self.download_clients
            .iter()
            .find(|c| c.name() == name)
            .cloned()
    }

    pub fn ledger(&self) -> &Arc<StrikeLedger> {
        &self.ledger
    }

    pub fn test_run(&self) -> bool {
        self.test_run
    }

    /// Names of the registered jobs, in run order.
    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.name()).collect()
    }

    fn context(&self, cancel: &CancellationToken) -> JobContext {
        JobContext {
            ledger: Arc::clone(&self.ledger),
            arr_clients: self.arr_clients.clone(),
            download_clients: self.download_clients.clone(),
            policy: Arc::clone(&self.policy),
            test_run: self.test_run,
            cancel: cancel.clone(),
        }
    }

    /// Every instance's queue, keyed by instance name.
    ///
    /// Instances that fail are left out and named in the returned error.
    pub async fn get_all_queues(
        &self,
        cancel: &CancellationToken,
    ) -> (HashMap<String, Vec<QueueItem>>, Option<JobError>) {
        match self.context(cancel).fetch_queues().await {
            Ok(snapshot) => {
                let error = snapshot.error();
                let queues = snapshot
                    .queues
                    .into_iter()
                    .map(|q| (q.client.name().to_string(), q.items))
                    .collect();
                (queues, error)
            }
            Err(e) => (HashMap::new(), Some(e)),
        }
    }

    /// Run one cycle: every enabled job in order, then ledger bookkeeping.
    ///
    /// A failing job never stops the cycle. Jobs not yet started when
    /// `cancel` fires are skipped without counting as failed.
    pub async fn run_all(&self, cancel: &CancellationToken) -> Result<(), CycleError> {
        let _cycle = self.cycle_lock.lock().await;
        let timer = Instant::now();
        let mut stats = CycleStats::new(Utc::now());
        let mut failed_jobs = Vec::new();
        let ctx = self.context(cancel);

        for job in &self.jobs {
            if !job.enabled() {
                debug!(job = job.name(), "Skipping disabled job");
                continue;
            }
            if cancel.is_cancelled() {
                info!(job = job.name(), "Cancelled, not starting remaining jobs");
                break;
            }

            debug!(job = job.name(), "Running job");
            stats.jobs_run += 1;

            match job.run(&ctx).await {
                Ok(()) => {
                    metrics::JOB_RUNS
                        .with_label_values(&[job.name(), "success"])
                        .inc();
                }
                Err(JobError::Cancelled) => {
                    info!(job = job.name(), "Job interrupted by cancellation");
                    metrics::JOB_RUNS
                        .with_label_values(&[job.name(), "cancelled"])
                        .inc();
                }
                Err(e) => {
                    error!(job = job.name(), error = %e, "Job failed, continuing");
                    metrics::JOB_RUNS
                        .with_label_values(&[job.name(), "error"])
                        .inc();
                    stats.jobs_failed += 1;
                    stats.errors.push(format!("{}: {}", job.name(), e));
                    failed_jobs.push(job.name().to_string());
                }
            }

            if let Some(job_stats) = job.stats() {
                stats.jobs.insert(job.name().to_string(), job_stats);
            }
        }

        let (added, reset) = self.ledger.reset_cycle_counters().await;
        stats.strikes_added = added;
        stats.strikes_reset = reset;

        if let Err(e) = self.ledger.save().await {
            error!(error = %e, "Failed to save strikes");
        }

        let removed = self.ledger.cleanup(CLEANUP_HORIZON).await;
        if removed > 0 {
            debug!(removed, "Dropped stale strike records");
        }
        stats.strikes_tracked = self.ledger.count().await;

        stats.finished_at = Utc::now();
        let elapsed = timer.elapsed();
        stats.duration_ms = elapsed.as_millis() as u64;
        metrics::CYCLE_DURATION.observe(elapsed.as_secs_f64());

        log_cycle_summary(&stats);
        *self.last_stats.write().await = Some(stats);

        if failed_jobs.is_empty() {
            Ok(())
        } else {
            Err(CycleError::JobsFailed {
                count: failed_jobs.len(),
                jobs: failed_jobs,
            })
        }
    }

    /// Stats of the most recent cycle.
    pub async fn last_stats(&self) -> Option<CycleStats> {
        self.last_stats.read().await.clone()
    }

    /// Persist the ledger. Call once on shutdown.
    pub async fn close(&self) -> Result<(), StrikeError> {
        let _cycle = self.cycle_lock.lock().await;
        self.ledger.save().await
    }
}

/// One structured line per cycle, plus a warning listing job errors.
fn log_cycle_summary(stats: &CycleStats) {
    let active: BTreeMap<&str, (usize, usize)> = stats
        .jobs
        .iter()
        .filter(|(_, s)| s.found > 0 || s.removed > 0)
        .map(|(name, s)| (name.as_str(), (s.found, s.removed)))
        .collect();

    info!(
        duration_ms = stats.duration_ms,
        jobs_run = stats.jobs_run,
        jobs_failed = stats.jobs_failed,
        found = stats.total_found(),
        removed = stats.total_removed(),
        strikes_added = stats.strikes_added,
        strikes_cleared = stats.strikes_reset,
        strikes_tracked = stats.strikes_tracked,
        jobs = ?active,
        "Cycle complete"
    );

    if !stats.errors.is_empty() {
        warn!(count = stats.errors.len(), errors = ?stats.errors, "Cycle errors");
    }
}
