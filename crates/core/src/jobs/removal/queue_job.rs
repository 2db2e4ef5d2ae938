use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::arr::{DeleteOptions, QueueItem};
use crate::config::{JobConfig, JobDefaultsConfig};
use crate::jobs::context::JobContext;
use crate::jobs::job::{Job, JobCounters, JobError, JobStats};
use crate::jobs::strike::{Striker, Target};

/// Result of checking one queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The item matches; add a strike.
    Flag,
    /// The item recovered; clear its strikes.
    Recovered,
    /// Not applicable; leave any strikes alone.
    Pass,
}

/// Category-specific part of a queue-based removal job.
pub trait Detector: Send + Sync + 'static {
    /// Job name.
    const NAME: &'static str;

    /// Options for the delete call once an item reaches its strike limit.
    const PROFILE: DeleteOptions;

    fn check(&self, item: &QueueItem, now: DateTime<Utc>) -> Verdict;
}

/// A removal job over every instance's queue.
pub struct QueueJob<D> {
    detector: D,
    enabled: bool,
    max_strikes: u32,
    counters: JobCounters,
}

impl<D: Detector> QueueJob<D> {
    pub fn new(detector: D, config: &JobConfig, defaults: &JobDefaultsConfig) -> Self {
        Self {
            detector,
            enabled: config.enabled,
            max_strikes: config.max_strikes_or(defaults),
            counters: JobCounters::default(),
        }
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn max_strikes(&self) -> u32 {
        self.max_strikes
    }
}

#[async_trait]
impl<D: Detector> Job for QueueJob<D> {
    fn name(&self) -> &str {
        D::NAME
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        self.counters.reset();
        debug!(
            job = D::NAME,
            test_run = ctx.test_run,
            max_strikes = self.max_strikes,
            "Starting job"
        );

        let snapshot = ctx.fetch_queues().await?;
        let striker = Striker::new(ctx, D::NAME, self.max_strikes, &self.counters);
        let now = Utc::now();
        // Several queue entries can share one download (season packs).
        let mut seen = HashSet::new();

        for queue in &snapshot.queues {
            for item in &queue.items {
                if item.download_id.is_empty() || !seen.insert(item.download_id.as_str()) {
                    continue;
                }

                match self.detector.check(item, now) {
                    Verdict::Pass => {}
                    Verdict::Recovered => {
                        if ctx.ledger.get(&item.download_id).await > 0 {
                            ctx.ledger.reset(&item.download_id).await;
                            debug!(
                                job = D::NAME,
                                download_id = %item.download_id,
                                title = %item.title,
                                "Item recovered, strikes cleared"
                            );
                        }
                    }
                    Verdict::Flag => {
                        striker
                            .strike(Target::Queue {
                                client: &queue.client,
                                item,
                                options: D::PROFILE,
                            })
                            .await?;
                    }
                }
            }
        }

        let stats = self.counters.snapshot();
        debug!(
            job = D::NAME,
            found = stats.found,
            removed = stats.removed,
            "Job completed"
        );

        match snapshot.error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn stats(&self) -> Option<JobStats> {
        Some(self.counters.snapshot())
    }
}
