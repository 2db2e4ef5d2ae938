use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{JobConfig, JobDefaultsConfig};
use crate::jobs::context::JobContext;
use crate::jobs::job::{Job, JobCounters, JobError, JobStats};
use crate::jobs::strike::{Striker, Target};

const NAME: &str = "remove_orphans";

/// Torrents no *arr instance is tracking.
///
/// Needs a complete picture: any failed queue fetch aborts the run.
pub struct OrphansJob {
    enabled: bool,
    max_strikes: u32,
    counters: JobCounters,
}

impl OrphansJob {
    pub fn new(config: &JobConfig, defaults: &JobDefaultsConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_strikes: config.max_strikes_or(defaults),
            counters: JobCounters::default(),
        }
    }
}

#[async_trait]
impl Job for OrphansJob {
    fn name(&self) -> &str {
        NAME
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        self.counters.reset();

        if ctx.download_clients.is_empty() {
            debug!("No download clients registered, skipping orphan check");
            return Ok(());
        }

        let snapshot = ctx.fetch_queues().await?;
        if let Some(e) = snapshot.error() {
            warn!(error = %e, "Incomplete queue snapshot, not checking for orphans");
            return Err(e);
        }

        let tracked: HashSet<String> = snapshot
            .queues
            .iter()
            .flat_map(|q| q.items.iter())
            .filter(|item| !item.download_id.is_empty())
            .map(|item| item.download_id.to_lowercase())
            .collect();
        debug!(tracked = tracked.len(), "Collected tracked downloads");

        let striker = Striker::new(ctx, NAME, self.max_strikes, &self.counters);
        let mut failures = Vec::new();

        for client in &ctx.download_clients {
            let torrents = match ctx.guard(client.get_torrents()).await? {
                Ok(torrents) => torrents,
                Err(e) => {
                    warn!(client = client.name(), error = %e, "Failed to list torrents");
                    failures.push(format!("{}: {}", client.name(), e));
                    continue;
                }
            };

            for torrent in torrents
                .iter()
                .filter(|t| !tracked.contains(&t.hash.to_lowercase()))
            {
                debug!(
                    client = client.name(),
                    hash = %torrent.hash,
                    name = %torrent.name,
                    state = torrent.state.as_str(),
                    "Found orphaned torrent"
                );
                striker.strike(Target::Torrent { client, torrent }).await?;
            }
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
