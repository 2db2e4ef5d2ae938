use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;

use crate::arr::LibraryEntity;
use crate::config::{JobConfig, JobDefaultsConfig};
use crate::jobs::context::JobContext;
use crate::jobs::job::{Job, JobCounters, JobError, JobStats};
use crate::jobs::strike::{profiles, Striker, Target};

const NAME: &str = "remove_unmonitored";

/// Downloads for library entries that are no longer monitored.
pub struct UnmonitoredJob {
    enabled: bool,
    max_strikes: u32,
    counters: JobCounters,
}

impl UnmonitoredJob {
    pub fn new(config: &JobConfig, defaults: &JobDefaultsConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_strikes: config.max_strikes_or(defaults),
            counters: JobCounters::default(),
        }
    }
}

#[async_trait]
impl Job for UnmonitoredJob {
    fn name(&self) -> &str {
        NAME
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        self.counters.reset();

        let mut snapshot = ctx.fetch_queues().await?;
        let striker = Striker::new(ctx, NAME, self.max_strikes, &self.counters);
        let mut seen = HashSet::new();

        for queue in &snapshot.queues {
            let client = &queue.client;
            let entity = match ctx.guard(client.get_system_status()).await? {
                Ok(status) => LibraryEntity::from_app_name(&status.app_name),
                Err(e) => {
                    snapshot
                        .failures
                        .push(format!("{}: system status: {}", client.name(), e));
                    continue;
                }
            };
            let Some(entity) = entity else {
                debug!(instance = client.name(), "No library entity for this application");
                continue;
            };

            for item in &queue.items {
                if item.download_id.is_empty() || seen.contains(item.download_id.as_str()) {
                    continue;
                }
                let Some(entity_id) = entity.id_of(item) else {
                    continue;
                };

                let monitored = match ctx
                    .guard(client.get_monitored_status(entity, entity_id))
                    .await?
                {
                    Ok(monitored) => monitored,
                    Err(e) => {
                        debug!(
                            instance = client.name(),
                            entity = entity.as_path(),
                            entity_id,
                            error = %e,
                            "Monitored lookup failed, skipping item"
                        );
                        continue;
                    }
                };

                if monitored {
                    continue;
                }
                seen.insert(item.download_id.as_str());
                striker
                    .strike(Target::Queue {
                        client,
                        item,
                        options: profiles::UNMONITORED,
                    })
                    .await?;
            }
        }

        match snapshot.error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn stats(&self) -> Option<JobStats> {
        Some(self.counters.snapshot())
    }
}
