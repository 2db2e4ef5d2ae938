use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::DoneSeedingConfig;
use crate::download_client::{Torrent, TorrentProperties, TorrentState};
use crate::jobs::context::JobContext;
use crate::jobs::job::{Job, JobCounters, JobError, JobStats};
use crate::metrics;

const NAME: &str = "remove_done_seeding";

/// Completed torrents that reached their ratio or seeding-time limit.
///
/// Acts immediately: no strikes and no tracker policy. Files are kept.
pub struct DoneSeedingJob {
    enabled: bool,
    target_tags: Vec<String>,
    target_categories: Vec<String>,
    counters: JobCounters,
}

impl DoneSeedingJob {
    pub fn new(config: &DoneSeedingConfig) -> Self {
        Self {
            enabled: config.enabled,
            target_tags: config.target_tags.clone(),
            target_categories: config.target_categories.clone(),
            counters: JobCounters::default(),
        }
    }

    fn matches_target(&self, torrent: &Torrent) -> bool {
        if self.target_tags.is_empty() && self.target_categories.is_empty() {
            return true;
        }
        let category = torrent
            .category
            .as_deref()
            .is_some_and(|c| self.target_categories.iter().any(|t| t == c));
        category || self.target_tags.iter().any(|t| torrent.has_tag(t))
    }
}

fn is_finished(torrent: &Torrent) -> bool {
    torrent.is_complete() && matches!(torrent.state, TorrentState::Paused | TorrentState::Seeding)
}

fn limits_reached(torrent: &Torrent, props: &TorrentProperties) -> bool {
    let ratio = props.ratio_limit > 0.0 && torrent.ratio >= props.ratio_limit;
    let time = props
        .seeding_time_limit
        .is_some_and(|limit| !limit.is_zero() && torrent.seed_time >= limit);
    ratio || time
}

#[async_trait]
impl Job for DoneSeedingJob {
    fn name(&self) -> &str {
        NAME
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        self.counters.reset();
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
                .filter(|t| is_finished(t) && self.matches_target(t))
            {
                let props = match ctx.guard(client.get_torrent_properties(&torrent.hash)).await? {
                    Ok(props) => props,
                    Err(e) => {
                        debug!(hash = %torrent.hash, error = %e, "Failed to get properties, skipping");
                        continue;
                    }
                };
                if !limits_reached(torrent, &props) {
                    continue;
                }

                self.counters.add_found(1);
                metrics::ITEMS_FOUND.with_label_values(&[NAME]).inc();

                if ctx.test_run {
                    info!(
                        client = client.name(),
                        hash = %torrent.hash,
                        name = %torrent.name,
                        ratio = torrent.ratio,
                        "[TEST RUN] Would remove torrent that finished seeding"
                    );
                    self.counters.add_removed(1);
                    metrics::ITEMS_ACTIONED
                        .with_label_values(&[NAME, "dry_run"])
                        .inc();
                    continue;
                }

                match ctx.guard(client.delete_torrent(&torrent.hash, false)).await? {
                    Ok(()) => {
                        info!(
                            client = client.name(),
                            hash = %torrent.hash,
                            name = %torrent.name,
                            ratio = torrent.ratio,
                            seed_time_secs = torrent.seed_time.as_secs(),
                            "Removed torrent that finished seeding"
                        );
                        self.counters.add_removed(1);
                        metrics::ITEMS_ACTIONED
                            .with_label_values(&[NAME, "remove"])
                            .inc();
                    }
                    Err(e) => {
                        warn!(client = client.name(), hash = %torrent.hash, error = %e, "Failed to remove torrent");
                    }
                }
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
