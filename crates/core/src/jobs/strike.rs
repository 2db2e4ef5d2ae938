//! Strike-accumulate-then-act workflow shared by the removal jobs.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::context::JobContext;
use super::job::{JobCounters, JobError};
use crate::arr::{ArrClient, DeleteOptions, QueueItem};
use crate::download_client::{DownloadClient, Torrent};
use crate::metrics;
use crate::policy::RemovalAction;

/// Delete profiles per removal category: `(remove_from_client, blocklist, skip_redownload)`.
pub(crate) mod profiles {
    use crate::arr::DeleteOptions;

    pub const STALLED: DeleteOptions = DeleteOptions::new(true, false, true);
    pub const SLOW: DeleteOptions = DeleteOptions::new(true, false, false);
    pub const FAILED_DOWNLOAD: DeleteOptions = DeleteOptions::new(true, true, true);
    pub const FAILED_IMPORT: DeleteOptions = DeleteOptions::new(true, false, true);
    pub const MISSING_FILES: DeleteOptions = DeleteOptions::new(true, false, true);
    pub const BAD_FILES: DeleteOptions = DeleteOptions::new(true, true, false);
    pub const METADATA_FAILED: DeleteOptions = DeleteOptions::new(true, false, true);
    pub const UNMONITORED: DeleteOptions = DeleteOptions::new(true, false, true);
}

/// A flagged item and the collaborator that owns it.
pub(crate) enum Target<'a> {
    Queue {
        client: &'a Arc<dyn ArrClient>,
        item: &'a QueueItem,
        options: DeleteOptions,
    },
    Torrent {
        client: &'a Arc<dyn DownloadClient>,
        torrent: &'a Torrent,
    },
}

impl Target<'_> {
    fn id(&self) -> &str {
        match self {
            Target::Queue { item, .. } => &item.download_id,
            Target::Torrent { torrent, .. } => &torrent.hash,
        }
    }

    fn title(&self) -> &str {
        match self {
            Target::Queue { item, .. } => &item.title,
            Target::Torrent { torrent, .. } => &torrent.name,
        }
    }

    fn source(&self) -> &str {
        match self {
            Target::Queue { client, .. } => client.name(),
            Target::Torrent { client, .. } => client.name(),
        }
    }

    async fn delete(&self, ctx: &JobContext) -> Result<(), JobError> {
        match self {
            Target::Queue {
                client,
                item,
                options,
            } => ctx
                .guard(client.delete_queue_item(item.id, *options))
                .await?
                .map_err(|e| JobError::arr(client.name(), e)),
            Target::Torrent { client, torrent } => ctx
                .guard(client.delete_torrent(&torrent.hash, false))
                .await?
                .map_err(|e| JobError::download_client(client.name(), e)),
        }
    }
}

/// What happened to one flagged item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Below the strike limit.
    Pending(u32),
    Removed,
    Tagged,
    /// Protected or excluded by tracker handling; strikes kept.
    Skipped,
    /// Test run: would have been removed or tagged.
    Simulated,
    /// The delete or tag call failed; strikes kept.
    Failed,
}

impl Outcome {
    pub(crate) fn is_handled(&self) -> bool {
        matches!(self, Outcome::Removed | Outcome::Tagged | Outcome::Simulated)
    }
}

/// Applies the strike workflow for one job.
pub(crate) struct Striker<'a> {
    ctx: &'a JobContext,
    job: &'a str,
    max_strikes: u32,
    counters: &'a JobCounters,
}

impl<'a> Striker<'a> {
    pub(crate) fn new(
        ctx: &'a JobContext,
        job: &'a str,
        max_strikes: u32,
        counters: &'a JobCounters,
    ) -> Self {
        Self {
            ctx,
            job,
            max_strikes,
            counters,
        }
    }

    /// Strike `target`, and act on it once it reaches the limit.
    ///
    /// Only cancellation is returned as an error; collaborator failures are
    /// logged and reported as [`Outcome::Failed`].
    pub(crate) async fn strike(&self, target: Target<'_>) -> Result<Outcome, JobError> {
        let ledger = &self.ctx.ledger;
        let id = target.id();

        self.counters.add_found(1);
        metrics::ITEMS_FOUND.with_label_values(&[self.job]).inc();

        let strikes = ledger.add(id, self.job, target.title()).await;
        debug!(
            job = self.job,
            download_id = id,
            title = target.title(),
            source = target.source(),
            strikes,
            max_strikes = self.max_strikes,
            "Added strike"
        );

        if !ledger.has_exceeded(id, self.max_strikes).await {
            return Ok(Outcome::Pending(strikes));
        }

        let action = self
            .ctx
            .guard(
                self.ctx
                    .policy
                    .resolve(id, &self.ctx.download_clients),
            )
            .await?;

        let outcome = match action {
            RemovalAction::Skip => {
                info!(
                    job = self.job,
                    download_id = id,
                    title = target.title(),
                    strikes,
                    "Skipping removal per tracker policy"
                );
                Outcome::Skipped
            }
            RemovalAction::Tag => self.tag(&target, strikes).await?,
            RemovalAction::Remove => self.remove(&target, strikes).await?,
        };

        let label = match outcome {
            Outcome::Simulated => Some("dry_run"),
            Outcome::Removed => Some("remove"),
            Outcome::Tagged => Some("tag"),
            Outcome::Skipped => Some("skip"),
            Outcome::Pending(_) | Outcome::Failed => None,
        };
        if let Some(label) = label {
            metrics::ITEMS_ACTIONED
                .with_label_values(&[self.job, label])
                .inc();
        }
        if outcome.is_handled() {
            self.counters.add_removed(1);
        }

        Ok(outcome)
    }

    async fn tag(&self, target: &Target<'_>, strikes: u32) -> Result<Outcome, JobError> {
        let id = target.id();
        let tag = self.ctx.policy.obsolete_tag().unwrap_or_default();

        if self.ctx.test_run {
            info!(
                job = self.job,
                download_id = id,
                title = target.title(),
                tag,
                strikes,
                "[TEST RUN] Would tag as obsolete"
            );
            return Ok(Outcome::Simulated);
        }

        let result = self
            .ctx
            .guard(
                self.ctx
                    .policy
                    .apply_obsolete_tag(id, &self.ctx.download_clients),
            )
            .await?;

        match result {
            Ok(()) => {
                self.ctx.ledger.reset(id).await;
                info!(
                    job = self.job,
                    download_id = id,
                    title = target.title(),
                    tag,
                    strikes,
                    "Tagged as obsolete"
                );
                Ok(Outcome::Tagged)
            }
            Err(e) => {
                warn!(
                    job = self.job,
                    download_id = id,
                    title = target.title(),
                    error = %e,
                    "Failed to apply obsolete tag"
                );
                Ok(Outcome::Failed)
            }
        }
    }

    async fn remove(&self, target: &Target<'_>, strikes: u32) -> Result<Outcome, JobError> {
        let id = target.id();

        if self.ctx.test_run {
            info!(
                job = self.job,
                download_id = id,
                title = target.title(),
                source = target.source(),
                strikes,
                "[TEST RUN] Would remove"
            );
            return Ok(Outcome::Simulated);
        }

        match target.delete(self.ctx).await {
            Ok(()) => {
                self.ctx.ledger.reset(id).await;
                info!(
                    job = self.job,
                    download_id = id,
                    title = target.title(),
                    source = target.source(),
                    strikes,
                    "Removed"
                );
                Ok(Outcome::Removed)
            }
            Err(JobError::Cancelled) => Err(JobError::Cancelled),
            Err(e) => {
                error!(
                    job = self.job,
                    download_id = id,
                    title = target.title(),
                    error = %e,
                    "Failed to remove"
                );
                Ok(Outcome::Failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arr::ArrKind;
    use crate::policy::RemovalPolicy;
    use crate::strikes::StrikeLedger;
    use crate::testing::{fixtures, MockArrClient, MockDownloadClient};
    use tokio_util::sync::CancellationToken;

    fn context(
        policy: RemovalPolicy,
        download_clients: Vec<Arc<dyn DownloadClient>>,
        test_run: bool,
    ) -> JobContext {
        JobContext {
            ledger: Arc::new(StrikeLedger::in_memory()),
            arr_clients: Vec::new(),
            download_clients,
            policy: Arc::new(policy),
            test_run,
            cancel: CancellationToken::new(),
        }
    }

    async fn sonarr_with(item: &QueueItem) -> Arc<dyn ArrClient> {
        let client = MockArrClient::new("sonarr", ArrKind::Sonarr);
        client.add_queue_item(item.clone()).await;
        Arc::new(client)
    }

    #[tokio::test]
    async fn test_removes_on_reaching_limit() {
        let item = fixtures::stalled_item(1, "ABC", "Show.S01E01");
        let client = sonarr_with(&item).await;
        let ctx = context(RemovalPolicy::remove_all(), Vec::new(), false);
        let counters = JobCounters::default();
        let striker = Striker::new(&ctx, "remove_stalled", 2, &counters);

        let target = || Target::Queue {
            client: &client,
            item: &item,
            options: profiles::STALLED,
        };

        assert_eq!(striker.strike(target()).await.unwrap(), Outcome::Pending(1));
        assert_eq!(striker.strike(target()).await.unwrap(), Outcome::Removed);
        assert_eq!(ctx.ledger.get("ABC").await, 0);
        assert_eq!(counters.snapshot().found, 2);
        assert_eq!(counters.snapshot().removed, 1);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_strikes() {
        let item = fixtures::stalled_item(1, "ABC", "Show.S01E01");
        // Not in the mock's queue, so the delete fails.
        let client: Arc<dyn ArrClient> = Arc::new(MockArrClient::new("sonarr", ArrKind::Sonarr));
        let ctx = context(RemovalPolicy::remove_all(), Vec::new(), false);
        let counters = JobCounters::default();
        let striker = Striker::new(&ctx, "remove_stalled", 1, &counters);

        let outcome = striker
            .strike(Target::Queue {
                client: &client,
                item: &item,
                options: profiles::STALLED,
            })
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(ctx.ledger.get("ABC").await, 1);
        assert_eq!(counters.snapshot().removed, 0);
    }

    #[tokio::test]
    async fn test_test_run_counts_without_side_effects() {
        let item = fixtures::stalled_item(1, "ABC", "Show.S01E01");
        let mock = Arc::new(MockArrClient::new("sonarr", ArrKind::Sonarr));
        mock.add_queue_item(item.clone()).await;
        let client: Arc<dyn ArrClient> = mock.clone();
        let ctx = context(RemovalPolicy::remove_all(), Vec::new(), true);
        let counters = JobCounters::default();
        let striker = Striker::new(&ctx, "remove_stalled", 1, &counters);

        let outcome = striker
            .strike(Target::Queue {
                client: &client,
                item: &item,
                options: profiles::STALLED,
            })
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Simulated);
        assert!(mock.delete_calls().await.is_empty());
        assert_eq!(ctx.ledger.get("ABC").await, 1);
        assert_eq!(counters.snapshot().removed, 1);
    }

    #[tokio::test]
    async fn test_protected_item_is_skipped_and_keeps_strikes() {
        let item = fixtures::stalled_item(1, "abc", "Show.S01E01");
        let client = sonarr_with(&item).await;
        let qbit = Arc::new(MockDownloadClient::new("qbit"));
        qbit.add_torrent(fixtures::tagged_torrent("abc", &["keep"]))
            .await;
        let policy = RemovalPolicy::new("remove", "remove", None, Some("keep".into()));
        let ctx = context(policy, vec![qbit as Arc<dyn DownloadClient>], false);
        let counters = JobCounters::default();
        let striker = Striker::new(&ctx, "remove_stalled", 1, &counters);

        let outcome = striker
            .strike(Target::Queue {
                client: &client,
                item: &item,
                options: profiles::STALLED,
            })
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(ctx.ledger.get("abc").await, 1);
        assert_eq!(counters.snapshot().removed, 0);
    }

    #[tokio::test]
    async fn test_tag_resolution_tags_and_resets() {
        let item = fixtures::stalled_item(1, "abc", "Show.S01E01");
        let mock = Arc::new(MockArrClient::new("sonarr", ArrKind::Sonarr));
        mock.add_queue_item(item.clone()).await;
        let client: Arc<dyn ArrClient> = mock.clone();
        let qbit = Arc::new(MockDownloadClient::new("qbit"));
        qbit.add_torrent(fixtures::torrent("abc")).await;
        qbit.set_private("abc", true).await;
        let policy =
            RemovalPolicy::new("obsolete_tag", "remove", Some("obsolete".into()), None);
        let ctx = context(policy, vec![qbit.clone() as Arc<dyn DownloadClient>], false);
        let counters = JobCounters::default();
        let striker = Striker::new(&ctx, "remove_stalled", 1, &counters);

        let outcome = striker
            .strike(Target::Queue {
                client: &client,
                item: &item,
                options: profiles::STALLED,
            })
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Tagged);
        assert_eq!(
            qbit.tag_calls().await,
            vec![("abc".to_string(), vec!["obsolete".to_string()])]
        );
        assert!(mock.delete_calls().await.is_empty());
        assert_eq!(ctx.ledger.get("abc").await, 0);
        assert_eq!(counters.snapshot().removed, 1);
    }

    #[tokio::test]
    async fn test_tag_resolution_in_test_run_is_simulated() {
        let item = fixtures::stalled_item(1, "abc", "Show.S01E01");
        let client = sonarr_with(&item).await;
        let qbit = Arc::new(MockDownloadClient::new("qbit"));
        qbit.add_torrent(fixtures::torrent("abc")).await;
        qbit.set_private("abc", true).await;
        let policy =
            RemovalPolicy::new("obsolete_tag", "remove", Some("obsolete".into()), None);
        let ctx = context(policy, vec![qbit.clone() as Arc<dyn DownloadClient>], true);
        let counters = JobCounters::default();
        let striker = Striker::new(&ctx, "remove_stalled", 1, &counters);

        let outcome = striker
            .strike(Target::Queue {
                client: &client,
                item: &item,
                options: profiles::STALLED,
            })
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Simulated);
        assert!(qbit.tag_calls().await.is_empty());
        assert_eq!(ctx.ledger.get("abc").await, 1);
        assert_eq!(counters.snapshot().removed, 1);
    }

    #[tokio::test]
    async fn test_torrent_target_deleted_keeping_files() {
        let qbit = Arc::new(MockDownloadClient::new("qbit"));
        let torrent = fixtures::torrent("def");
        qbit.add_torrent(torrent.clone()).await;
        let client: Arc<dyn DownloadClient> = qbit.clone();
        let ctx = context(RemovalPolicy::remove_all(), vec![client.clone()], false);
        let counters = JobCounters::default();
        let striker = Striker::new(&ctx, "remove_orphans", 1, &counters);

        let outcome = striker
            .strike(Target::Torrent {
                client: &client,
                torrent: &torrent,
            })
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Removed);
        assert_eq!(qbit.delete_calls().await, vec![("def".to_string(), false)]);
    }
}
