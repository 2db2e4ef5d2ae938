//! Cycle lifecycle integration tests.
//!
//! These drive a real [`Manager`] against mock *arr instances and download
//! clients across several cycles, the way the timer loop does in production.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use sweeparr_core::config::{JobConfig, JobDefaultsConfig};
use sweeparr_core::jobs::removal::{FailedDownloads, OrphansJob, QueueJob, Slow, Stalled};
use sweeparr_core::testing::{fixtures, MockArrClient, MockDownloadClient};
use sweeparr_core::{
    load_config_from_str, ArrClient, ArrKind, CycleError, DeleteOptions, DownloadClient, Manager,
    QueueItem, RemovalPolicy, StrikeLedger,
};

fn job_config(max_strikes: u32) -> JobConfig {
    JobConfig {
        enabled: true,
        max_strikes: Some(max_strikes),
        ..Default::default()
    }
}

/// Test helper holding a manager and its mocks.
struct TestHarness {
    manager: Manager,
    sonarr: Arc<MockArrClient>,
    qbit: Arc<MockDownloadClient>,
}

impl TestHarness {
    fn new(ledger: StrikeLedger, policy: RemovalPolicy, test_run: bool) -> Self {
        let sonarr = Arc::new(MockArrClient::new("sonarr", ArrKind::Sonarr));
        let qbit = Arc::new(MockDownloadClient::new("qbit"));

        let mut manager = Manager::new(Arc::new(ledger), policy, test_run);
        manager.register_arr_client(Arc::clone(&sonarr) as Arc<dyn ArrClient>);
        manager.register_download_client(Arc::clone(&qbit) as Arc<dyn DownloadClient>);

        Self {
            manager,
            sonarr,
            qbit,
        }
    }

    fn in_memory() -> Self {
        Self::new(StrikeLedger::in_memory(), RemovalPolicy::remove_all(), false)
    }

    fn with_stalled_job(mut self, max_strikes: u32) -> Self {
        self.manager.register_job(QueueJob::new(
            Stalled,
            &job_config(max_strikes),
            &JobDefaultsConfig::default(),
        ));
        self
    }

    async fn run_cycle(&self) -> Result<(), CycleError> {
        self.manager.run_all(&CancellationToken::new()).await
    }
}

#[tokio::test]
async fn test_stalled_item_removed_on_third_cycle() {
    let harness = TestHarness::in_memory().with_stalled_job(3);
    harness
        .sonarr
        .add_queue_item(fixtures::stalled_item(1, "HASH1", "Show.S01E01"))
        .await;
    let ledger = Arc::clone(harness.manager.ledger());

    harness.run_cycle().await.unwrap();
    assert_eq!(ledger.get("HASH1").await, 1);
    harness.run_cycle().await.unwrap();
    assert_eq!(ledger.get("HASH1").await, 2);
    assert!(harness.sonarr.delete_calls().await.is_empty());

    harness.run_cycle().await.unwrap();

    let deletes = harness.sonarr.delete_calls().await;
    assert_eq!(deletes.len(), 1);
    assert_eq!(
        deletes[0],
        (
            1,
            DeleteOptions {
                remove_from_client: true,
                blocklist: false,
                skip_redownload: true,
            }
        )
    );
    assert_eq!(ledger.get("HASH1").await, 0);

    let stats = harness.manager.last_stats().await.unwrap();
    assert_eq!(stats.total_removed(), 1);
    assert_eq!(stats.strikes_reset, 1);
    assert_eq!(stats.strikes_tracked, 0);
}

#[tokio::test]
async fn test_slow_download_recovers_and_strikes_reset() {
    let mut harness = TestHarness::in_memory();
    harness.manager.register_job(QueueJob::new(
        Slow::new(100.0),
        &job_config(3),
        &JobDefaultsConfig::default(),
    ));

    let added = Utc::now() - Duration::minutes(10);
    let size = 1_000_000_000.0;
    // 1 MB in ten minutes, well under 100 KB/s.
    harness
        .sonarr
        .add_queue_item(fixtures::downloading_item(1, "SLOW", size, size - 1_000_000.0, added))
        .await;

    harness.run_cycle().await.unwrap();
    assert_eq!(harness.manager.ledger().get("SLOW").await, 1);

    // 500 MB in ten minutes.
    harness
        .sonarr
        .update_queue_item(fixtures::downloading_item(1, "SLOW", size, size / 2.0, added))
        .await;
    harness.run_cycle().await.unwrap();

    assert_eq!(harness.manager.ledger().get("SLOW").await, 0);
    assert!(harness.sonarr.delete_calls().await.is_empty());
    let stats = harness.manager.last_stats().await.unwrap();
    assert_eq!(stats.strikes_reset, 1);
}

#[tokio::test]
async fn test_test_run_never_deletes() {
    let harness = TestHarness::new(StrikeLedger::in_memory(), RemovalPolicy::remove_all(), true)
        .with_stalled_job(1);
    harness
        .sonarr
        .add_queue_item(fixtures::stalled_item(1, "HASH1", "Show.S01E01"))
        .await;

    harness.run_cycle().await.unwrap();
    harness.run_cycle().await.unwrap();

    assert!(harness.sonarr.delete_calls().await.is_empty());
    assert_eq!(harness.sonarr.get_queue().await.unwrap().len(), 1);
    let stats = harness.manager.last_stats().await.unwrap();
    assert_eq!(stats.total_found(), 1);
    assert_eq!(stats.total_removed(), 1);
}

#[tokio::test]
async fn test_unreachable_instance_degrades_only_its_job() {
    let mut harness = TestHarness::in_memory().with_stalled_job(3);
    let radarr = Arc::new(MockArrClient::new("radarr", ArrKind::Radarr));
    radarr.set_unavailable(true).await;
    harness
        .manager
        .register_arr_client(Arc::clone(&radarr) as Arc<dyn ArrClient>);
    harness.manager.register_job(QueueJob::new(
        FailedDownloads,
        &job_config(3),
        &JobDefaultsConfig::default(),
    ));
    // Stalled by client status alone, so the failed-downloads job leaves it alone.
    harness
        .sonarr
        .add_queue_item(QueueItem {
            status: "stalled".into(),
            ..fixtures::queue_item(1, "HASH1", "Show.S01E01")
        })
        .await;

    let err = harness.run_cycle().await.unwrap_err();

    let CycleError::JobsFailed { count, jobs } = err;
    assert_eq!(count, 2);
    assert_eq!(jobs, vec!["remove_stalled", "remove_failed_downloads"]);
    assert_eq!(harness.manager.ledger().get("HASH1").await, 1);

    let stats = harness.manager.last_stats().await.unwrap();
    assert_eq!(stats.jobs_run, 2);
    assert!(stats.errors.iter().all(|e| e.contains("radarr")));
}

#[tokio::test]
async fn test_strikes_survive_restart() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("strikes.json");

    {
        let harness =
            TestHarness::new(StrikeLedger::open(&path).await, RemovalPolicy::remove_all(), false)
                .with_stalled_job(3);
        harness
            .sonarr
            .add_queue_item(fixtures::stalled_item(1, "HASH1", "Show.S01E01"))
            .await;
        harness.run_cycle().await.unwrap();
        harness.run_cycle().await.unwrap();
        harness.manager.close().await.unwrap();
    }

    let harness =
        TestHarness::new(StrikeLedger::open(&path).await, RemovalPolicy::remove_all(), false)
            .with_stalled_job(3);
    assert_eq!(harness.manager.ledger().get("HASH1").await, 2);
    let record = harness.manager.ledger().get_record("HASH1").await.unwrap();
    assert_eq!(record.job, "remove_stalled");
    assert_eq!(record.name, "Show.S01E01");

    harness
        .sonarr
        .add_queue_item(fixtures::stalled_item(1, "HASH1", "Show.S01E01"))
        .await;
    harness.run_cycle().await.unwrap();

    assert_eq!(harness.sonarr.delete_calls().await.len(), 1);
    assert_eq!(harness.manager.ledger().get("HASH1").await, 0);
}

#[tokio::test]
async fn test_private_tracker_is_tagged_instead_of_removed() {
    let policy = RemovalPolicy::new("obsolete_tag", "remove", Some("obsolete".into()), None);
    let harness = TestHarness::new(StrikeLedger::in_memory(), policy, false).with_stalled_job(1);
    harness
        .sonarr
        .add_queue_item(fixtures::stalled_item(1, "HASH1", "Show.S01E01"))
        .await;
    harness.qbit.add_torrent(fixtures::torrent("HASH1")).await;
    harness.qbit.set_private("HASH1", true).await;

    harness.run_cycle().await.unwrap();

    assert!(harness.sonarr.delete_calls().await.is_empty());
    assert_eq!(
        harness.qbit.tag_calls().await,
        vec![("HASH1".to_string(), vec!["obsolete".to_string()])]
    );
    assert_eq!(harness.manager.ledger().get("HASH1").await, 0);
}

#[tokio::test]
async fn test_test_run_with_tag_policy_never_tags() {
    let policy = RemovalPolicy::new("obsolete_tag", "remove", Some("obsolete".into()), None);
    let harness = TestHarness::new(StrikeLedger::in_memory(), policy, true).with_stalled_job(1);
    harness
        .sonarr
        .add_queue_item(fixtures::stalled_item(1, "HASH1", "Show.S01E01"))
        .await;
    harness.qbit.add_torrent(fixtures::torrent("HASH1")).await;
    harness.qbit.set_private("HASH1", true).await;

    harness.run_cycle().await.unwrap();

    assert!(harness.qbit.tag_calls().await.is_empty());
    assert!(harness.sonarr.delete_calls().await.is_empty());
    assert_eq!(harness.manager.ledger().get("HASH1").await, 1);
    let stats = harness.manager.last_stats().await.unwrap();
    assert_eq!(stats.total_removed(), 1);
}

#[tokio::test]
async fn test_protected_item_keeps_strikes() {
    let policy = RemovalPolicy::new("remove", "remove", None, Some("keep".into()));
    let harness = TestHarness::new(StrikeLedger::in_memory(), policy, false).with_stalled_job(1);
    harness
        .sonarr
        .add_queue_item(fixtures::stalled_item(1, "HASH1", "Show.S01E01"))
        .await;
    harness
        .qbit
        .add_torrent(fixtures::tagged_torrent("HASH1", &["keep"]))
        .await;
    harness.qbit.set_private("HASH1", false).await;

    harness.run_cycle().await.unwrap();
    harness.run_cycle().await.unwrap();

    assert!(harness.sonarr.delete_calls().await.is_empty());
    assert!(harness.qbit.tag_calls().await.is_empty());
    assert_eq!(harness.manager.ledger().get("HASH1").await, 2);
}

#[tokio::test]
async fn test_orphan_torrent_deleted_keeping_files() {
    let mut harness = TestHarness::in_memory();
    harness.manager.register_job(OrphansJob::new(
        &job_config(2),
        &JobDefaultsConfig::default(),
    ));
    harness
        .sonarr
        .add_queue_item(fixtures::queue_item(1, "TRACKED", "Show.S01E01"))
        .await;
    harness.qbit.add_torrent(fixtures::torrent("TRACKED")).await;
    harness.qbit.add_torrent(fixtures::torrent("ORPHAN")).await;
    harness.qbit.set_private("ORPHAN", false).await;

    harness.run_cycle().await.unwrap();
    assert!(harness.qbit.delete_calls().await.is_empty());
    harness.run_cycle().await.unwrap();

    assert_eq!(
        harness.qbit.delete_calls().await,
        vec![("orphan".to_string(), false)]
    );
    assert_eq!(harness.qbit.torrent_count().await, 1);
}

#[tokio::test]
async fn test_configured_jobs_only_run_when_enabled() {
    let config = load_config_from_str(
        r#"
[jobs.remove_stalled]
enabled = true
max_strikes = 2

[[instances.sonarr]]
name = "sonarr"
url = "http://localhost:8989"
api_key = "abc"
"#,
    )
    .unwrap();

    let mut harness = TestHarness::in_memory();
    harness.manager.register_configured_jobs(&config);
    harness
        .sonarr
        .add_queue_item(fixtures::stalled_item(1, "HASH1", "Show.S01E01"))
        .await;
    harness
        .sonarr
        .set_missing(vec![fixtures::wanted_item(7, None)])
        .await;

    harness.run_cycle().await.unwrap();
    harness.run_cycle().await.unwrap();

    let stats = harness.manager.last_stats().await.unwrap();
    assert_eq!(stats.jobs_run, 1);
    assert_eq!(harness.sonarr.delete_calls().await.len(), 1);
    assert!(harness.sonarr.search_calls().await.is_empty());
}
