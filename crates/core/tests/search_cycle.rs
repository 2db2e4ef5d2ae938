//! Search jobs running inside a full cycle.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

use sweeparr_core::config::SearchJobConfig;
use sweeparr_core::jobs::search::SearchJob;
use sweeparr_core::testing::{fixtures, MockArrClient};
use sweeparr_core::{ArrClient, ArrKind, Manager, RemovalPolicy, StrikeLedger};

fn search_config(min_days: u32, max_concurrent: usize) -> SearchJobConfig {
    SearchJobConfig {
        enabled: true,
        min_days_between_searches: min_days,
        max_concurrent_searches: max_concurrent,
    }
}

fn manager() -> Manager {
    Manager::new(
        Arc::new(StrikeLedger::in_memory()),
        RemovalPolicy::remove_all(),
        false,
    )
}

#[tokio::test]
async fn test_search_jobs_fan_out_without_touching_strikes() {
    let mut manager = manager();
    let sonarr = Arc::new(MockArrClient::new("sonarr", ArrKind::Sonarr));
    let radarr = Arc::new(MockArrClient::new("radarr", ArrKind::Radarr));
    for client in [&sonarr, &radarr] {
        client
            .set_missing((1..=5).map(|id| fixtures::wanted_item(id, None)).collect())
            .await;
        client
            .set_cutoff_unmet(vec![fixtures::wanted_item(
                50,
                Some(Utc::now() - Duration::hours(1)),
            )])
            .await;
        client.set_search_delay(StdDuration::from_millis(10)).await;
        manager.register_arr_client(Arc::clone(client) as Arc<dyn ArrClient>);
    }
    manager.register_job(SearchJob::missing(&search_config(7, 2)));
    manager.register_job(SearchJob::cutoff_unmet(&search_config(7, 2)));

    manager.run_all(&CancellationToken::new()).await.unwrap();

    for client in [&sonarr, &radarr] {
        let calls = client.search_calls().await;
        assert_eq!(calls.len(), 6);
        assert!(calls.contains(&vec![50]));
        assert!(client.max_concurrent_searches() <= 2);
    }

    let stats = manager.last_stats().await.unwrap();
    assert_eq!(stats.jobs["search_missing"].removed, 10);
    assert_eq!(stats.jobs["search_unmet_cutoff"].removed, 2);
    assert_eq!(stats.strikes_added, 0);
    assert_eq!(stats.strikes_tracked, 0);
}

#[tokio::test]
async fn test_search_failure_is_contained() {
    let mut manager = manager();
    let sonarr = Arc::new(MockArrClient::new("sonarr", ArrKind::Sonarr));
    sonarr
        .set_missing(vec![fixtures::wanted_item(1, None)])
        .await;
    let radarr = Arc::new(MockArrClient::new("radarr", ArrKind::Radarr));
    radarr.set_unavailable(true).await;
    manager.register_arr_client(Arc::clone(&sonarr) as Arc<dyn ArrClient>);
    manager.register_arr_client(radarr as Arc<dyn ArrClient>);
    manager.register_job(SearchJob::missing(&search_config(0, 1)));

    let result = manager.run_all(&CancellationToken::new()).await;

    assert!(result.is_err());
    assert_eq!(sonarr.search_calls().await, vec![vec![1]]);
    let stats = manager.last_stats().await.unwrap();
    assert_eq!(stats.jobs_failed, 1);
    assert!(stats.errors[0].contains("radarr"));
}
