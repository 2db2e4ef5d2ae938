use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sweeparr_core::config::GeneralConfig;
use sweeparr_core::{
    load_config, validate_config, ArrApiClient, Config, Manager, NzbgetClient, QBittorrentClient,
    RemovalPolicy, SabnzbdClient, StrikeLedger,
};
use sweeparr_server::api::create_router;
use sweeparr_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config_path = std::env::var("SWEEPARR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    init_tracing(&config.general);
    info!(version = VERSION, config = ?config_path, "Starting sweeparr");
    if config.general.test_run {
        warn!("Test run enabled, no queue item or torrent will be modified");
    }

    let manager = Arc::new(build_manager(&config).await?);
    let cancel = CancellationToken::new();

    let server = if config.server.enabled {
        Some(spawn_server(&config, Arc::clone(&manager), cancel.clone()).await?)
    } else {
        None
    };

    let cycles = tokio::spawn(cycle_loop(
        Arc::clone(&manager),
        config.general.timer(),
        cancel.clone(),
    ));

    shutdown_signal().await;
    info!("Shutdown requested, finishing current job");
    cancel.cancel();

    if let Err(e) = cycles.await {
        error!(error = %e, "Cycle loop task failed");
    }
    if let Some(server) = server {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Status server failed"),
            Err(e) => error!(error = %e, "Status server task failed"),
        }
    }

    manager.close().await.context("Failed to persist strikes")?;
    info!("Shutdown complete");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over `general.log_level`.
fn init_tracing(general: &GeneralConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},tower_http=info", general.log_level))
    });

    let json = general.log_format == "json";
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

/// Open the ledger, build every enabled client and register the jobs.
async fn build_manager(config: &Config) -> Result<Manager> {
    let strikes_path = config.strikes_path();
    let ledger = Arc::new(StrikeLedger::open(&strikes_path).await);
    info!(path = ?strikes_path, tracked = ledger.count().await, "Strike ledger opened");

    let mut manager = Manager::new(
        ledger,
        RemovalPolicy::from_config(&config.general),
        config.general.test_run,
    );

    for (kind, instance) in config.enabled_instances() {
        let client = ArrApiClient::from_config(kind, instance, &config.general)
            .with_context(|| format!("Invalid {} instance '{}'", kind, instance.name))?;
        info!(instance = %instance.name, kind = %kind, url = %instance.url, "Initializing arr client");
        manager.register_arr_client(Arc::new(client));
    }

    let ignored = |name: &str| {
        let skip = config.general.ignore_download_clients.iter().any(|n| n == name);
        if skip {
            info!(client = %name, "Download client ignored by configuration");
        }
        skip
    };

    for qbit in &config.download_clients.qbittorrent {
        if !qbit.enabled || ignored(&qbit.name) {
            continue;
        }
        let client = QBittorrentClient::new(qbit, &config.general)
            .with_context(|| format!("Invalid qBittorrent client '{}'", qbit.name))?;
        info!(client = %qbit.name, url = %qbit.url, "Initializing qBittorrent client");
        manager.register_download_client(Arc::new(client));
    }

    for sab in &config.download_clients.sabnzbd {
        if !sab.enabled || ignored(&sab.name) {
            continue;
        }
        let client = SabnzbdClient::new(sab, &config.general)
            .with_context(|| format!("Invalid SABnzbd client '{}'", sab.name))?;
        info!(client = %sab.name, url = %sab.url, "Initializing SABnzbd client");
        manager.register_download_client(Arc::new(client));
    }

    for nzbget in &config.download_clients.nzbget {
        if !nzbget.enabled || ignored(&nzbget.name) {
            continue;
        }
        let client = NzbgetClient::new(nzbget, &config.general)
            .with_context(|| format!("Invalid NZBGet client '{}'", nzbget.name))?;
        info!(client = %nzbget.name, url = %nzbget.url, "Initializing NZBGet client");
        manager.register_download_client(Arc::new(client));
    }

    manager.register_configured_jobs(config);
    info!(jobs = ?manager.job_names(), "Jobs registered");

    Ok(manager)
}

/// Bind the status server and serve it until `cancel` fires.
async fn spawn_server(
    config: &Config,
    manager: Arc<Manager>,
    cancel: CancellationToken,
) -> Result<JoinHandle<std::io::Result<()>>> {
    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Status server listening on {}", addr);

    let app = create_router(Arc::new(AppState::new(manager)));
    Ok(tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
    }))
}

/// One cycle now, then one per tick, until cancelled.
///
/// The next tick is only awaited after `run_all` returns, so cycles never overlap.
async fn cycle_loop(manager: Arc<Manager>, period: std::time::Duration, cancel: CancellationToken) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if let Err(e) = manager.run_all(&cancel).await {
            warn!(error = %e, "Cycle finished with errors");
        }
    }

    info!("Cycle loop stopped");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
