pub mod arr;
pub mod config;
pub mod download_client;
pub mod http_core;
pub mod jobs;
pub mod metrics;
pub mod policy;
pub mod strikes;
pub mod testing;

pub use arr::{ArrApiClient, ArrClient, ArrError, ArrKind, DeleteOptions, QueueItem};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use download_client::{
    DownloadClient, DownloadClientError, NzbgetClient, QBittorrentClient, SabnzbdClient, Torrent,
};
pub use http_core::{HttpCore, HttpError, HttpSettings};
pub use jobs::{CycleError, CycleStats, Job, JobContext, JobError, JobStats, Manager};
pub use policy::{PolicyError, RemovalAction, RemovalPolicy};
pub use strikes::{StrikeError, StrikeLedger, StrikeRecord};
