use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use crate::arr::ArrKind;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub job_defaults: JobDefaultsConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub instances: InstancesConfig,
    #[serde(default)]
    pub download_clients: DownloadClientsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Where the strike ledger is persisted.
    pub fn strikes_path(&self) -> PathBuf {
        self.general.data_dir.join("strikes.json")
    }

    /// Every enabled *arr instance, tagged with its kind, in config order.
    pub fn enabled_instances(&self) -> Vec<(ArrKind, &InstanceConfig)> {
        self.instances
            .iter()
            .filter(|(_, inst)| inst.enabled)
            .collect()
    }
}

/// Process-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default)]
    pub test_run: bool,
    /// Seconds between cycles.
    #[serde(default = "default_timer_secs")]
    pub timer_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub ssl_verification: bool,
    #[serde(default = "default_tracker_handling")]
    pub private_tracker_handling: String,
    #[serde(default = "default_tracker_handling")]
    pub public_tracker_handling: String,
    /// Empty means no obsolete tag is configured.
    #[serde(default)]
    pub obsolete_tag: String,
    /// Empty means nothing is protected.
    #[serde(default)]
    pub protected_tag: String,
    /// Download clients (by name) that are configured but never consulted.
    #[serde(default)]
    pub ignore_download_clients: Vec<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl GeneralConfig {
    pub fn timer(&self) -> Duration {
        Duration::from_secs(self.timer_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            test_run: false,
            timer_secs: default_timer_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            ssl_verification: true,
            private_tracker_handling: default_tracker_handling(),
            public_tracker_handling: default_tracker_handling(),
            obsolete_tag: String::new(),
            protected_tag: String::new(),
            ignore_download_clients: Vec::new(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_timer_secs() -> u64 {
    300
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_tracker_handling() -> String {
    "remove".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

/// Fallbacks used by any job that doesn't override them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobDefaultsConfig {
    #[serde(default = "default_max_strikes")]
    pub max_strikes: u32,
    /// KB/s.
    #[serde(default = "default_min_download_speed")]
    pub min_download_speed: f64,
}

impl Default for JobDefaultsConfig {
    fn default() -> Self {
        Self {
            max_strikes: default_max_strikes(),
            min_download_speed: default_min_download_speed(),
        }
    }
}

fn default_max_strikes() -> u32 {
    3
}

fn default_min_download_speed() -> f64 {
    100.0
}

/// Per-job configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JobsConfig {
    #[serde(default)]
    pub remove_stalled: JobConfig,
    #[serde(default)]
    pub remove_slow: JobConfig,
    #[serde(default)]
    pub remove_failed_downloads: JobConfig,
    #[serde(default)]
    pub remove_failed_imports: JobConfig,
    #[serde(default)]
    pub remove_orphans: JobConfig,
    #[serde(default)]
    pub remove_missing_files: JobConfig,
    #[serde(default)]
    pub remove_unmonitored: JobConfig,
    #[serde(default)]
    pub remove_bad_files: JobConfig,
    #[serde(default)]
    pub remove_metadata_failed: JobConfig,
    #[serde(default)]
    pub remove_done_seeding: DoneSeedingConfig,
    #[serde(default)]
    pub search_missing: SearchJobConfig,
    #[serde(default)]
    pub search_unmet_cutoff: SearchJobConfig,
}

impl JobsConfig {
    /// The strike-based removal jobs, keyed by config name.
    pub fn removal_jobs(&self) -> [(&'static str, &JobConfig); 9] {
        [
            ("remove_stalled", &self.remove_stalled),
            ("remove_slow", &self.remove_slow),
            ("remove_failed_downloads", &self.remove_failed_downloads),
            ("remove_failed_imports", &self.remove_failed_imports),
            ("remove_orphans", &self.remove_orphans),
            ("remove_missing_files", &self.remove_missing_files),
            ("remove_unmonitored", &self.remove_unmonitored),
            ("remove_bad_files", &self.remove_bad_files),
            ("remove_metadata_failed", &self.remove_metadata_failed),
        ]
    }
}

/// Settings for one strike-based removal job.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JobConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub max_strikes: Option<u32>,
    #[serde(default)]
    pub min_download_speed: Option<f64>,
    /// Glob patterns (`*`, `?`) gating failed-import matches.
    #[serde(default)]
    pub message_patterns: Vec<String>,
}

impl JobConfig {
    pub fn max_strikes_or(&self, defaults: &JobDefaultsConfig) -> u32 {
        self.max_strikes.unwrap_or(defaults.max_strikes)
    }

    pub fn min_download_speed_or(&self, defaults: &JobDefaultsConfig) -> f64 {
        self.min_download_speed
            .unwrap_or(defaults.min_download_speed)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DoneSeedingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub target_tags: Vec<String>,
    #[serde(default)]
    pub target_categories: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchJobConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_min_days_between_searches")]
    pub min_days_between_searches: u32,
    #[serde(default = "default_max_concurrent_searches")]
    pub max_concurrent_searches: usize,
}

impl Default for SearchJobConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_days_between_searches: default_min_days_between_searches(),
            max_concurrent_searches: default_max_concurrent_searches(),
        }
    }
}

fn default_min_days_between_searches() -> u32 {
    7
}

fn default_max_concurrent_searches() -> usize {
    3
}

/// *arr instances grouped by application.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InstancesConfig {
    #[serde(default)]
    pub sonarr: Vec<InstanceConfig>,
    #[serde(default)]
    pub radarr: Vec<InstanceConfig>,
    #[serde(default)]
    pub lidarr: Vec<InstanceConfig>,
    #[serde(default)]
    pub readarr: Vec<InstanceConfig>,
    #[serde(default)]
    pub whisparr: Vec<InstanceConfig>,
}

impl InstancesConfig {
    /// All instances tagged with their kind, in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (ArrKind, &InstanceConfig)> {
        let groups = [
            (ArrKind::Sonarr, &self.sonarr),
            (ArrKind::Radarr, &self.radarr),
            (ArrKind::Lidarr, &self.lidarr),
            (ArrKind::Readarr, &self.readarr),
            (ArrKind::Whisparr, &self.whisparr),
        ];
        groups
            .into_iter()
            .flat_map(|(kind, list)| list.iter().map(move |inst| (kind, inst)))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstanceConfig {
    pub name: String,
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DownloadClientsConfig {
    #[serde(default)]
    pub qbittorrent: Vec<QBittorrentConfig>,
    #[serde(default)]
    pub sabnzbd: Vec<SabnzbdConfig>,
    #[serde(default)]
    pub nzbget: Vec<NzbgetConfig>,
}

impl DownloadClientsConfig {
    /// Every configured client as `(kind, name, url)`, enabled or not.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str, &str)> {
        let qbit = self
            .qbittorrent
            .iter()
            .map(|c| ("qbittorrent", c.name.as_str(), c.url.as_str()));
        let sab = self
            .sabnzbd
            .iter()
            .map(|c| ("sabnzbd", c.name.as_str(), c.url.as_str()));
        let nzbget = self
            .nzbget
            .iter()
            .map(|c| ("nzbget", c.name.as_str(), c.url.as_str()));
        qbit.chain(sab).chain(nzbget)
    }
}

/// qBittorrent WebUI connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// SABnzbd API connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SabnzbdConfig {
    pub name: String,
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// NZBGet JSON-RPC connection settings. Empty credentials disable basic auth.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NzbgetConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Optional HTTP status surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    9705
}
