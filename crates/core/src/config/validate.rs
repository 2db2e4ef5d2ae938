use std::collections::HashSet;

use super::{types::Config, ConfigError};

const LOG_LEVELS: &[&str] = &["debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["json", "text"];
const TRACKER_MODES: &[&str] = &["remove", "skip", "obsolete_tag"];

const MIN_TIMER_SECS: u64 = 60;
const MAX_TIMER_SECS: u64 = 24 * 60 * 60;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 5 * 60;

/// Validate configuration.
///
/// Every problem found is reported, joined into a single `ValidationError`.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut problems = Vec::new();
    let general = &config.general;

    if !LOG_LEVELS.contains(&general.log_level.as_str()) {
        problems.push(format!(
            "general.log_level must be one of {:?}, got {:?}",
            LOG_LEVELS, general.log_level
        ));
    }
    if !LOG_FORMATS.contains(&general.log_format.as_str()) {
        problems.push(format!(
            "general.log_format must be one of {:?}, got {:?}",
            LOG_FORMATS, general.log_format
        ));
    }
    if !(MIN_TIMER_SECS..=MAX_TIMER_SECS).contains(&general.timer_secs) {
        problems.push(format!(
            "general.timer_secs must be between {} and {}",
            MIN_TIMER_SECS, MAX_TIMER_SECS
        ));
    }
    if !(1..=MAX_REQUEST_TIMEOUT_SECS).contains(&general.request_timeout_secs) {
        problems.push(format!(
            "general.request_timeout_secs must be between 1 and {}",
            MAX_REQUEST_TIMEOUT_SECS
        ));
    }

    for (field, mode) in [
        ("private_tracker_handling", &general.private_tracker_handling),
        ("public_tracker_handling", &general.public_tracker_handling),
    ] {
        if !TRACKER_MODES.contains(&mode.as_str()) {
            problems.push(format!(
                "general.{} must be one of {:?}, got {:?}",
                field, TRACKER_MODES, mode
            ));
        } else if mode == "obsolete_tag" && general.obsolete_tag.is_empty() {
            problems.push(format!(
                "general.{} is obsolete_tag but general.obsolete_tag is empty",
                field
            ));
        }
    }

    if config.job_defaults.max_strikes < 1 {
        problems.push("job_defaults.max_strikes must be at least 1".to_string());
    }
    if config.job_defaults.min_download_speed < 0.0 {
        problems.push("job_defaults.min_download_speed cannot be negative".to_string());
    }
    for (name, job) in config.jobs.removal_jobs() {
        if job.max_strikes == Some(0) {
            problems.push(format!("jobs.{}.max_strikes must be at least 1", name));
        }
        if job.min_download_speed.is_some_and(|s| s < 0.0) {
            problems.push(format!("jobs.{}.min_download_speed cannot be negative", name));
        }
    }
    for (name, job) in [
        ("search_missing", &config.jobs.search_missing),
        ("search_unmet_cutoff", &config.jobs.search_unmet_cutoff),
    ] {
        if job.max_concurrent_searches < 1 {
            problems.push(format!(
                "jobs.{}.max_concurrent_searches must be at least 1",
                name
            ));
        }
    }

    let mut seen = HashSet::new();
    for (kind, inst) in config.instances.iter() {
        if inst.name.is_empty() {
            problems.push(format!("{} instance with empty name", kind));
            continue;
        }
        if !seen.insert(inst.name.as_str()) {
            problems.push(format!("duplicate instance name: {}", inst.name));
        }
        if inst.url.is_empty() {
            problems.push(format!("instance {}: url is required", inst.name));
        }
        if inst.api_key.is_empty() {
            problems.push(format!("instance {}: api_key is required", inst.name));
        }
    }
    if config.enabled_instances().is_empty() {
        problems.push("at least one enabled *arr instance is required".to_string());
    }

    let mut seen = HashSet::new();
    for (kind, name, url) in config.download_clients.iter() {
        if name.is_empty() {
            problems.push(format!("{} download client with empty name", kind));
            continue;
        }
        if !seen.insert(name) {
            problems.push(format!("duplicate download client name: {}", name));
        }
        if url.is_empty() {
            problems.push(format!("download client {}: url is required", name));
        }
    }
    for client in &config.download_clients.sabnzbd {
        if client.api_key.is_empty() {
            problems.push(format!("download client {}: api_key is required", client.name));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(problems.join("; ")))
    }
}
