use chrono::{DateTime, Utc};

use super::queue_job::{Detector, Verdict};
use crate::arr::{DeleteOptions, QueueItem};
use crate::config::{JobConfig, JobDefaultsConfig};
use crate::jobs::strike::profiles;

/// Seconds a download must have been queued before its speed is judged.
const MIN_ELAPSED_SECS: f64 = 60.0;

/// Downloads averaging below a minimum speed since they were added.
///
/// An item back at or above the threshold has its strikes cleared.
#[derive(Debug, Clone, Copy)]
pub struct Slow {
    /// Threshold in bytes per second.
    min_speed: f64,
}

impl Slow {
    /// `kb_per_sec` is the configured minimum speed in KB/s.
    pub fn new(kb_per_sec: f64) -> Self {
        Self {
            min_speed: kb_per_sec * 1024.0,
        }
    }

    pub fn from_config(config: &JobConfig, defaults: &JobDefaultsConfig) -> Self {
        Self::new(config.min_download_speed_or(defaults))
    }

    /// Threshold in bytes per second.
    pub fn min_speed(&self) -> f64 {
        self.min_speed
    }
}

impl Detector for Slow {
    const NAME: &'static str = "remove_slow";
    const PROFILE: DeleteOptions = profiles::SLOW;

    fn check(&self, item: &QueueItem, now: DateTime<Utc>) -> Verdict {
        if self.min_speed <= 0.0 || !item.status.eq_ignore_ascii_case("downloading") {
            return Verdict::Pass;
        }
        let Some(added) = item.added else {
            return Verdict::Pass;
        };

        let elapsed = (now - added).num_milliseconds() as f64 / 1000.0;
        if elapsed < MIN_ELAPSED_SECS {
            return Verdict::Pass;
        }

        let speed = (item.size - item.sizeleft) / elapsed;
        if speed < self.min_speed {
            Verdict::Flag
        } else {
            Verdict::Recovered
        }
    }
}
