//! Strike-based removal jobs.
//!
//! Queue jobs that only need a predicate over one item are a [`QueueJob`]
//! parameterized by a [`Detector`]. Jobs that need extra lookups
//! (unmonitored, orphans, done seeding) implement [`Job`](super::Job) directly.

mod done_seeding;
mod failed;
mod files;
mod orphans;
mod queue_job;
mod slow;
mod stalled;
mod unmonitored;

pub use done_seeding::DoneSeedingJob;
pub use failed::{FailedDownloads, FailedImports};
pub use files::{BadFiles, MetadataFailed, MissingFiles};
pub use orphans::OrphansJob;
pub use queue_job::{Detector, QueueJob, Verdict};
pub use slow::Slow;
pub use stalled::Stalled;
pub use unmonitored::UnmonitoredJob;

pub type StalledJob = QueueJob<Stalled>;
pub type SlowJob = QueueJob<Slow>;
pub type FailedDownloadsJob = QueueJob<FailedDownloads>;
pub type FailedImportsJob = QueueJob<FailedImports>;
pub type MissingFilesJob = QueueJob<MissingFiles>;
pub type BadFilesJob = QueueJob<BadFiles>;
pub type MetadataFailedJob = QueueJob<MetadataFailed>;

/// Case-insensitive substring test against any of `needles` (already lowercase).
pub(crate) fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let haystack = haystack.to_lowercase();
    needles.iter().any(|n| haystack.contains(n))
}

/// Case-insensitive equality against any of `candidates`.
pub(crate) fn equals_any(value: &str, candidates: &[&str]) -> bool {
    candidates.iter().any(|c| value.eq_ignore_ascii_case(c))
}
