use chrono::{DateTime, Utc};

use super::contains_any;
use super::queue_job::{Detector, Verdict};
use crate::arr::{DeleteOptions, QueueItem};
use crate::jobs::strike::profiles;

const MISSING_FILE_MESSAGES: &[&str] = &[
    "no files found",
    "missing files",
    "files are missing",
    "download folder doesn't contain",
];

const BAD_FILE_KEYWORDS: &[&str] = &[
    "sample",
    "corrupt",
    "wrong format",
    "invalid",
    "damaged",
    "incomplete",
    "verification failed",
    "crc mismatch",
    "checksum",
];

const METADATA_KEYWORDS: &[&str] = &[
    "unable to parse",
    "unknown series",
    "unknown movie",
    "unknown artist",
    "unknown author",
    "not found in library",
    "no match found",
    "parsing failed",
    "cannot identify",
    "metadata error",
    "series not found",
    "movie not found",
];

fn verdict(matched: bool) -> Verdict {
    if matched {
        Verdict::Flag
    } else {
        Verdict::Pass
    }
}

/// Completed downloads whose files are gone.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingFiles;

impl Detector for MissingFiles {
    const NAME: &'static str = "remove_missing_files";
    const PROFILE: DeleteOptions = profiles::MISSING_FILES;

    fn check(&self, item: &QueueItem, _now: DateTime<Utc>) -> Verdict {
        verdict(
            item.messages().any(|m| contains_any(m, MISSING_FILE_MESSAGES))
                || item.titles().any(|t| contains_any(t, &["no files found"]))
                || contains_any(&item.error_message, &["no files found", "missing files"]),
        )
    }
}

/// Samples, corrupt archives and other unusable payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct BadFiles;

impl Detector for BadFiles {
    const NAME: &'static str = "remove_bad_files";
    const PROFILE: DeleteOptions = profiles::BAD_FILES;

    fn check(&self, item: &QueueItem, _now: DateTime<Utc>) -> Verdict {
        verdict(item.all_text().any(|t| contains_any(t, BAD_FILE_KEYWORDS)))
    }
}

/// Releases the application could not match to anything in its library.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataFailed;

impl Detector for MetadataFailed {
    const NAME: &'static str = "remove_metadata_failed";
    const PROFILE: DeleteOptions = profiles::METADATA_FAILED;

    fn check(&self, item: &QueueItem, _now: DateTime<Utc>) -> Verdict {
        if item.has_library_id() {
            return Verdict::Pass;
        }
        let status = item.tracked_download_status.to_ascii_lowercase();
        if status != "warning" && status != "error" {
            return Verdict::Pass;
        }
        verdict(item.all_text().any(|t| contains_any(t, METADATA_KEYWORDS)))
    }
}
