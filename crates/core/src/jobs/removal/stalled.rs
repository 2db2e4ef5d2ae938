use chrono::{DateTime, Utc};

use super::queue_job::{Detector, Verdict};
use super::equals_any;
use crate::arr::{DeleteOptions, QueueItem};
use crate::jobs::strike::profiles;

const STALLED_TITLES: &[&str] = &["Download stalled", "No files found", "Sample"];

/// Downloads stuck without progress or waiting on import.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stalled;

impl Detector for Stalled {
    const NAME: &'static str = "remove_stalled";
    const PROFILE: DeleteOptions = profiles::STALLED;

    fn check(&self, item: &QueueItem, _now: DateTime<Utc>) -> Verdict {
        let stalled = item
            .tracked_download_state
            .eq_ignore_ascii_case("importPending")
            || (item.tracked_download_status.eq_ignore_ascii_case("warning")
                && item.titles().any(|t| equals_any(t, STALLED_TITLES)))
            || equals_any(&item.status, &["warning", "stalled"]);

        if stalled {
            Verdict::Flag
        } else {
            Verdict::Pass
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_import_pending_is_stalled() {
        let item = QueueItem {
            tracked_download_state: "importPending".into(),
            ..fixtures::queue_item(1, "A", "x")
        };
        assert_eq!(Stalled.check(&item, Utc::now()), Verdict::Flag);
    }

    #[test]
    fn test_warning_needs_known_title() {
        let item = fixtures::stalled_item(1, "A", "x");
        assert_eq!(Stalled.check(&item, Utc::now()), Verdict::Flag);

        let other = fixtures::with_message(
            QueueItem {
                tracked_download_status: "warning".into(),
                ..fixtures::queue_item(2, "B", "y")
            },
            "Indexer unreachable",
            &[],
        );
        assert_eq!(Stalled.check(&other, Utc::now()), Verdict::Pass);
    }

    #[test]
    fn test_top_level_status() {
        let item = QueueItem {
            status: "Stalled".into(),
            ..fixtures::queue_item(1, "A", "x")
        };
        assert_eq!(Stalled.check(&item, Utc::now()), Verdict::Flag);
    }

    #[test]
    fn test_healthy_download_passes() {
        let item = fixtures::queue_item(1, "A", "x");
        assert_eq!(Stalled.check(&item, Utc::now()), Verdict::Pass);
    }
}
