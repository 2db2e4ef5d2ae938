use chrono::{DateTime, Utc};
use regex_lite::Regex;
use tracing::warn;

use super::queue_job::{Detector, Verdict};
use super::{contains_any, equals_any};
use crate::arr::{DeleteOptions, QueueItem};
use crate::config::JobConfig;
use crate::jobs::strike::profiles;

const DOWNLOAD_FAILURE_WORDS: &[&str] = &["failed", "error", "missing", "corrupt"];

const DOWNLOAD_FAILURE_TITLES: &[&str] = &[
    "Download client unavailable",
    "No files found are eligible for import",
    "Unable to determine if file is a sample",
];

const IMPORT_FAILURE_WORDS: &[&str] = &["failed", "error", "unable"];

const IMPORT_FAILURE_TITLES: &[&str] = &[
    "Import failed",
    "No files found are eligible for import",
    "Not a valid video file",
    "Not an upgrade for existing file",
    "Sample",
];

fn is_flag(matched: bool) -> Verdict {
    if matched {
        Verdict::Flag
    } else {
        Verdict::Pass
    }
}

/// Downloads the client reports as failed, excluding import failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailedDownloads;

impl Detector for FailedDownloads {
    const NAME: &'static str = "remove_failed_downloads";
    const PROFILE: DeleteOptions = profiles::FAILED_DOWNLOAD;

    fn check(&self, item: &QueueItem, _now: DateTime<Utc>) -> Verdict {
        let flagged_status = equals_any(&item.tracked_download_status, &["error", "warning"])
            && !item.tracked_download_state.eq_ignore_ascii_case("importFailed");

        let failure_title = item.titles().any(|t| {
            (contains_any(t, &["download"]) && contains_any(t, DOWNLOAD_FAILURE_WORDS))
                || equals_any(t, DOWNLOAD_FAILURE_TITLES)
        });

        let failure_error = contains_any(&item.error_message, &["download"])
            && contains_any(&item.error_message, &["failed"]);

        is_flag(flagged_status || failure_title || failure_error)
    }
}

/// Completed downloads that could not be imported.
///
/// With message patterns configured, an item must also match one of them.
#[derive(Debug, Clone, Default)]
pub struct FailedImports {
    patterns: Vec<Regex>,
}

impl FailedImports {
    /// Compile glob patterns; invalid ones are logged and dropped.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match glob_to_regex(p.as_ref()) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern = p.as_ref(), error = %e, "Ignoring invalid message pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn from_config(config: &JobConfig) -> Self {
        Self::new(&config.message_patterns[..])
    }

    fn matches_patterns(&self, item: &QueueItem) -> bool {
        self.patterns.is_empty()
            || item
                .all_text()
                .any(|text| self.patterns.iter().any(|re| re.is_match(text)))
    }
}

impl Detector for FailedImports {
    const NAME: &'static str = "remove_failed_imports";
    const PROFILE: DeleteOptions = profiles::FAILED_IMPORT;

    fn check(&self, item: &QueueItem, _now: DateTime<Utc>) -> Verdict {
        let failed_state = item
            .tracked_download_state
            .eq_ignore_ascii_case("importFailed");

        let failure_title = item.titles().any(|t| {
            (contains_any(t, &["import"]) && contains_any(t, IMPORT_FAILURE_WORDS))
                || equals_any(t, IMPORT_FAILURE_TITLES)
        });

        let failure_error = contains_any(&item.error_message, &["import"])
            && contains_any(&item.error_message, &["failed"]);

        is_flag((failed_state || failure_title || failure_error) && self.matches_patterns(item))
    }
}

/// Anchored, case-insensitive regex for a shell glob.
///
/// Supports `*`, `?` and `[...]` classes (`[!...]` or `[^...]` negate, `a-z` ranges).
/// A `[` without a closing `]` is literal.
fn glob_to_regex(glob: &str) -> Result<Regex, regex_lite::Error> {
    let chars: Vec<char> = glob.chars().collect();
    let mut pattern = String::from("(?is)^");
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    push_class(&mut pattern, &chars[i + 1..end]);
                    i = end;
                }
                None => pattern.push_str(r"\["),
            },
            c => pattern.push_str(&regex_lite::escape(c.encode_utf8(&mut [0; 4]))),
        }
        i += 1;
    }
    pattern.push('$');
    Regex::new(&pattern)
}

/// Index of the `]` closing the class opened at `start`. A `]` right after the
/// opening (or after the negation mark) is a member, not the end.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if matches!(chars.get(i), Some('!' | '^')) {
        i += 1;
    }
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    (i..chars.len()).find(|&j| chars[j] == ']')
}

fn push_class(pattern: &mut String, body: &[char]) {
    pattern.push('[');
    let body = match body.first() {
        Some('!' | '^') => {
            pattern.push('^');
            &body[1..]
        }
        _ => body,
    };
    for &c in body {
        if matches!(c, '\\' | '[' | ']' | '^' | '&' | '~') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push(']');
}
