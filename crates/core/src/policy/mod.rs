//! Tracker- and tag-aware removal policy.
//!
//! Decides whether a flagged download is removed, tagged as obsolete or left
//! alone, based on a protected tag and the private/public class of its tracker.

mod resolver;
mod types;

pub use resolver::RemovalPolicy;
pub use types::{PolicyError, RemovalAction, TrackerHandling};
