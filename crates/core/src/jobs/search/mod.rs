//! Search jobs: ask *arr instances to search for missing or under-quality items.

mod job;

pub use job::{SearchJob, SearchKind};
