//! Detection and search jobs, and the cycle manager that drives them.
//!
//! Every removal job follows the same shape:
//! - **Detect**: evaluate a category predicate against a queue or torrent snapshot
//! - **Strike**: record the observation in the [`StrikeLedger`](crate::strikes::StrikeLedger)
//! - **Act**: once an item reaches its strike limit, resolve the removal policy and
//!   remove, tag or skip it
//!
//! Search jobs only fan out search commands and never touch the ledger.

mod context;
mod job;
mod manager;
pub mod removal;
pub mod search;
mod strike;

pub use context::{InstanceQueue, JobContext, QueueSnapshot};
pub use job::{Job, JobError, JobStats};
pub use manager::{CycleError, CycleStats, Manager, CLEANUP_HORIZON};
