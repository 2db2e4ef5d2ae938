//! Durable per-item strike ledger.
//!
//! Each flagged download accumulates one strike per cycle in which a detection
//! job matches it. The ledger is persisted as a single JSON document keyed by
//! download identifier and replaced atomically on every save.

mod ledger;
mod types;

pub use ledger::StrikeLedger;
pub use types::{StrikeError, StrikeRecord};
