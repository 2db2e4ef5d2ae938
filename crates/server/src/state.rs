use std::sync::Arc;

use sweeparr_core::{CycleStats, Manager, StrikeLedger};

/// Shared application state
pub struct AppState {
    manager: Arc<Manager>,
}

impl AppState {
    pub fn new(manager: Arc<Manager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Manager {
        self.manager.as_ref()
    }

    pub fn ledger(&self) -> &StrikeLedger {
        self.manager.ledger().as_ref()
    }

    pub async fn last_stats(&self) -> Option<CycleStats> {
        self.manager.last_stats().await
    }
}
