use std::sync::Arc;

use newsroom_core::{ApprovalStore, Config, OffloadPool, OrchestratorHandle, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<dyn ApprovalStore>,
    pool: OffloadPool,
    orchestrator: OrchestratorHandle,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn ApprovalStore>,
        pool: OffloadPool,
        orchestrator: OrchestratorHandle,
    ) -> Self {
        Self {
            config,
            store,
            pool,
            orchestrator,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Durable approval store. Blocking: reach it through [`pool`](Self::pool).
    pub fn store(&self) -> Arc<dyn ApprovalStore> {
        Arc::clone(&self.store)
    }

    pub fn pool(&self) -> &OffloadPool {
        &self.pool
    }

    pub fn orchestrator(&self) -> &OrchestratorHandle {
        &self.orchestrator
    }
}
