//! Cross-run duplicate control.

use std::sync::Arc;

use tracing::debug;

use crate::approval::ApprovalStore;
use crate::item::Item;
use crate::stage::{SideEffect, Stage, StageError};

/// Skips items the durable store already holds a record for, whatever
/// its status, so an article is only ever offered once.
pub struct SeenFilter {
    store: Arc<dyn ApprovalStore>,
}

impl SeenFilter {
    pub const NAME: &'static str = "seen_filter";

    pub fn new(store: Arc<dyn ApprovalStore>) -> Self {
        Self { store }
    }
}

impl Stage for SeenFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::External
    }

    fn execute(&self, item: Item) -> Result<Option<Item>, StageError> {
        match self.store.get(&item.id) {
            Ok(Some(existing)) => {
                debug!(item_id = %item.id, status = %existing.status, "Already seen");
                Ok(None)
            }
            Ok(None) => Ok(Some(item)),
            Err(e) => Err(StageError::failed(Self::NAME, e.to_string())),
        }
    }
}
