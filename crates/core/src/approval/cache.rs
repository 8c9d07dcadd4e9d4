//! In-memory approval cache.

use std::collections::HashMap;

use super::PendingApproval;

/// Cache of recently created pending records, keyed by item id.
///
/// Owned by the execution context and never shared with worker threads.
/// It is an optimization only: losing it (restart, `clear`) never changes
/// the outcome of a resolution.
#[derive(Debug, Default)]
pub struct ApprovalCache {
    entries: HashMap<String, PendingApproval>,
}

impl ApprovalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record. A publish URL already remembered for the
    /// item is carried over to the new entry.
    pub fn insert(&mut self, mut record: PendingApproval) {
        if record.publish_url.is_none() {
            if let Some(existing) = self.entries.get(&record.id) {
                record.publish_url = existing.publish_url.clone();
            }
        }
        self.entries.insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &str) -> Option<&PendingApproval> {
        self.entries.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<PendingApproval> {
        self.entries.remove(id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
