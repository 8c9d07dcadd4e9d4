//! Store wrapper that injects availability failures.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::approval::{
    ApprovalFilter, ApprovalStore, PendingApproval, SqliteApprovalStore, StatusUpdate, StoreError,
};

/// Wraps a real SQLite store and fails the next `n` calls of an operation
/// with [`StoreError::Unavailable`].
pub struct FlakyStore {
    inner: SqliteApprovalStore,
    get_failures: AtomicU32,
    upsert_failures: AtomicU32,
    set_status_failures: AtomicU32,
    set_status_lost_acks: AtomicU32,
    set_status_calls: AtomicU32,
}

impl FlakyStore {
    pub fn new(inner: SqliteApprovalStore) -> Self {
        Self {
            inner,
            get_failures: AtomicU32::new(0),
            upsert_failures: AtomicU32::new(0),
            set_status_failures: AtomicU32::new(0),
            set_status_lost_acks: AtomicU32::new(0),
            set_status_calls: AtomicU32::new(0),
        }
    }

    pub fn fail_get(&self, times: u32) {
        self.get_failures.store(times, Ordering::SeqCst);
    }

    pub fn fail_upsert(&self, times: u32) {
        self.upsert_failures.store(times, Ordering::SeqCst);
    }

    pub fn fail_set_status(&self, times: u32) {
        self.set_status_failures.store(times, Ordering::SeqCst);
    }

    /// The next `times` calls of `set_status` commit the write and then
    /// report [`StoreError::Unavailable`], as when the reply is lost after
    /// the transaction went through.
    pub fn lose_set_status_ack(&self, times: u32) {
        self.set_status_lost_acks.store(times, Ordering::SeqCst);
    }

    /// Number of `set_status` calls that reached the wrapper.
    pub fn set_status_calls(&self) -> u32 {
        self.set_status_calls.load(Ordering::SeqCst)
    }

    fn inject(counter: &AtomicU32, operation: &str) -> Result<(), StoreError> {
        let hit = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hit {
            Err(StoreError::Unavailable(format!("injected {} failure", operation)))
        } else {
            Ok(())
        }
    }
}

impl ApprovalStore for FlakyStore {
    fn get(&self, id: &str) -> Result<Option<PendingApproval>, StoreError> {
        Self::inject(&self.get_failures, "get")?;
        self.inner.get(id)
    }

    fn upsert(&self, record: &PendingApproval) -> Result<PendingApproval, StoreError> {
        Self::inject(&self.upsert_failures, "upsert")?;
        self.inner.upsert(record)
    }

    fn set_status(&self, id: &str, update: &StatusUpdate) -> Result<PendingApproval, StoreError> {
        self.set_status_calls.fetch_add(1, Ordering::SeqCst);
        Self::inject(&self.set_status_failures, "set_status")?;
        let stored = self.inner.set_status(id, update)?;
        Self::inject(&self.set_status_lost_acks, "set_status ack")?;
        Ok(stored)
    }

    fn list(&self, filter: &ApprovalFilter) -> Result<Vec<PendingApproval>, StoreError> {
        self.inner.list(filter)
    }

    fn count(&self, filter: &ApprovalFilter) -> Result<i64, StoreError> {
        self.inner.count(filter)
    }
}
