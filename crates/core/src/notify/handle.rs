use tokio::sync::mpsc;

use super::FailureNotice;

/// Handle for reporting failures.
///
/// Cheaply cloneable. Reporting never blocks: when the channel is full or
/// closed the notice is logged and dropped.
#[derive(Clone)]
pub struct NotifyHandle {
    tx: mpsc::Sender<FailureNotice>,
}

impl NotifyHandle {
    pub fn new(tx: mpsc::Sender<FailureNotice>) -> Self {
        Self { tx }
    }

    /// Report a failure. Returns true if the notice was queued.
    pub fn notify(&self, notice: FailureNotice) -> bool {
        match self.tx.try_send(notice) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Dropping failure notice: {}", e);
                false
            }
        }
    }
}
