use std::sync::Arc;

use tokio::sync::mpsc;

use crate::channel::Notifier;

use super::{FailureNotice, NotifyHandle};

/// Background task that forwards failure notices to a notifier.
pub struct NotifyWriter {
    rx: mpsc::Receiver<FailureNotice>,
    notifier: Arc<dyn Notifier>,
}

impl NotifyWriter {
    pub fn new(rx: mpsc::Receiver<FailureNotice>, notifier: Arc<dyn Notifier>) -> Self {
        Self { rx, notifier }
    }

    /// Run until every handle is dropped.
    pub async fn run(mut self) {
        tracing::info!("Notify writer started");

        while let Some(notice) = self.rx.recv().await {
            tracing::error!(
                operation = %notice.operation,
                item_id = notice.item_id.as_deref().unwrap_or("-"),
                stage = notice.stage.as_deref().unwrap_or("-"),
                "{}",
                notice.message
            );

            if let Err(e) = self.notifier.notify(&notice).await {
                tracing::warn!("Failed to deliver failure notice: {}", e);
            }
        }

        tracing::info!("Notify writer shutting down");
    }
}

/// Create the notification system.
///
/// Returns the handle to clone into every component and the writer to spawn
/// with `tokio::spawn(writer.run())`.
pub fn create_notify_system(
    notifier: Arc<dyn Notifier>,
    buffer_size: usize,
) -> (NotifyHandle, NotifyWriter) {
    let (tx, rx) = mpsc::channel(buffer_size.max(1));
    (NotifyHandle::new(tx), NotifyWriter::new(rx, notifier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockNotifier;

    #[tokio::test]
    async fn test_writer_delivers_notices() {
        let notifier = Arc::new(MockNotifier::new());
        let (handle, writer) = create_notify_system(notifier.clone(), 10);
        let writer_handle = tokio::spawn(writer.run());

        handle.notify(FailureNotice::new("fetch", "source down"));
        handle.notify(FailureNotice::new("resolve", "store down"));
        drop(handle);
        writer_handle.await.unwrap();

        let delivered = notifier.notices();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].operation, "fetch");
    }

    #[tokio::test]
    async fn test_writer_continues_on_notifier_failure() {
        let notifier = Arc::new(MockNotifier::failing());
        let (handle, writer) = create_notify_system(notifier.clone(), 10);
        let writer_handle = tokio::spawn(writer.run());

        handle.notify(FailureNotice::new("a", "1"));
        handle.notify(FailureNotice::new("b", "2"));
        drop(handle);

        writer_handle.await.unwrap();
        assert_eq!(notifier.attempts(), 2);
    }
}
