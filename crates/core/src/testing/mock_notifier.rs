//! Mock notifier for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::channel::{ChannelError, Notifier};
use crate::notify::FailureNotice;

/// Records delivered notices. A failing notifier rejects every notice but
/// still counts the attempt.
#[derive(Debug, Default)]
pub struct MockNotifier {
    notices: Mutex<Vec<FailureNotice>>,
    attempts: AtomicUsize,
    failing: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn notices(&self) -> Vec<FailureNotice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, notice: &FailureNotice) -> Result<(), ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(ChannelError::Http("notifier offline".to_string()));
        }
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice.clone());
        }
        Ok(())
    }
}
