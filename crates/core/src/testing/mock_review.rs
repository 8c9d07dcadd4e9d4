//! Mock review surface for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::approval::{DecisionEvent, PendingApproval, Resolution, ResolveError};
use crate::channel::{ChannelError, ReviewSurface};

/// A recorded resolution report.
#[derive(Debug, Clone)]
pub struct RecordedReport {
    pub event: DecisionEvent,
    pub outcome: Result<Resolution, ResolveError>,
}

/// Records presented records and resolution reports.
#[derive(Debug, Default)]
pub struct MockReviewSurface {
    presented: Mutex<Vec<PendingApproval>>,
    reports: Mutex<Vec<RecordedReport>>,
    fail_present: AtomicBool,
    panic_present: AtomicBool,
}

impl MockReviewSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every following `present` fails.
    pub fn fail_present(&self) {
        self.fail_present.store(true, Ordering::SeqCst);
    }

    /// Every following `present` panics.
    pub fn panic_present(&self) {
        self.panic_present.store(true, Ordering::SeqCst);
    }

    pub fn presented(&self) -> Vec<PendingApproval> {
        self.presented.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn reports(&self) -> Vec<RecordedReport> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ReviewSurface for MockReviewSurface {
    async fn present(&self, record: &PendingApproval) -> Result<(), ChannelError> {
        if self.panic_present.load(Ordering::SeqCst) {
            panic!("review surface exploded on {}", record.id);
        }
        if self.fail_present.load(Ordering::SeqCst) {
            return Err(ChannelError::Http("review chat unreachable".to_string()));
        }
        if let Ok(mut presented) = self.presented.lock() {
            presented.push(record.clone());
        }
        Ok(())
    }

    async fn report(
        &self,
        event: &DecisionEvent,
        outcome: &Result<Resolution, ResolveError>,
    ) -> Result<(), ChannelError> {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(RecordedReport {
                event: event.clone(),
                outcome: outcome.clone(),
            });
        }
        Ok(())
    }
}
