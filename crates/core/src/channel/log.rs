use async_trait::async_trait;
use tracing::{info, warn};

use crate::approval::{DecisionEvent, PendingApproval, Resolution, ResolveError};
use crate::item::Item;
use crate::notify::FailureNotice;

use super::{describe_resolution, ChannelError, Notifier, PublishResult, Publisher, ReviewSurface};

/// Notifier that only logs.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &FailureNotice) -> Result<(), ChannelError> {
        warn!(
            operation = %notice.operation,
            item_id = notice.item_id.as_deref().unwrap_or("-"),
            stage = notice.stage.as_deref().unwrap_or("-"),
            "Failure notice: {}",
            notice.message
        );
        Ok(())
    }
}

/// Review surface that only logs. Decisions then arrive through the HTTP API.
#[derive(Debug, Default, Clone)]
pub struct LogReviewSurface;

#[async_trait]
impl ReviewSurface for LogReviewSurface {
    async fn present(&self, record: &PendingApproval) -> Result<(), ChannelError> {
        info!(item_id = %record.id, title = %record.title(), "Awaiting approval");
        Ok(())
    }

    async fn report(
        &self,
        event: &DecisionEvent,
        outcome: &Result<Resolution, ResolveError>,
    ) -> Result<(), ChannelError> {
        info!(item_id = %event.item_id, actor = %event.actor, "{}", describe_resolution(event, outcome));
        Ok(())
    }
}

/// Publisher used when no channel is configured. Every publish fails, so
/// approved items stay pending until a real publisher is available.
#[derive(Debug, Default, Clone)]
pub struct UnconfiguredPublisher;

#[async_trait]
impl Publisher for UnconfiguredPublisher {
    async fn publish(&self, _item: &Item) -> Result<PublishResult, ChannelError> {
        Err(ChannelError::NotConfigured("publisher".to_string()))
    }
}
