use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::approval::{DecisionEvent, PendingApproval, Resolution, ResolutionOutcome, ResolveError};
use crate::item::Item;
use crate::notify::FailureNotice;

use super::ChannelError;

/// Result of publishing an item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishResult {
    /// Public URL of the post.
    pub url: String,
    pub message_id: i64,
}

/// Publish surface. Only called for approved items.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, item: &Item) -> Result<PublishResult, ChannelError>;
}

/// Where reviewers see pending items and resolution outcomes.
#[async_trait]
pub trait ReviewSurface: Send + Sync {
    /// Show a new pending item with its approve/decline controls.
    async fn present(&self, record: &PendingApproval) -> Result<(), ChannelError>;

    /// Tell the reviewer how a decision was resolved.
    async fn report(
        &self,
        event: &DecisionEvent,
        outcome: &Result<Resolution, ResolveError>,
    ) -> Result<(), ChannelError>;
}

/// Failure notification surface.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &FailureNotice) -> Result<(), ChannelError>;
}

/// One-line, reviewer-facing summary of a resolution outcome.
pub fn describe_resolution(
    event: &DecisionEvent,
    outcome: &Result<Resolution, ResolveError>,
) -> String {
    match outcome {
        Ok(resolution) => {
            let title = resolution.record.title();
            match &resolution.outcome {
                ResolutionOutcome::Published { url } => {
                    format!("✅ Approved & Posted: {} ({})", title, url)
                }
                ResolutionOutcome::Declined => format!("❌ Declined: {}", title),
                ResolutionOutcome::AlreadyResolved { status } => {
                    format!("ℹ️ Already {}: {}", status, title)
                }
            }
        }
        Err(ResolveError::NotFound(id)) => {
            format!("⚠️ Post data not found ({})", id)
        }
        Err(e) => format!("⚠️ Could not {} {}: {}", event.decision.as_str(), event.item_id, e),
    }
}
