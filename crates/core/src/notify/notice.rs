use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stage::StageError;

/// A reported failure with enough context to diagnose it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureNotice {
    /// What was being done ("pipeline", "fetch", "resolve", "store.upsert", ...).
    pub operation: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    pub at: DateTime<Utc>,
}

impl FailureNotice {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
            item_id: None,
            stage: None,
            at: Utc::now(),
        }
    }

    pub fn with_item(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// A stage failed for one item.
    pub fn stage_failure(item_id: &str, error: &StageError) -> Self {
        Self::new("pipeline", error.to_string())
            .with_item(item_id)
            .with_stage(error.stage_name())
    }

    /// A durable store operation gave up.
    pub fn store_failure(operation: &str, item_id: &str, message: impl Into<String>) -> Self {
        Self::new(format!("store.{}", operation), message).with_item(item_id)
    }

    /// A panic caught at a scheduler tick or event handler boundary.
    pub fn crash(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(operation, format!("crashed: {}", message.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failure_carries_context() {
        let err = StageError::failed("summarize", "model returned garbage");
        let notice = FailureNotice::stage_failure("abc", &err);
        assert_eq!(notice.operation, "pipeline");
        assert_eq!(notice.item_id.as_deref(), Some("abc"));
        assert_eq!(notice.stage.as_deref(), Some("summarize"));
        assert!(notice.message.contains("model returned garbage"));
    }

    #[test]
    fn test_crash_notice() {
        let notice = FailureNotice::crash("scheduler_tick", "index out of bounds");
        assert_eq!(notice.operation, "scheduler_tick");
        assert_eq!(notice.message, "crashed: index out of bounds");
        assert!(notice.item_id.is_none());
    }
}
