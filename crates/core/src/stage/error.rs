//! Stage errors.

use std::time::Duration;

use thiserror::Error;

/// Error raised by a stage (or on its behalf by the offload pool).
///
/// Always scoped to a single item: the executor drops the item, reports
/// the failure and carries on with the rest of the batch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StageError {
    /// The stage itself failed.
    #[error("stage '{stage}' failed: {message}")]
    Failed { stage: String, message: String },

    /// The stage did not finish within the offload timeout.
    #[error("stage '{stage}' timed out after {}s", .after.as_secs_f64())]
    Timeout { stage: String, after: Duration },
}

impl StageError {
    pub fn failed(stage: impl Into<String>, message: impl Into<String>) -> Self {
        StageError::Failed {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn stage_name(&self) -> &str {
        match self {
            StageError::Failed { stage, .. } | StageError::Timeout { stage, .. } => stage,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, StageError::Timeout { .. })
    }
}
