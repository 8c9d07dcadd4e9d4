//! Durable approval store trait and types.

use chrono::{DateTime, Utc};

use crate::offload::OffloadError;

use super::{ApprovalStatus, PendingApproval};

/// Error type for durable store operations.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum StoreError {
    /// Record not found.
    #[error("approval record not found: {0}")]
    NotFound(String),

    /// Requested status change would reverse or switch a terminal status.
    #[error("cannot move approval {id} from {current} to {requested}")]
    InvalidTransition {
        id: String,
        current: ApprovalStatus,
        requested: ApprovalStatus,
    },

    /// The store could not be reached (locked database, I/O failure, timeout).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Only availability failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<OffloadError> for StoreError {
    fn from(err: OffloadError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Terminal status change applied by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: ApprovalStatus,
    pub resolved_by: Option<String>,
    pub publish_url: Option<String>,
}

impl StatusUpdate {
    pub fn new(status: ApprovalStatus) -> Self {
        Self {
            status,
            resolved_by: None,
            publish_url: None,
        }
    }

    pub fn with_resolved_by(mut self, actor: impl Into<String>) -> Self {
        self.resolved_by = Some(actor.into());
        self
    }

    pub fn with_publish_url(mut self, url: impl Into<String>) -> Self {
        self.publish_url = Some(url.into());
        self
    }
}

/// Filter for listing approval records.
#[derive(Debug, Clone)]
pub struct ApprovalFilter {
    /// Filter by status.
    pub status: Option<ApprovalStatus>,
    /// Only records created after this instant.
    pub created_after: Option<DateTime<Utc>>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl Default for ApprovalFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            created_after: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: ApprovalStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_created_after(mut self, after: DateTime<Utc>) -> Self {
        self.created_after = Some(after);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for durable approval storage backends.
///
/// Implementations are blocking; callers on the execution context must
/// reach them through the offload pool. Every write is safe to repeat.
pub trait ApprovalStore: Send + Sync {
    /// Get a record by item id.
    fn get(&self, id: &str) -> Result<Option<PendingApproval>, StoreError>;

    /// Insert the record if absent. If present and still pending, refresh
    /// its snapshot; terminal records are left untouched. Returns the record
    /// as stored.
    fn upsert(&self, record: &PendingApproval) -> Result<PendingApproval, StoreError>;

    /// Apply a terminal status. Repeating the current status is a no-op;
    /// any other change away from a terminal status is rejected.
    fn set_status(&self, id: &str, update: &StatusUpdate) -> Result<PendingApproval, StoreError>;

    /// List records matching the filter, newest first.
    fn list(&self, filter: &ApprovalFilter) -> Result<Vec<PendingApproval>, StoreError>;

    /// Count records matching the filter.
    fn count(&self, filter: &ApprovalFilter) -> Result<i64, StoreError>;
}
