//! Approval workflow: durable pending-approval records and decision resolution.
//!
//! The durable store is the source of truth. The in-memory cache held by the
//! execution context only short-circuits store reads for records created in
//! this process; every resolution path is correct with an empty cache.

mod cache;
mod resolver;
mod retry;
mod sqlite_store;
mod store;
mod types;

pub use cache::ApprovalCache;
pub use resolver::{ApprovalResolver, Resolution, ResolutionOutcome, ResolveError};
pub use retry::RetryPolicy;
pub use sqlite_store::SqliteApprovalStore;
pub use store::{ApprovalFilter, ApprovalStore, StatusUpdate, StoreError};
pub(crate) use types::callback_data;
pub use types::{
    parse_callback_data, ApprovalStatus, Decision, DecisionEvent, PendingApproval,
    ReviewerMessage,
};
