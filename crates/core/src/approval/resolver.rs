//! Approval resolution: turns a reviewer decision into a terminal action.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::channel::Publisher;
use crate::metrics;
use crate::offload::OffloadPool;

use super::{
    ApprovalCache, ApprovalStatus, ApprovalStore, Decision, DecisionEvent, PendingApproval,
    RetryPolicy, StatusUpdate, StoreError,
};

/// What a resolution did.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// Approved and published.
    Published { url: String },
    /// Declined, nothing published.
    Declined,
    /// The record was already terminal; nothing was done.
    AlreadyResolved { status: ApprovalStatus },
}

impl ResolutionOutcome {
    fn label(&self) -> &'static str {
        match self {
            ResolutionOutcome::Published { .. } => "published",
            ResolutionOutcome::Declined => "declined",
            ResolutionOutcome::AlreadyResolved { .. } => "already_resolved",
        }
    }
}

/// Successful resolution of a decision event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resolution {
    pub item_id: String,
    /// Terminal status of the record after resolution.
    pub status: ApprovalStatus,
    pub outcome: ResolutionOutcome,
    /// The record as persisted.
    pub record: PendingApproval,
}

/// Errors from resolving a decision.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolveError {
    /// No record exists for the identifier. Reported, never retried.
    #[error("no approval record for item {0}")]
    NotFound(String),

    /// The store stayed unavailable after retries, or returned bad data.
    #[error("store {operation} failed: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// The publish surface rejected the item. The record stays pending.
    #[error("publishing item {item_id} failed: {message}")]
    Publish { item_id: String, message: String },

    /// Another writer moved the record to a terminal status first.
    #[error("item {item_id} was already {current}")]
    Conflict {
        item_id: String,
        current: ApprovalStatus,
    },
}

impl ResolveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound(_))
    }

    /// True when the durable store could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ResolveError::Store { source, .. } if source.is_retryable())
    }

    fn label(&self) -> &'static str {
        match self {
            ResolveError::NotFound(_) => "not_found",
            ResolveError::Store { .. } => "store_error",
            ResolveError::Publish { .. } => "publish_error",
            ResolveError::Conflict { .. } => "conflict",
        }
    }
}

/// Resolves decision events against the cache and the durable store.
///
/// The store is authoritative. The cache only saves the store read for
/// declines; an approval always confirms the stored status before it
/// publishes. With an empty cache every path still resolves correctly.
pub struct ApprovalResolver {
    store: Arc<dyn ApprovalStore>,
    pool: OffloadPool,
    publisher: Arc<dyn Publisher>,
    retry: RetryPolicy,
}

impl ApprovalResolver {
    pub fn new(
        store: Arc<dyn ApprovalStore>,
        pool: OffloadPool,
        publisher: Arc<dyn Publisher>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            pool,
            publisher,
            retry,
        }
    }

    /// Resolve one decision event.
    ///
    /// Redelivered events are safe: once the terminal status is persisted,
    /// later events for the same item return `AlreadyResolved` without
    /// publishing again.
    pub async fn resolve(
        &self,
        cache: &mut ApprovalCache,
        event: &DecisionEvent,
    ) -> Result<Resolution, ResolveError> {
        let result = self.resolve_inner(cache, event).await;

        let label = match &result {
            Ok(resolution) => resolution.outcome.label(),
            Err(e) => e.label(),
        };
        metrics::RESOLUTIONS_TOTAL.with_label_values(&[label]).inc();

        result
    }

    async fn resolve_inner(
        &self,
        cache: &mut ApprovalCache,
        event: &DecisionEvent,
    ) -> Result<Resolution, ResolveError> {
        let id = event.item_id.as_str();

        let record = match cache.get(id) {
            // A publish already went out; only the status write is left.
            Some(record) if record.publish_url.is_some() => record.clone(),
            Some(record) if matches!(event.decision, Decision::Decline) => {
                debug!(item_id = %id, "Resolving from cache");
                record.clone()
            }
            cached => {
                // Approvals publish irreversibly, so the status is read from
                // the store even when the cache holds the record.
                debug!(item_id = %id, cached = cached.is_some(), "Reading store");
                self.load(id)
                    .await?
                    .ok_or_else(|| ResolveError::NotFound(id.to_string()))?
            }
        };

        if record.status.is_terminal() {
            cache.remove(id);
            info!(item_id = %id, status = %record.status, "Decision for already resolved item ignored");
            return Ok(Resolution {
                item_id: record.id.clone(),
                status: record.status,
                outcome: ResolutionOutcome::AlreadyResolved {
                    status: record.status,
                },
                record,
            });
        }

        let mut update = StatusUpdate::new(event.decision.target_status()).with_resolved_by(&event.actor);
        let outcome = match event.decision {
            Decision::Approve => {
                let url = match &record.publish_url {
                    // Published on an earlier attempt whose status write failed.
                    Some(url) => url.clone(),
                    None => {
                        self.publisher
                            .publish(&record.snapshot)
                            .await
                            .map_err(|e| ResolveError::Publish {
                                item_id: id.to_string(),
                                message: e.to_string(),
                            })?
                            .url
                    }
                };
                update = update.with_publish_url(&url);
                ResolutionOutcome::Published { url }
            }
            Decision::Decline => ResolutionOutcome::Declined,
        };

        match self.persist(id, update).await {
            Ok(stored) => {
                cache.remove(id);
                info!(
                    item_id = %id,
                    actor = %event.actor,
                    status = %stored.status,
                    "Decision resolved"
                );
                Ok(Resolution {
                    item_id: stored.id.clone(),
                    status: stored.status,
                    outcome,
                    record: stored,
                })
            }
            Err(StoreError::InvalidTransition { current, .. }) => {
                cache.remove(id);
                warn!(item_id = %id, current = %current, "Record resolved concurrently");
                Err(ResolveError::Conflict {
                    item_id: id.to_string(),
                    current,
                })
            }
            Err(source) => {
                match &outcome {
                    ResolutionOutcome::Published { url } => {
                        // Remember the publish so a redelivered approval only
                        // retries the status write.
                        let mut published = record;
                        published.publish_url = Some(url.clone());
                        cache.insert(published);
                    }
                    _ => {
                        // The write may have committed; the cached status is
                        // no longer trustworthy.
                        cache.remove(id);
                    }
                }
                Err(ResolveError::Store {
                    operation: "set_status",
                    source,
                })
            }
        }
    }

    async fn load(&self, id: &str) -> Result<Option<PendingApproval>, ResolveError> {
        let store = Arc::clone(&self.store);
        let key = id.to_string();
        self.retry
            .run_offloaded(&self.pool, "get", move || store.get(&key))
            .await
            .map_err(|source| ResolveError::Store {
                operation: "get",
                source,
            })
    }

    async fn persist(&self, id: &str, update: StatusUpdate) -> Result<PendingApproval, StoreError> {
        let store = Arc::clone(&self.store);
        let key = id.to_string();
        self.retry
            .run_offloaded(&self.pool, "set_status", move || store.set_status(&key, &update))
            .await
    }
}
