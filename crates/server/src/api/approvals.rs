//! Approval API handlers.
//!
//! Reads go to the durable store through the offload pool. Decisions are
//! submitted to the execution context, the same path reviewer button
//! presses take, so the API never resolves anything on its own.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use newsroom_core::{
    ApprovalFilter, ApprovalStatus, Decision, DecisionEvent, Item, OrchestratorError,
    PendingApproval, ResolutionOutcome, ResolveError, StoreError,
};

use crate::state::AppState;

/// Maximum allowed limit for approval queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for approval queries
const DEFAULT_LIMIT: i64 = 100;

/// Actor recorded when the request names none.
const DEFAULT_ACTOR: &str = "api";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing approvals
#[derive(Debug, Deserialize)]
pub struct ListApprovalsParams {
    /// Filter by status (pending, approved, declined)
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Request body for submitting a decision
#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    /// "approve" or "decline"
    pub decision: String,
    /// Who made the decision
    pub actor: Option<String>,
}

/// Response for a single approval record
#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub id: String,
    pub status: ApprovalStatus,
    pub title: String,
    pub source: String,
    pub url: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_url: Option<String>,
    pub snapshot: Item,
}

impl From<PendingApproval> for ApprovalResponse {
    fn from(record: PendingApproval) -> Self {
        Self {
            title: record.title().to_string(),
            source: record.snapshot.source.clone(),
            url: record.snapshot.url.clone(),
            id: record.id,
            status: record.status,
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
            resolved_by: record.resolved_by,
            publish_url: record.publish_url,
            snapshot: record.snapshot,
        }
    }
}

/// Response for listing approvals
#[derive(Debug, Serialize)]
pub struct ListApprovalsResponse {
    pub approvals: Vec<ApprovalResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Response for a resolved decision
#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub item_id: String,
    pub status: ApprovalStatus,
    pub outcome: ResolutionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_url: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

fn store_error(e: StoreError) -> ApiError {
    let status = if e.is_retryable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    api_error(status, e.to_string())
}

fn resolve_error(e: ResolveError) -> ApiError {
    let status = match &e {
        ResolveError::NotFound(_) => StatusCode::NOT_FOUND,
        ResolveError::Conflict { .. } => StatusCode::CONFLICT,
        ResolveError::Publish { .. } => StatusCode::BAD_GATEWAY,
        ResolveError::Store { .. } if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
        ResolveError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

fn orchestrator_error(e: OrchestratorError) -> ApiError {
    let status = match e {
        OrchestratorError::Stopped => StatusCode::SERVICE_UNAVAILABLE,
        OrchestratorError::NoReply => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// List approval records, newest first
pub async fn list_approvals(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListApprovalsParams>,
) -> Result<Json<ListApprovalsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = ApprovalFilter::new().with_limit(limit).with_offset(offset);
    if let Some(ref status) = params.status {
        let status: ApprovalStatus = status
            .parse()
            .map_err(|e: String| api_error(StatusCode::BAD_REQUEST, e))?;
        filter = filter.with_status(status);
    }

    let store = state.store();
    let (records, total) = state
        .pool()
        .offload_store("api.list_approvals", move || {
            let records = store.list(&filter)?;
            let total = store.count(&filter)?;
            Ok::<_, StoreError>((records, total))
        })
        .await
        .map_err(|e| store_error(e.into()))?
        .map_err(store_error)?;

    Ok(Json(ListApprovalsResponse {
        approvals: records.into_iter().map(ApprovalResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// Get one approval record by item id
pub async fn get_approval(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    let store = state.store();
    let lookup_id = id.clone();
    let record = state
        .pool()
        .offload_store("api.get_approval", move || store.get(&lookup_id))
        .await
        .map_err(|e| store_error(e.into()))?
        .map_err(store_error)?;

    match record {
        Some(record) => Ok(Json(ApprovalResponse::from(record))),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Approval not found: {}", id),
        )),
    }
}

/// Submit an approve/decline decision for an item
pub async fn submit_decision(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<DecisionBody>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let decision: Decision = body
        .decision
        .parse()
        .map_err(|e: String| api_error(StatusCode::BAD_REQUEST, e))?;
    let actor = body
        .actor
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ACTOR.to_string());

    info!(item_id = %id, decision = decision.as_str(), actor = %actor, "Decision submitted via API");

    let resolution = state
        .orchestrator()
        .submit(DecisionEvent::new(id, decision, actor))
        .await
        .map_err(orchestrator_error)?
        .map_err(resolve_error)?;

    Ok(Json(DecisionResponse {
        publish_url: resolution.record.publish_url.clone(),
        item_id: resolution.item_id,
        status: resolution.status,
        outcome: resolution.outcome,
    }))
}
