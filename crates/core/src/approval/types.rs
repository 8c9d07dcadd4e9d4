//! Approval data types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::{Item, ItemStatus};

/// Status of a pending-approval record.
///
/// Transitions are monotonic: `Pending` moves to exactly one terminal status
/// and never back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Declined,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Declined => "declined",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }

    /// Whether a record in this status may move to `next`.
    pub fn can_transition_to(&self, next: ApprovalStatus) -> bool {
        matches!(self, ApprovalStatus::Pending) && next.is_terminal()
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "declined" => Ok(ApprovalStatus::Declined),
            other => Err(format!("unknown approval status: {}", other)),
        }
    }
}

/// A reviewer's decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    #[serde(alias = "approved")]
    Approve,
    #[serde(alias = "declined")]
    Decline,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Decline => "decline",
        }
    }

    /// Status the record ends up in when this decision is applied.
    pub fn target_status(&self) -> ApprovalStatus {
        match self {
            Decision::Approve => ApprovalStatus::Approved,
            Decision::Decline => ApprovalStatus::Declined,
        }
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Ok(Decision::Approve),
            "decline" | "declined" => Ok(Decision::Decline),
            other => Err(format!("unknown decision: {}", other)),
        }
    }
}

/// Durable record of an item awaiting a human decision.
///
/// `id` equals the item id so resolution is a direct lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingApproval {
    pub id: String,
    /// Snapshot of the item, enough to publish without re-running stages.
    pub snapshot: Item,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Who resolved the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    /// Where the item was published (approved records only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_url: Option<String>,
}

impl PendingApproval {
    /// Build a fresh pending record from an item that finished the stage chain.
    pub fn from_item(item: &Item) -> Self {
        let now = Utc::now();
        let mut snapshot = item.clone();
        snapshot.status = ItemStatus::PendingApproval;
        Self {
            id: item.id.clone(),
            snapshot,
            status: ApprovalStatus::Pending,
            created_at: now,
            updated_at: now,
            resolved_by: None,
            publish_url: None,
        }
    }

    pub fn title(&self) -> &str {
        self.snapshot.title()
    }
}

/// Reviewer-side message a decision was made on, used to report the outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewerMessage {
    pub chat_id: i64,
    pub message_id: i64,
}

/// Inbound decision event. Delivery is at-least-once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionEvent {
    pub item_id: String,
    pub decision: Decision,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReviewerMessage>,
    pub received_at: DateTime<Utc>,
}

impl DecisionEvent {
    pub fn new(item_id: impl Into<String>, decision: Decision, actor: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            decision,
            actor: actor.into(),
            reply_to: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_reply_to(mut self, message: ReviewerMessage) -> Self {
        self.reply_to = Some(message);
        self
    }
}

/// Parse reviewer button data of the form `approve:<id>` / `decline:<id>`.
pub fn parse_callback_data(data: &str) -> Option<(Decision, String)> {
    let (action, id) = data.split_once(':')?;
    let id = id.trim();
    if id.is_empty() {
        return None;
    }
    let decision = action.parse().ok()?;
    Some((decision, id.to_string()))
}

/// Callback data for a reviewer button.
pub(crate) fn callback_data(decision: Decision, id: &str) -> String {
    format!("{}:{}", decision.as_str(), id)
}
