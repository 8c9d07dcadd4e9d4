//! Core item data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Lifecycle status of an item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Freshly fetched, no stage has run yet.
    #[default]
    New,
    /// Stages are being applied.
    Processing,
    /// Full chain succeeded, waiting for a reviewer.
    PendingApproval,
    /// Approved and published.
    Published,
    /// Declined by a reviewer.
    Declined,
    /// Dropped after an unrecoverable stage error.
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::New => "new",
            ItemStatus::Processing => "processing",
            ItemStatus::PendingApproval => "pending_approval",
            ItemStatus::Published => "published",
            ItemStatus::Declined => "declined",
            ItemStatus::Failed => "failed",
        }
    }
}

/// A single unit of content moving through the pipeline.
///
/// Stages only ever add or rewrite entries in `fields`; the map keeps
/// insertion order so a snapshot reads in the order stages produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    /// Stable identifier derived from the article URL.
    pub id: String,
    /// Name of the source that produced the item.
    pub source: String,
    /// Canonical article URL.
    pub url: String,
    /// Stage-produced fields.
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// Current status.
    #[serde(default)]
    pub status: ItemStatus,
    /// When the item was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl Item {
    /// Create a new item for an article URL.
    pub fn new(source: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: item_id_for_url(&url),
            source: source.into(),
            url,
            fields: Map::new(),
            status: ItemStatus::New,
            fetched_at: Utc::now(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(key, value);
        self
    }

    /// Set (or overwrite) a field. Overwriting keeps the original position.
    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String field, `None` when missing, non-string or blank.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Human readable title, falling back to the URL.
    pub fn title(&self) -> &str {
        self.field_str("title").unwrap_or(&self.url)
    }
}

/// Derive an item identifier from its URL.
///
/// The first 16 bytes of the SHA-256 digest, hex encoded. Deterministic so
/// the same article fetched twice maps to the same durable record.
pub fn item_id_for_url(url: &str) -> String {
    let digest = Sha256::digest(url.trim().as_bytes());
    digest[..16].iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_deterministic() {
        let a = Item::new("src", "https://example.com/a");
        let b = Item::new("other", "https://example.com/a");
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 32);
        assert_ne!(a.id, Item::new("src", "https://example.com/b").id);
    }

    #[test]
    fn test_fields_keep_insertion_order() {
        let mut item = Item::new("src", "https://example.com/a")
            .with_field("text", "body")
            .with_field("title", "Title");
        item.set_field("text", "rewritten");

        let keys: Vec<&String> = item.fields.keys().collect();
        assert_eq!(keys, vec!["text", "title"]);
        assert_eq!(item.field_str("text"), Some("rewritten"));
    }

    #[test]
    fn test_field_str_ignores_blank() {
        let item = Item::new("src", "https://example.com/a")
            .with_field("title", "   ")
            .with_field("count", 3);
        assert_eq!(item.field_str("title"), None);
        assert_eq!(item.field_str("count"), None);
        assert_eq!(item.title(), "https://example.com/a");
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ItemStatus::PendingApproval).unwrap();
        assert_eq!(json, "\"pending_approval\"");
        assert_eq!(ItemStatus::PendingApproval.as_str(), "pending_approval");
    }
}
