//! Cross-source duplicate control.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::approval::{ApprovalFilter, ApprovalStore, PendingApproval};
use crate::item::Item;
use crate::stage::{SideEffect, Stage, StageError};

use super::gateway::{ChatModel, Sampling};

const MAX_ARTICLE_CHARS: usize = 1000;
const MAX_EXCERPT_CHARS: usize = 200;
const MAX_RECENT: i64 = 50;

const DEDUP_SYSTEM: &str = r#"You are a duplicate detector for an AI news channel.
Compare the new article with the list of recent posts and decide whether it covers the same specific news event as any of them.

Duplicate: the same product launch or release, the same company announcement, the same feature update to the same tool, even from a different source or with different wording.
Not duplicate: different news about the same company, follow-ups with genuinely new information, similar topics with different announcements.

Be strict: only flag the same specific event. Answer with strict JSON:
{"is_duplicate": false, "duplicate_of": "title of the matching post or empty string", "reason": "one sentence"}"#;

/// Skips articles that report an event already covered by a recently
/// stored post, even when it came from another source.
///
/// Fails open: if the store or the model cannot be reached the article is
/// let through.
pub struct SemanticDuplicateFilter {
    store: Arc<dyn ApprovalStore>,
    gateway: Arc<dyn ChatModel>,
    model: String,
    window: Duration,
}

impl SemanticDuplicateFilter {
    pub const NAME: &'static str = "semantic_dedup";

    pub fn new(
        store: Arc<dyn ApprovalStore>,
        gateway: Arc<dyn ChatModel>,
        model: impl Into<String>,
        window_days: u32,
    ) -> Self {
        Self {
            store,
            gateway,
            model: model.into(),
            window: Duration::days(i64::from(window_days)),
        }
    }

    fn recent(&self) -> Result<Vec<PendingApproval>, String> {
        let filter = ApprovalFilter::new()
            .with_created_after(Utc::now() - self.window)
            .with_limit(MAX_RECENT);
        self.store.list(&filter).map_err(|e| e.to_string())
    }

    /// `Some(title)` of the matching post when the article is a duplicate.
    fn find_duplicate(&self, item: &Item) -> Result<Option<String>, String> {
        let recent = self.recent()?;
        if recent.is_empty() {
            debug!(item_id = %item.id, "No recent posts to compare against");
            return Ok(None);
        }

        let prompt = prompt(item, &recent);
        let answer = self.gateway.complete_json(
            &self.model,
            DEDUP_SYSTEM,
            &prompt,
            Sampling {
                temperature: 0.2,
                max_tokens: 1500,
            },
        )?;

        let duplicate = answer
            .get("is_duplicate")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !duplicate {
            return Ok(None);
        }

        let of = answer
            .get("duplicate_of")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let reason = answer.get("reason").and_then(Value::as_str).unwrap_or_default();
        info!(item_id = %item.id, title = %item.title(), duplicate_of = %of, reason, "Duplicate of a recent post");
        Ok(Some(of))
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn prompt(item: &Item, recent: &[PendingApproval]) -> String {
    let mut existing = String::new();
    for (n, record) in recent.iter().enumerate() {
        let post = record.snapshot.field_str("post_text").unwrap_or_default();
        let _ = write!(
            existing,
            "\n{}. Title: {}\n   Text: {}\n",
            n + 1,
            record.snapshot.title(),
            excerpt(post, MAX_EXCERPT_CHARS)
        );
    }

    format!(
        "## New article:\nTitle: {}\nText: {}\n\n## Existing recent posts:\n{}",
        item.title(),
        excerpt(item.field_str("text").unwrap_or_default(), MAX_ARTICLE_CHARS),
        existing
    )
}

impl Stage for SemanticDuplicateFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::External
    }

    fn execute(&self, item: Item) -> Result<Option<Item>, StageError> {
        match self.find_duplicate(&item) {
            Ok(Some(_)) => Ok(None),
            Ok(None) => Ok(Some(item)),
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "Duplicate check failed, letting article through");
                Ok(Some(item))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::SqliteApprovalStore;
    use serde_json::json;
    use std::sync::Mutex;

    struct ScriptedModel {
        answer: Result<Value, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(answer: Result<Value, String>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    impl ChatModel for ScriptedModel {
        fn complete_json(
            &self,
            _model: &str,
            _system: &str,
            prompt: &str,
            _sampling: Sampling,
        ) -> Result<Value, String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answer.clone()
        }
    }

    fn store_with_recent_post() -> Arc<SqliteApprovalStore> {
        let store = Arc::new(SqliteApprovalStore::in_memory().unwrap());
        let posted = Item::new("verge", "https://verge.example/copilot-sdk")
            .with_field("title", "GitHub ships Copilot SDK")
            .with_field("post_text", "<b>Copilot SDK is out</b>");
        store.upsert(&PendingApproval::from_item(&posted)).unwrap();
        store
    }

    fn article() -> Item {
        Item::new("techcrunch", "https://techcrunch.example/github-sdk")
            .with_field("title", "GitHub opens Copilot runtime")
            .with_field("text", "GitHub released the Copilot agent runtime as an SDK.")
    }

    #[test]
    fn test_duplicate_is_skipped() {
        let model = ScriptedModel::new(Ok(json!({
            "is_duplicate": true,
            "duplicate_of": "GitHub ships Copilot SDK",
            "reason": "Same launch"
        })));
        let filter = SemanticDuplicateFilter::new(store_with_recent_post(), model.clone(), "m", 3);

        assert!(filter.execute(article()).unwrap().is_none());
        let prompt = &model.prompts.lock().unwrap()[0];
        assert!(prompt.contains("1. Title: GitHub ships Copilot SDK"));
        assert!(prompt.contains("Title: GitHub opens Copilot runtime"));
    }

    #[test]
    fn test_distinct_article_passes() {
        let model = ScriptedModel::new(Ok(json!({ "is_duplicate": false, "duplicate_of": "" })));
        let filter = SemanticDuplicateFilter::new(store_with_recent_post(), model, "m", 3);
        assert!(filter.execute(article()).unwrap().is_some());
    }

    #[test]
    fn test_no_recent_posts_skips_the_model() {
        let store = Arc::new(SqliteApprovalStore::in_memory().unwrap());
        let model = ScriptedModel::new(Ok(json!({ "is_duplicate": true })));
        let filter = SemanticDuplicateFilter::new(store, model.clone(), "m", 3);

        assert!(filter.execute(article()).unwrap().is_some());
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_old_posts_are_outside_the_window() {
        let store = Arc::new(SqliteApprovalStore::in_memory().unwrap());
        let mut old = PendingApproval::from_item(&Item::new("verge", "https://verge.example/old"));
        old.created_at = Utc::now() - Duration::days(10);
        store.upsert(&old).unwrap();

        let model = ScriptedModel::new(Ok(json!({ "is_duplicate": true })));
        let filter = SemanticDuplicateFilter::new(store, model.clone(), "m", 3);
        assert!(filter.execute(article()).unwrap().is_some());
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_model_error_lets_article_through() {
        let model = ScriptedModel::new(Err("HTTP 502".to_string()));
        let filter = SemanticDuplicateFilter::new(store_with_recent_post(), model, "m", 3);
        assert!(filter.execute(article()).unwrap().is_some());
    }
}
