//! Model-backed content stages.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::item::Item;
use crate::stage::{SideEffect, Stage, StageError};

use super::gateway::{ChatModel, Sampling};

const SKIP: &str = "SKIP";
const MAX_INPUT_CHARS: usize = 8000;

const SUMMARIZE_SYSTEM: &str = r#"You are an AI news analyst. Identify the single main news event in the article.
If the text is gibberish, too short, has no specific news, or is just an ad, list or tutorial, answer with SKIP.

Answer with strict JSON:
{"title": "Short descriptive title of the main event (3-8 words)", "text": "Only the essential facts, at most 1500 characters"}
or, for invalid input:
{"title": "SKIP", "text": "SKIP"}

Rules: focus on one event; remove promotion, author bios and newsletter plugs; keep names of tools, models, companies and products. Output only JSON."#;

const RELEVANCE_SYSTEM: &str = r#"You are a relevance filter for a channel covering AI tools and technology people can use.

Relevant: new AI tools, apps and platforms; major updates to existing tools; model releases developers can access; SDKs, APIs and frameworks; AI integrations into popular products; research that leads to usable tools; agent frameworks.
Not relevant: hardware announcements, earnings, funding, hiring, generic tutorials, opinion pieces, regulation news, papers without practical use, vague hype.

When in doubt, lean toward relevant. Answer with strict JSON:
{"is_relevant": true, "reason": "1-2 sentence explanation"}"#;

const WRITE_SYSTEM: &str = r#"You write short news updates for an English-language Telegram channel about AI tools and research.
Tone: confident, human, concise. One post covers one main point.
Length: 300-550 characters including HTML tags. Use only <b>, <i>, <u>, <s>, <code>, <pre> and <a href=""> tags.
Start with a bold header ending in one emoji, use 1-3 more emojis naturally, no rhetorical questions, no hype words.
Answer with strict JSON: {"post_text": "the post"}"#;

fn translate_system(language: &str) -> String {
    format!(
        r#"You rewrite Telegram posts in natural {language}, as if originally written by a native speaker.
Keep every HTML tag and emoji in place, keep the structure and all key facts, never change URLs, translate link text.
At most 700 characters. Answer with strict JSON: {{"post_text": "the rewritten post"}}"#
    )
}

fn review_system(language: &str) -> String {
    format!(
        r#"You are a {language} copy editor. You receive a {language} Telegram post and fix anything that does not read like native {language}: unnatural word order, phrases that sound translated, awkward word choices, grammar slips.
Keep every HTML tag and emoji in place, keep the meaning, key facts and length (at most 700 characters). If nothing needs fixing, return the text unchanged.
Answer with strict JSON: {{"post_text": "the polished post"}}"#
    )
}

/// Shorter reviewed output than this is treated as a broken answer.
const MIN_REVIEWED_CHARS: usize = 30;

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn required<'a>(item: &'a Item, field: &str, stage: &str) -> Result<&'a str, StageError> {
    item.field_str(field)
        .ok_or_else(|| StageError::failed(stage, format!("item has no '{}' field", field)))
}

fn answer_str<'a>(answer: &'a Value, key: &str) -> Option<&'a str> {
    answer.get(key).and_then(Value::as_str).map(str::trim)
}

/// Shared plumbing for the model-backed stages.
struct ModelCall {
    gateway: Arc<dyn ChatModel>,
    model: String,
    sampling: Sampling,
}

impl ModelCall {
    fn ask(&self, stage: &str, system: &str, prompt: &str) -> Result<Value, StageError> {
        self.gateway
            .complete_json(&self.model, system, prompt, self.sampling)
            .map_err(|e| StageError::failed(stage, e))
    }
}

/// Condenses the article to its main event. Skips non-news.
pub struct Summarizer {
    call: ModelCall,
}

impl Summarizer {
    pub const NAME: &'static str = "summarize";

    pub fn new(gateway: Arc<dyn ChatModel>, model: impl Into<String>) -> Self {
        Self {
            call: ModelCall {
                gateway,
                model: model.into(),
                sampling: Sampling {
                    temperature: 0.2,
                    max_tokens: 2000,
                },
            },
        }
    }
}

impl Stage for Summarizer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::External
    }

    fn execute(&self, mut item: Item) -> Result<Option<Item>, StageError> {
        let text = required(&item, "text", Self::NAME)?;
        let prompt = format!("## Article text:\n{}", truncate(text, MAX_INPUT_CHARS));
        let answer = self.call.ask(Self::NAME, SUMMARIZE_SYSTEM, &prompt)?;

        let (title, text) = match (answer_str(&answer, "title"), answer_str(&answer, "text")) {
            (Some(title), Some(text)) if title != SKIP && text != SKIP && !text.is_empty() => {
                (title.to_string(), text.to_string())
            }
            _ => {
                info!(item_id = %item.id, url = %item.url, "Summarizer skipped article");
                return Ok(None);
            }
        };

        debug!(item_id = %item.id, title = %title, "Summarized");
        item.set_field("title", title);
        item.set_field("text", text);
        Ok(Some(item))
    }
}

/// Drops articles that are off-topic for the channel.
pub struct RelevanceFilter {
    call: ModelCall,
}

impl RelevanceFilter {
    pub const NAME: &'static str = "relevance";

    pub fn new(gateway: Arc<dyn ChatModel>, model: impl Into<String>) -> Self {
        Self {
            call: ModelCall {
                gateway,
                model: model.into(),
                sampling: Sampling {
                    temperature: 0.3,
                    max_tokens: 1500,
                },
            },
        }
    }
}

impl Stage for RelevanceFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::External
    }

    fn execute(&self, mut item: Item) -> Result<Option<Item>, StageError> {
        let text = required(&item, "text", Self::NAME)?;
        let prompt = format!("## Article text:\n{}", text);
        let answer = self.call.ask(Self::NAME, RELEVANCE_SYSTEM, &prompt)?;

        let relevant = answer
            .get("is_relevant")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let reason = answer_str(&answer, "reason")
            .unwrap_or("No reason provided")
            .to_string();

        if !relevant {
            info!(item_id = %item.id, title = %item.title(), reason = %reason, "Not relevant");
            return Ok(None);
        }

        item.set_field("relevance_reason", reason);
        Ok(Some(item))
    }
}

/// Writes the channel post for an article.
pub struct PostWriter {
    call: ModelCall,
}

impl PostWriter {
    pub const NAME: &'static str = "write_post";

    pub fn new(gateway: Arc<dyn ChatModel>, model: impl Into<String>) -> Self {
        Self {
            call: ModelCall {
                gateway,
                model: model.into(),
                sampling: Sampling {
                    temperature: 0.7,
                    max_tokens: 1500,
                },
            },
        }
    }
}

impl Stage for PostWriter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::External
    }

    fn execute(&self, mut item: Item) -> Result<Option<Item>, StageError> {
        let text = required(&item, "text", Self::NAME)?;
        let prompt = format!("{}\n\n{}\n\nSource: {}", item.title(), text, item.url);
        let answer = self.call.ask(Self::NAME, WRITE_SYSTEM, &prompt)?;

        match answer_str(&answer, "post_text").filter(|s| !s.is_empty()) {
            Some(post) => {
                item.set_field("post_text", post.to_string());
                Ok(Some(item))
            }
            None => {
                info!(item_id = %item.id, "Post writer produced no text");
                Ok(None)
            }
        }
    }
}

/// Rewrites `post_text` in another language.
pub struct Translator {
    call: ModelCall,
    system: String,
}

impl Translator {
    pub const NAME: &'static str = "translate";

    pub fn new(gateway: Arc<dyn ChatModel>, model: impl Into<String>, language: &str) -> Self {
        Self {
            call: ModelCall {
                gateway,
                model: model.into(),
                sampling: Sampling {
                    temperature: 0.7,
                    max_tokens: 1500,
                },
            },
            system: translate_system(language),
        }
    }
}

impl Stage for Translator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::External
    }

    fn execute(&self, mut item: Item) -> Result<Option<Item>, StageError> {
        let post = required(&item, "post_text", Self::NAME)?;
        let prompt = format!("Post text: {}", post);
        let answer = self.call.ask(Self::NAME, &self.system, &prompt)?;

        let translated = answer_str(&answer, "post_text")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StageError::failed(Self::NAME, "model returned no post_text"))?;
        item.set_field("post_text", translated.to_string());
        Ok(Some(item))
    }
}

/// Polishes a translated `post_text`.
///
/// Keeps the unreviewed translation when the model fails or answers with
/// fewer than 30 characters; a syndicated post is never lost to the review.
pub struct TranslationReviewer {
    call: ModelCall,
    system: String,
}

impl TranslationReviewer {
    pub const NAME: &'static str = "review_translation";

    pub fn new(gateway: Arc<dyn ChatModel>, model: impl Into<String>, language: &str) -> Self {
        Self {
            call: ModelCall {
                gateway,
                model: model.into(),
                sampling: Sampling {
                    temperature: 0.5,
                    max_tokens: 1500,
                },
            },
            system: review_system(language),
        }
    }
}

impl Stage for TranslationReviewer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::External
    }

    fn execute(&self, mut item: Item) -> Result<Option<Item>, StageError> {
        let post = required(&item, "post_text", Self::NAME)?;
        let prompt = format!("Post text: {}", post);

        let answer = match self.call.ask(Self::NAME, &self.system, &prompt) {
            Ok(answer) => answer,
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "Translation review failed, keeping translation");
                return Ok(Some(item));
            }
        };

        match answer_str(&answer, "post_text") {
            Some(polished) if polished.chars().count() >= MIN_REVIEWED_CHARS => {
                debug!(item_id = %item.id, chars = polished.chars().count(), "Translation polished");
                item.set_field("post_text", polished.to_string());
            }
            _ => warn!(item_id = %item.id, "Reviewed translation too short, keeping translation"),
        }
        Ok(Some(item))
    }
}
