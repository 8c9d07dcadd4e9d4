//! Telegram HTML cleanup.

use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};

use crate::item::Item;
use crate::stage::{SideEffect, Stage, StageError};

/// Tags Telegram renders in HTML parse mode.
const ALLOWED_TAGS: &[&str] = &["b", "i", "u", "s", "code", "pre", "a"];

static PARAGRAPH_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<p(\s[^>]*)?>").unwrap());
static PARAGRAPH_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</p\s*>").unwrap());
static LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(/?[A-Za-z][^>]*)>").unwrap());
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Normalizes `post_text` to Telegram-safe HTML and appends the signature.
pub struct HtmlCleaner {
    signature: String,
}

impl HtmlCleaner {
    pub const NAME: &'static str = "fix_html";

    pub fn new(signature: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
        }
    }

    pub fn clean(&self, text: &str) -> String {
        let text = PARAGRAPH_OPEN.replace_all(text, "");
        let text = PARAGRAPH_CLOSE.replace_all(&text, "\n\n");
        let text = LINE_BREAK.replace_all(&text, "\n");
        let text = ANY_TAG.replace_all(&text, |caps: &Captures| {
            let tag = caps[1]
                .trim_start_matches('/')
                .split(|c: char| c.is_whitespace() || c == '/')
                .next()
                .unwrap_or("")
                .to_ascii_lowercase();
            if ALLOWED_TAGS.contains(&tag.as_str()) {
                caps[0].to_string()
            } else {
                String::new()
            }
        });
        let text = BLANK_RUN.replace_all(&text, "\n\n");

        let mut cleaned = text.trim().to_string();
        if !self.signature.is_empty() {
            cleaned.push_str("\n\n");
            cleaned.push_str(self.signature.trim());
        }
        cleaned
    }
}

impl Stage for HtmlCleaner {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Pure
    }

    fn execute(&self, mut item: Item) -> Result<Option<Item>, StageError> {
        let post = item
            .field_str("post_text")
            .ok_or_else(|| StageError::failed(Self::NAME, "item has no 'post_text' field"))?;
        let cleaned = self.clean(post);
        item.set_field("post_text", cleaned);
        Ok(Some(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_keeps_supported_tags() {
        let cleaner = HtmlCleaner::new("");
        let input = r#"<b>Title 🚀</b> <a href="https://x.io">link</a> <div>gone</div> <span class="c">kept text</span>"#;
        assert_eq!(
            cleaner.clean(input),
            r#"<b>Title 🚀</b> <a href="https://x.io">link</a> gone kept text"#
        );
    }

    #[test]
    fn test_clean_paragraphs_and_breaks() {
        let cleaner = HtmlCleaner::new("");
        let input = "<p>First</p><p>Second<br>line<br/>two</p>\n\n\n\nEnd";
        assert_eq!(cleaner.clean(input), "First\n\nSecond\nline\ntwo\n\nEnd");
    }

    #[test]
    fn test_clean_does_not_confuse_pre_with_p() {
        let cleaner = HtmlCleaner::new("");
        assert_eq!(cleaner.clean("<pre>code</pre>"), "<pre>code</pre>");
    }

    #[test]
    fn test_signature_appended() {
        let cleaner = HtmlCleaner::new(r#"<a href="https://t.me/daily"><b>Daily</b></a>"#);
        assert_eq!(
            cleaner.clean("  Body  "),
            "Body\n\n<a href=\"https://t.me/daily\"><b>Daily</b></a>"
        );
    }

    #[test]
    fn test_stage_requires_post_text() {
        let cleaner = HtmlCleaner::new("");
        let item = Item::new("src", "https://example.com/a");
        assert!(cleaner.execute(item).is_err());

        let item = Item::new("src", "https://example.com/a").with_field("post_text", "<p>Hi</p>");
        let out = cleaner.execute(item).unwrap().unwrap();
        assert_eq!(out.field_str("post_text"), Some("Hi"));
        assert_eq!(cleaner.side_effect(), SideEffect::Pure);
    }
}
