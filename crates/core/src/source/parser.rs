//! Website source backed by the article parser microservice.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{ParserConfig, SourceConfig};
use crate::item::Item;
use crate::stage::StageError;

use super::Source;

#[derive(Debug, Deserialize)]
struct ParseResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListPage {
    #[serde(default)]
    items: Vec<ListEntry>,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DetailPage {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    full_text: String,
    #[serde(default)]
    images: Vec<Value>,
    #[serde(default)]
    videos: Vec<Value>,
    #[serde(default)]
    date: Option<String>,
}

/// Blocking client for the parser microservice.
#[derive(Clone)]
pub struct ParserClient {
    agent: ureq::Agent,
    url: String,
}

impl ParserClient {
    pub fn new(config: &ParserConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();
        Self {
            agent,
            url: config.url.clone(),
        }
    }

    fn parse(&self, page_url: &str, page_type: &str) -> Result<Value, String> {
        let body = json!({ "url": page_url, "page_type": page_type });
        let mut response = self
            .agent
            .post(&self.url)
            .send_json(&body)
            .map_err(|e| e.to_string())?;
        let parsed: ParseResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| e.to_string())?;

        match (parsed.ok, parsed.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(parsed
                .error
                .unwrap_or_else(|| "unknown parser error".to_string())),
        }
    }
}

/// Parses a listing page and the newest article pages behind it.
pub struct ParserSource {
    name: String,
    list_url: String,
    max_articles: usize,
    client: ParserClient,
}

impl ParserSource {
    pub fn new(config: &SourceConfig, client: ParserClient) -> Self {
        Self {
            name: config.name.clone(),
            list_url: config.url.clone(),
            max_articles: config.max_articles.max(1),
            client,
        }
    }

    fn fetch_article(&self, entry: &ListEntry) -> Option<Item> {
        let detail: DetailPage = match self
            .client
            .parse(&entry.url, "detail")
            .and_then(|data| serde_json::from_value(data).map_err(|e| e.to_string()))
        {
            Ok(detail) => detail,
            Err(e) => {
                warn!(source = %self.name, url = %entry.url, error = %e, "Article page parse failed");
                return None;
            }
        };

        if detail.full_text.trim().is_empty() {
            debug!(source = %self.name, url = %entry.url, "No text extracted");
            return None;
        }

        let mut item = Item::new(&self.name, &entry.url);
        if let Some(title) = detail.title.or_else(|| entry.title.clone()) {
            item.set_field("title", title);
        }
        item.set_field("text", detail.full_text);
        item.set_field("images", detail.images);
        item.set_field("videos", detail.videos);
        if let Some(date) = detail.date {
            item.set_field("published_at", date);
        }
        Some(item)
    }
}

impl Source for ParserSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<Vec<Item>, StageError> {
        info!(source = %self.name, url = %self.list_url, "Parsing list page");
        let stage = format!("fetch:{}", self.name);

        let data = self
            .client
            .parse(&self.list_url, "list")
            .map_err(|e| StageError::failed(&stage, format!("list page {}: {}", self.list_url, e)))?;
        let list: ListPage = serde_json::from_value(data)
            .map_err(|e| StageError::failed(&stage, format!("bad list page: {}", e)))?;

        let items: Vec<Item> = list
            .items
            .iter()
            .filter(|entry| !entry.url.trim().is_empty())
            .take(self.max_articles)
            .filter_map(|entry| self.fetch_article(entry))
            .collect();

        info!(source = %self.name, count = items.len(), "Fetched articles");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_page_deserialize() {
        let list: ListPage = serde_json::from_value(json!({
            "items": [
                { "url": "https://a.example/1", "title": "First" },
                { "url": "" }
            ]
        }))
        .unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[0].title.as_deref(), Some("First"));
    }

    #[test]
    fn test_detail_page_defaults() {
        let detail: DetailPage =
            serde_json::from_value(json!({ "full_text": "Body" })).unwrap();
        assert_eq!(detail.full_text, "Body");
        assert!(detail.images.is_empty());
        assert!(detail.videos.is_empty());
        assert!(detail.date.is_none());
    }

    #[test]
    fn test_parse_error_envelope() {
        let parsed: ParseResponse =
            serde_json::from_value(json!({ "ok": false, "error": "blocked" })).unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.error.as_deref(), Some("blocked"));
    }

    #[test]
    fn test_unreachable_parser_fails_fetch() {
        let client = ParserClient::new(&ParserConfig {
            url: "http://127.0.0.1:9/parse".to_string(),
            timeout_secs: 2,
        });
        let source = ParserSource::new(
            &SourceConfig {
                name: "local".to_string(),
                url: "https://example.com/news".to_string(),
                enabled: true,
                max_articles: 1,
            },
            client,
        );

        let err = source.fetch().unwrap_err();
        assert_eq!(err.stage_name(), "fetch:local");
    }
}
