use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::approval::RetryPolicy;
use crate::offload::OffloadConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub offload: OffloadConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub gateway: Option<GatewayConfig>,
    #[serde(default)]
    pub parser: Option<ParserConfig>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Scheduler configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// When disabled, no pipeline runs are scheduled; decisions are still handled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Fire the first tick immediately instead of after one interval.
    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval(),
            run_on_start: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    600 // 10 minutes
}

/// A website listing page parsed for new articles.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Newest articles taken from the listing per run.
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,
}

fn default_max_articles() -> usize {
    1
}

/// Durable store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("newsroom.db")
}

/// Post formatting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContentConfig {
    /// HTML appended to every post on the main channel.
    #[serde(default)]
    pub signature: String,
    /// Language posts are rewritten into for the secondary channel.
    #[serde(default)]
    pub translate_to: Option<String>,
    /// HTML appended to syndicated posts.
    #[serde(default)]
    pub secondary_signature: String,
    /// How far back the duplicate check compares against stored posts.
    #[serde(default = "default_dedup_window")]
    pub dedup_window_days: u32,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            signature: String::new(),
            translate_to: None,
            secondary_signature: String::new(),
            dedup_window_days: default_dedup_window(),
        }
    }
}

fn default_dedup_window() -> u32 {
    3
}

/// Telegram Bot API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Chat that receives previews and error alerts.
    pub admin_chat_id: String,
    /// Public channel approved posts go to (e.g. "@mychannel").
    pub main_channel: String,
    /// Channel that receives translated copies of approved posts.
    #[serde(default)]
    pub secondary_channel: Option<String>,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_telegram_api")]
    pub api_url: String,
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

/// OpenAI-compatible chat completions gateway
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub models: ModelsConfig,
}

/// Model used by each stage
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ModelsConfig {
    #[serde(default = "default_summarize_model")]
    pub summarize: String,
    #[serde(default = "default_relevance_model")]
    pub relevance: String,
    #[serde(default = "default_write_model")]
    pub write: String,
    #[serde(default = "default_summarize_model")]
    pub dedup: String,
    #[serde(default = "default_write_model")]
    pub translate: String,
    #[serde(default = "default_write_model")]
    pub review: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            summarize: default_summarize_model(),
            relevance: default_relevance_model(),
            write: default_write_model(),
            dedup: default_summarize_model(),
            translate: default_write_model(),
            review: default_write_model(),
        }
    }
}

fn default_summarize_model() -> String {
    "google/gemini-2.5-flash".to_string()
}

fn default_relevance_model() -> String {
    "openai/gpt-4.1-mini".to_string()
}

fn default_write_model() -> String {
    "anthropic/claude-sonnet-4.5".to_string()
}

fn default_http_timeout() -> u64 {
    120
}

/// Article parser microservice
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ParserConfig {
    pub url: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Failure notification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifyConfig {
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
        }
    }
}

fn default_buffer_size() -> usize {
    256
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub scheduler: SchedulerConfig,
    pub sources: Vec<SourceConfig>,
    pub offload: OffloadConfig,
    pub store: StoreConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<SanitizedTelegramConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<SanitizedGatewayConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parser: Option<ParserConfig>,
    pub server: ServerConfig,
}

/// Sanitized Telegram config (bot token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTelegramConfig {
    pub bot_token_configured: bool,
    pub admin_chat_id: String,
    pub main_channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_channel: Option<String>,
}

/// Sanitized gateway config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedGatewayConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u64,
    pub models: ModelsConfig,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            scheduler: config.scheduler.clone(),
            sources: config.sources.clone(),
            offload: config.offload.clone(),
            store: config.store.clone(),
            telegram: config.telegram.as_ref().map(|t| SanitizedTelegramConfig {
                bot_token_configured: !t.bot_token.is_empty(),
                admin_chat_id: t.admin_chat_id.clone(),
                main_channel: t.main_channel.clone(),
                secondary_channel: t.secondary_channel.clone(),
            }),
            gateway: config.gateway.as_ref().map(|g| SanitizedGatewayConfig {
                url: g.url.clone(),
                api_key_configured: !g.api_key.is_empty(),
                timeout_secs: g.timeout_secs,
                models: g.models.clone(),
            }),
            parser: config.parser.clone(),
            server: config.server.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.interval_secs, 600);
        assert!(config.sources.is_empty());
        assert_eq!(config.offload.max_concurrent, 4);
        assert_eq!(config.store.path.to_str().unwrap(), "newsroom.db");
        assert_eq!(config.store.retry.max_attempts, 3);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.notify.buffer_size, 256);
        assert!(config.telegram.is_none());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[scheduler]
interval_secs = 300
run_on_start = false

[[sources]]
name = "aibase"
url = "https://news.aibase.com/news"

[[sources]]
name = "futuretools"
url = "https://www.futuretools.io/news"
max_articles = 3

[offload]
max_concurrent = 2
call_timeout_ms = 30000

[store]
path = "/data/approvals.db"

[store.retry]
max_attempts = 5
initial_delay_ms = 100

[content]
signature = "<b>Daily</b>"
translate_to = "Russian"

[telegram]
bot_token = "123:abc"
admin_chat_id = "-100123"
main_channel = "@daily"
secondary_channel = "@daily_ru"

[gateway]
url = "https://openrouter.ai/api/v1/chat/completions"
api_key = "sk-test"

[gateway.models]
summarize = "some/model"

[parser]
url = "http://localhost:9000/parse"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.scheduler.interval_secs, 300);
        assert!(!config.scheduler.run_on_start);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].max_articles, 1);
        assert_eq!(config.sources[1].max_articles, 3);
        assert_eq!(config.offload.call_timeout_ms, 30000);
        assert_eq!(config.store.retry.max_attempts, 5);
        assert_eq!(config.store.retry.max_delay_ms, 5000);
        assert_eq!(config.content.translate_to.as_deref(), Some("Russian"));
        assert_eq!(config.content.dedup_window_days, 3);

        let telegram = config.telegram.as_ref().unwrap();
        assert_eq!(telegram.poll_timeout_secs, 30);
        assert_eq!(telegram.api_url, "https://api.telegram.org");

        let gateway = config.gateway.as_ref().unwrap();
        assert_eq!(gateway.timeout_secs, 120);
        assert_eq!(gateway.models.summarize, "some/model");
        assert_eq!(gateway.models.relevance, "openai/gpt-4.1-mini");
        assert_eq!(gateway.models.dedup, "google/gemini-2.5-flash");
        assert_eq!(gateway.models.review, "anthropic/claude-sonnet-4.5");
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let toml = r#"
[telegram]
bot_token = "123:secret"
admin_chat_id = "-100"
main_channel = "@daily"

[gateway]
url = "https://gateway"
api_key = "sk-secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);

        let telegram = sanitized.telegram.as_ref().unwrap();
        assert!(telegram.bot_token_configured);
        assert!(sanitized.gateway.as_ref().unwrap().api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
    }
}
