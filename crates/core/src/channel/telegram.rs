//! Telegram Bot API adapter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::approval::{
    callback_data, parse_callback_data, Decision, DecisionEvent, PendingApproval, Resolution,
    ResolveError, ReviewerMessage,
};
use crate::config::TelegramConfig;
use crate::item::Item;
use crate::notify::FailureNotice;
use crate::orchestrator::OrchestratorHandle;

use super::{describe_resolution, ChannelError, Notifier, PublishResult, Publisher, ReviewSurface};

const ALERT_TITLE: &str = "newsroom";
const RETRY_AFTER_POLL_ERROR: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    chat: Chat,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: User,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    callback_query: Option<CallbackQuery>,
}

/// Telegram Bot API client.
///
/// Serves as review surface (admin chat previews with approve/decline
/// buttons), notifier (error alerts in the admin chat) and decision source
/// (`getUpdates` long polling).
pub struct TelegramClient {
    client: Client,
    config: TelegramConfig,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> Result<Self, ChannelError> {
        // Long polls hold the request open for poll_timeout_secs.
        let client = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 30))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, ChannelError> {
        debug!(method, "Telegram API call");
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await?;

        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidResponse(e.to_string()))?;

        if !envelope.ok {
            return Err(ChannelError::Api {
                method: method.to_string(),
                description: envelope
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        envelope
            .result
            .ok_or_else(|| ChannelError::InvalidResponse(format!("{} returned no result", method)))
    }

    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_markup: Option<Value>,
    ) -> Result<Message, ChannelError> {
        let mut body = json!({
            "chat_id": chat_id_value(chat_id),
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = markup;
        }
        self.call("sendMessage", body).await
    }

    /// Send an item's post with its creative (video, image or none).
    async fn send_item(&self, chat_id: &str, item: &Item) -> Result<Message, ChannelError> {
        let text = item.field_str("post_text").unwrap_or_else(|| item.title());
        let creative_url = item.field_str("creative_url").filter(|u| *u != "none");

        match (item.field_str("creative_type"), creative_url) {
            (Some("video"), Some(url)) => {
                self.call(
                    "sendVideo",
                    json!({
                        "chat_id": chat_id_value(chat_id),
                        "video": url,
                        "caption": text,
                        "parse_mode": "HTML",
                    }),
                )
                .await
            }
            (Some("image"), Some(url)) => {
                let photo = self
                    .call(
                        "sendPhoto",
                        json!({
                            "chat_id": chat_id_value(chat_id),
                            "photo": url,
                            "caption": text,
                            "parse_mode": "HTML",
                        }),
                    )
                    .await;
                match photo {
                    Ok(message) => Ok(message),
                    Err(e) => {
                        warn!(item_id = %item.id, error = %e, "Photo rejected, sending text only");
                        self.send_message(chat_id, text, None).await
                    }
                }
            }
            _ => self.send_message(chat_id, text, None).await,
        }
    }

    async fn edit_message_text(&self, message: ReviewerMessage, text: &str) -> Result<(), ChannelError> {
        let _: Value = self
            .call(
                "editMessageText",
                json!({
                    "chat_id": message.chat_id,
                    "message_id": message.message_id,
                    "text": text,
                }),
            )
            .await?;
        Ok(())
    }

    async fn answer_callback_query(&self, id: &str) -> Result<(), ChannelError> {
        let _: Value = self
            .call("answerCallbackQuery", json!({ "callback_query_id": id }))
            .await?;
        Ok(())
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, ChannelError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": self.config.poll_timeout_secs,
                "allowed_updates": ["callback_query"],
            }),
        )
        .await
    }

    /// Long-poll for button presses and forward them to the orchestrator
    /// as decision events, in arrival order, until shutdown.
    pub async fn poll_decisions(
        &self,
        handle: OrchestratorHandle,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!("Telegram decision poller started");
        let mut offset = 0i64;

        loop {
            let updates = tokio::select! {
                _ = shutdown.recv() => break,
                result = self.get_updates(offset) => result,
            };

            let updates = match updates {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "getUpdates failed");
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(RETRY_AFTER_POLL_ERROR) => continue,
                    }
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some(query) = update.callback_query else {
                    continue;
                };

                // Acknowledge first so the button stops spinning.
                if let Err(e) = self.answer_callback_query(&query.id).await {
                    warn!(error = %e, "Failed to answer callback query");
                }

                let Some(event) = decision_from_callback(&query) else {
                    warn!(data = ?query.data, "Ignoring unrecognized callback data");
                    continue;
                };

                if handle.send(event).await.is_err() {
                    warn!("Orchestrator stopped, ending decision poller");
                    return;
                }
            }
        }

        info!("Telegram decision poller shutting down");
    }
}

#[async_trait]
impl ReviewSurface for TelegramClient {
    async fn present(&self, record: &PendingApproval) -> Result<(), ChannelError> {
        let admin = &self.config.admin_chat_id;
        self.send_item(admin, &record.snapshot).await?;

        let prompt = format!(
            "👆 Approve or decline the post above?\n📰 {}",
            escape_html(record.title())
        );
        self.send_message(admin, &prompt, Some(approval_keyboard(&record.id)))
            .await?;
        info!(item_id = %record.id, "Preview sent to admin chat");
        Ok(())
    }

    async fn report(
        &self,
        event: &DecisionEvent,
        outcome: &Result<Resolution, ResolveError>,
    ) -> Result<(), ChannelError> {
        let text = describe_resolution(event, outcome);
        match event.reply_to {
            Some(message) => self.edit_message_text(message, &text).await,
            None => self
                .send_message(&self.config.admin_chat_id, &escape_html(&text), None)
                .await
                .map(|_| ()),
        }
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn notify(&self, notice: &FailureNotice) -> Result<(), ChannelError> {
        self.send_message(&self.config.admin_chat_id, &format_alert(notice), None)
            .await
            .map(|_| ())
    }
}

/// Publishes items to one Telegram channel.
pub struct TelegramPublisher {
    client: Arc<TelegramClient>,
    channel: String,
}

impl TelegramPublisher {
    pub fn new(client: Arc<TelegramClient>, channel: impl Into<String>) -> Self {
        Self {
            client,
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl Publisher for TelegramPublisher {
    async fn publish(&self, item: &Item) -> Result<PublishResult, ChannelError> {
        let message = self.client.send_item(&self.channel, item).await?;
        let url = post_url(&self.channel, message.message_id);
        info!(item_id = %item.id, url = %url, chat_id = message.chat.id, "Posted to channel");
        Ok(PublishResult {
            url,
            message_id: message.message_id,
        })
    }
}

fn approval_keyboard(id: &str) -> Value {
    json!({
        "inline_keyboard": [[
            { "text": "✅ Approve", "callback_data": callback_data(Decision::Approve, id) },
            { "text": "❌ Decline", "callback_data": callback_data(Decision::Decline, id) },
        ]]
    })
}

fn decision_from_callback(query: &CallbackQuery) -> Option<DecisionEvent> {
    let (decision, item_id) = parse_callback_data(query.data.as_deref()?)?;
    let actor = query
        .from
        .username
        .clone()
        .or_else(|| query.from.first_name.clone())
        .unwrap_or_else(|| query.from.id.to_string());

    let mut event = DecisionEvent::new(item_id, decision, actor);
    if let Some(message) = &query.message {
        event = event.with_reply_to(ReviewerMessage {
            chat_id: message.chat.id,
            message_id: message.message_id,
        });
    }
    Some(event)
}

/// Numeric chat ids go out as numbers, channel usernames as strings.
fn chat_id_value(chat_id: &str) -> Value {
    match chat_id.trim().parse::<i64>() {
        Ok(id) => json!(id),
        Err(_) => json!(chat_id.trim()),
    }
}

/// Public link to a channel post.
fn post_url(channel: &str, message_id: i64) -> String {
    let channel = channel.trim();
    match channel.strip_prefix("-100") {
        Some(internal) if internal.chars().all(|c| c.is_ascii_digit()) => {
            format!("https://t.me/c/{}/{}", internal, message_id)
        }
        _ => format!("https://t.me/{}/{}", channel.trim_start_matches('@'), message_id),
    }
}

fn format_alert(notice: &FailureNotice) -> String {
    let mut text = format!(
        "🚨 <b>{}</b>\n📍 Operation: <code>{}</code>\n",
        ALERT_TITLE,
        escape_html(&notice.operation)
    );
    if let Some(stage) = &notice.stage {
        text.push_str(&format!("🔧 Stage: <code>{}</code>\n", escape_html(stage)));
    }
    if let Some(item_id) = &notice.item_id {
        text.push_str(&format!("🆔 Item: <code>{}</code>\n", escape_html(item_id)));
    }
    let message: String = notice.message.chars().take(500).collect();
    text.push_str(&format!("❌ Error: {}", escape_html(&message)));
    text
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
