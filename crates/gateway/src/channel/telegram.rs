//! Telegram Bot API front end.
//!
//! `getMe` verifies the token at startup, `getUpdates` long-polls for new
//! messages, and `sendMessage` delivers replies in plain text.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;

use dg_domain::config::Config;
use dg_domain::error::{Error, Result};
use dg_domain::turn::UserId;

use super::{InboundMessage, ReplySink};

/// Telegram rejects messages longer than this many characters.
const MAX_MESSAGE_CHARS: usize = 4096;
/// Pause after a failed poll before retrying.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    from: Option<BotUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// Map one update to an inbound message.  Updates without a sender or
/// without text (stickers, photos, edits, channel posts) are dropped.
fn to_inbound(update: Update) -> Option<InboundMessage> {
    let message = update.message?;
    let from = message.from?;
    let text = message.text.filter(|t| !t.is_empty())?;
    Some(InboundMessage {
        user_id: UserId::Numeric(from.id),
        chat_id: message.chat.id,
        text,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TelegramClient {
    /// `{telegram_api_url}/bot{token}`.
    bot_url: String,
    poll_timeout_secs: u64,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        if cfg.telegram_bot_token.is_empty() {
            return Err(Error::Auth("telegram_bot_token is empty".into()));
        }

        // The HTTP timeout has to outlive the long-poll window.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.poll_timeout_secs + 15))
            .build()
            .map_err(|e| Error::Channel(e.to_string()))?;

        Ok(Self {
            bot_url: format!(
                "{}/bot{}",
                cfg.telegram_api_url.trim_end_matches('/'),
                cfg.telegram_bot_token
            ),
            poll_timeout_secs: cfg.poll_timeout_secs,
            client,
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{}", self.bot_url, method)
    }

    async fn call<T>(&self, method: &str, body: serde_json::Value) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("{method}: {e}")))?;
        let status = resp.status();
        let parsed: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| Error::Channel(format!("{method}: HTTP {status}: {e}")))?;
        unwrap_response(method, parsed)
    }

    /// Verify the bot token.  A failure here is fatal at startup.
    pub async fn authenticate(&self) -> Result<BotUser> {
        let me: BotUser = self
            .call("getMe", serde_json::json!({}))
            .await
            .map_err(|e| Error::Auth(e.to_string()))?;
        tracing::info!(
            bot_id = me.id,
            username = me.username.as_deref().unwrap_or(""),
            "telegram bot authorized"
        );
        Ok(me)
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            serde_json::json!({
                "offset": offset,
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    /// Long-poll for messages and forward them to `tx` in arrival order.
    ///
    /// Poll failures are logged and retried after a short pause.  Returns
    /// when the receiving side of `tx` is dropped.
    pub async fn poll(self: Arc<Self>, tx: mpsc::Sender<InboundMessage>) {
        let mut offset: i64 = 0;
        tracing::info!("telegram polling started");

        loop {
            let updates = match self.get_updates(offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!(error = %e, "telegram poll failed");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some(msg) = to_inbound(update) else {
                    continue;
                };
                tracing::info!(user_id = %msg.user_id, chars = msg.text.chars().count(), "message received");
                if tx.send(msg).await.is_err() {
                    tracing::info!("inbound channel closed, telegram polling stopped");
                    return;
                }
            }
        }
    }
}

fn unwrap_response<T>(method: &str, resp: ApiResponse<T>) -> Result<T> {
    match (resp.ok, resp.result) {
        (true, Some(result)) => Ok(result),
        _ => Err(Error::Channel(format!(
            "{method}: {}",
            resp.description.unwrap_or_else(|| "request rejected".into())
        ))),
    }
}

#[async_trait::async_trait]
impl ReplySink for TelegramClient {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            let _: serde_json::Value = self
                .call(
                    "sendMessage",
                    serde_json::json!({ "chat_id": chat_id, "text": chunk }),
                )
                .await?;
        }
        Ok(())
    }
}

/// Split a message into chunks of at most `max_chars` characters,
/// preferring paragraph, line, sentence, then word boundaries.
fn split_message(message: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = message;

    while !remaining.is_empty() {
        let limit = match remaining.char_indices().nth(max_chars) {
            Some((idx, _)) => idx,
            None => {
                push_chunk(&mut chunks, remaining);
                break;
            }
        };

        let window = &remaining[..limit];
        let positive = |i: usize| (i > 0).then_some(i);
        let split_at = window
            .rfind("\n\n")
            .and_then(positive)
            .or_else(|| window.rfind('\n').and_then(positive))
            .or_else(|| window.rfind(". ").map(|i| i + 1))
            .or_else(|| window.rfind(' ').and_then(positive))
            .unwrap_or(limit);

        push_chunk(&mut chunks, &remaining[..split_at]);
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

/// Telegram rejects blank messages.
fn push_chunk(chunks: &mut Vec<String>, chunk: &str) {
    if !chunk.trim().is_empty() {
        chunks.push(chunk.to_string());
    }
}
