// src/services/notifier.rs

//! Notification delivery.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{ChangeEvent, NotifyConfig, NotifyMode};
use crate::utils::http::create_notify_client;

const BATCH_HEADER: &str = "🔔 Changes detected:";

/// Capability to deliver a text message to the configured channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

/// Telegram Bot API transport.
pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(client: Client, api_base: &str, token: &str, chat_id: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), token),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
        }
    }

    /// Build a notifier from config, falling back to `TELEGRAM_BOT_TOKEN` and
    /// `TELEGRAM_CHAT_ID`. Returns `None` when credentials are missing.
    pub fn from_config(config: &NotifyConfig) -> Result<Option<Self>> {
        let token = resolve(config.bot_token.as_deref(), "TELEGRAM_BOT_TOKEN");
        let chat_id = resolve(config.chat_id.as_deref(), "TELEGRAM_CHAT_ID");

        match (token, chat_id) {
            (Some(token), Some(chat_id)) => {
                let client = create_notify_client(config.timeout_secs)?;
                Ok(Some(Self::new(client, &config.api_base, &token, &chat_id)))
            }
            _ => Ok(None),
        }
    }
}

fn resolve(configured: Option<&str>, env_key: &str) -> Option<String> {
    configured
        .map(str::to_string)
        .or_else(|| std::env::var(env_key).ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let params = [
            ("chat_id", self.chat_id.as_str()),
            ("text", text),
            ("disable_web_page_preview", "true"),
        ];
        // The endpoint embeds the bot token; keep it out of error text.
        let response = self
            .client
            .post(&self.endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Http(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_default()
                .replace(&self.token, "<redacted>");
            return Err(AppError::notify(format!("telegram returned {status}: {body}")));
        }
        Ok(())
    }
}

/// Render events as outbound messages, each at most `max_chars` characters.
pub fn compose_messages(events: &[ChangeEvent], mode: NotifyMode, max_chars: usize) -> Vec<String> {
    if events.is_empty() {
        return Vec::new();
    }

    match mode {
        NotifyMode::PerEvent => events
            .iter()
            .flat_map(|e| split_message(&e.message(), max_chars))
            .collect(),
        NotifyMode::Batch => {
            let mut messages = Vec::new();
            let mut current = BATCH_HEADER.to_string();
            for line in events.iter().map(ChangeEvent::summary_line) {
                if current.chars().count() + 1 + line.chars().count() > max_chars
                    && current != BATCH_HEADER
                {
                    messages.push(std::mem::replace(&mut current, BATCH_HEADER.to_string()));
                }
                current.push('\n');
                current.push_str(&line);
            }
            messages.push(current);
            messages
                .into_iter()
                .flat_map(|m| split_message(&m, max_chars))
                .collect()
        }
    }
}

/// Split on character boundaries so no piece exceeds `max_chars`.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars || max_chars == 0 {
        return vec![text.to_string()];
    }
    chars
        .chunks(max_chars)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Send every message; failures are logged and never retried.
///
/// Returns the number of messages delivered.
pub async fn deliver(notifier: &dyn Notifier, messages: &[String]) -> usize {
    let mut sent = 0;
    for message in messages {
        match notifier.send(message).await {
            Ok(()) => sent += 1,
            Err(e) => log::error!("Failed to send notification: {}", e),
        }
    }
    sent
}
