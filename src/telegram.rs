use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::TelegramConfig;
use crate::types::{DigestError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a single send failed. The dispatcher recovers markup rejections by
/// resending plain; anything else aborts the delivery.
#[derive(Debug, thiserror::Error)]
pub enum SendFailure {
    #[error("markup rejected: {0}")]
    MarkupRejected(String),

    #[error("{0}")]
    Failed(String),
}

/// The messaging-endpoint seam. Production uses `TelegramBot`; tests script
/// responses.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(
        &self,
        text: &str,
        parse_mode: Option<&str>,
    ) -> std::result::Result<(), SendFailure>;
}

/// Telegram Bot API client addressing a single chat.
pub struct TelegramBot {
    client: Client,
    base_url: String,
    token: String,
    chat_id: String,
    disable_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct BotProfile {
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatInfo {
    #[serde(rename = "type")]
    pub kind: String,
}

impl TelegramBot {
    pub fn new(token: String, chat_id: String, config: &TelegramConfig) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            token,
            chat_id,
            disable_preview: config.disable_preview,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Bot-handle check, run before the pipeline starts.
    pub async fn get_me(&self) -> Result<BotProfile> {
        self.call("getMe", &json!({})).await
    }

    /// Confirms the configured chat id resolves to a reachable chat.
    pub async fn get_chat(&self) -> Result<ChatInfo> {
        self.call("getChat", &json!({ "chat_id": self.chat_id }))
            .await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &serde_json::Value,
    ) -> Result<T> {
        debug!("telegram call: {}", method);
        let response = self
            .client
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        let body: ApiResponse<T> = response.json().await?;
        if !body.ok {
            let description = body
                .description
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(DigestError::General(format!(
                "telegram {} failed: {}",
                method, description
            )));
        }
        body.result
            .ok_or_else(|| DigestError::General(format!("telegram {} returned no result", method)))
    }
}

#[async_trait]
impl<T: Messenger + ?Sized> Messenger for std::sync::Arc<T> {
    async fn send(
        &self,
        text: &str,
        parse_mode: Option<&str>,
    ) -> std::result::Result<(), SendFailure> {
        (**self).send(text, parse_mode).await
    }
}

#[async_trait]
impl Messenger for TelegramBot {
    async fn send(
        &self,
        text: &str,
        parse_mode: Option<&str>,
    ) -> std::result::Result<(), SendFailure> {
        let mut payload = json!({
            "chat_id": self.chat_id,
            "text": text,
            "disable_web_page_preview": self.disable_preview,
        });
        if let Some(mode) = parse_mode {
            payload["parse_mode"] = json!(mode);
        }

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| SendFailure::Failed(e.to_string()))?;

        let status = response.status();
        let body: ApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| SendFailure::Failed(format!("unparseable response: {}", e)))?;

        if body.ok {
            return Ok(());
        }

        let description = body
            .description
            .unwrap_or_else(|| format!("HTTP {}", status));
        if status == StatusCode::BAD_REQUEST && description.to_lowercase().contains("can't parse") {
            Err(SendFailure::MarkupRejected(description))
        } else {
            Err(SendFailure::Failed(description))
        }
    }
}
