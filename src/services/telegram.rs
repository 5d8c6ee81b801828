use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

/// Thin Telegram Bot API client: long-polled updates in, keyboard-decorated
/// messages out. Delivery is best-effort; callers decide whether a failed
/// send matters.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    token: String,
}

impl TelegramClient {
    pub fn new(token: String, timeout_secs: u64) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self { http, token }
    }

    fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }

    fn url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.token)
    }

    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<serde_json::Value>,
    ) -> Result<(), String> {
        if !self.has_token() {
            return Err("BOT_TOKEN is missing in .env".to_string());
        }

        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(kb) = keyboard {
            body["reply_markup"] = kb;
        }

        let res = self
            .http
            .post(self.url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("Telegram sendMessage failed: {status} {body}"));
        }

        Ok(())
    }

    /// Long-polls for new updates. `offset` acknowledges everything below it.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, String> {
        if !self.has_token() {
            return Err("BOT_TOKEN is missing in .env".to_string());
        }

        let res = self
            .http
            .get(self.url("getUpdates"))
            .query(&[("offset", offset), ("timeout", timeout_secs as i64)])
            // the long poll must outlive the client-wide timeout
            .timeout(Duration::from_secs(timeout_secs + 10))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("Telegram getUpdates failed: {status} {body}"));
        }

        let parsed = res
            .json::<UpdatesResponse>()
            .await
            .map_err(|e| e.to_string())?;

        if !parsed.ok {
            return Err("Telegram getUpdates returned ok=false".to_string());
        }

        Ok(parsed.result)
    }
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}
