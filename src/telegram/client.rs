//! Telegram Bot API client: long-poll updates, send replies and chat actions.

use crate::errors::RelayError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API client.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    api_base: String,
    token: String,
    http: reqwest::Client,
}

// -- Update types -----------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

// -- Request types ----------------------------------------------------------

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SendChatActionRequest<'a> {
    chat_id: i64,
    action: &'a str,
}

/// Every Bot API response arrives wrapped in this envelope.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct ApiEnvelope<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramClient {
    /// Create a client against the public Bot API.
    pub fn new(token: &str) -> Self {
        Self {
            api_base: TELEGRAM_API_BASE.into(),
            token: token.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Long-poll for new updates past `offset`.
    pub async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Update>, RelayError> {
        let request = GetUpdatesRequest { offset, timeout, allowed_updates: ["message"] };
        let updates: Vec<Update> = self.call("getUpdates", &request).await?;
        debug!("Fetched {} update(s)", updates.len());
        Ok(updates)
    }

    /// Send a text reply into a chat.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<(), RelayError> {
        let request = SendMessageRequest { chat_id, text, reply_to_message_id: reply_to };
        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        Ok(())
    }

    /// Show a "typing..." indicator while the relay works.
    pub async fn send_typing(&self, chat_id: i64) -> Result<(), RelayError> {
        let request = SendChatActionRequest { chat_id, action: "typing" };
        let _: bool = self.call("sendChatAction", &request).await?;
        Ok(())
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<T, B>(&self, method: &str, body: &B) -> Result<T, RelayError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let resp = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;
        if !(200..300).contains(&status) {
            return Err(RelayError::Provider { status, body: text });
        }

        let envelope: ApiEnvelope<T> =
            serde_json::from_str(&text).map_err(|e| RelayError::Provider {
                status,
                body: format!("undecodable {method} response: {e}"),
            })?;

        if !envelope.ok {
            return Err(RelayError::Provider {
                status,
                body: envelope.description.unwrap_or_else(|| "request rejected".into()),
            });
        }

        envelope.result.ok_or_else(|| RelayError::Provider {
            status,
            body: format!("{method} response carried no result"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_an_update_batch() {
        let body = r#"{
            "ok": true,
            "result": [{
                "update_id": 7001,
                "message": {
                    "message_id": 12,
                    "chat": {"id": 555, "type": "private"},
                    "from": {"id": 42, "is_bot": false, "first_name": "A", "username": "maker"},
                    "text": "how are my sales"
                }
            }]
        }"#;

        let envelope: ApiEnvelope<Vec<Update>> = serde_json::from_str(body).unwrap();
        assert!(envelope.ok);

        let updates = envelope.result.unwrap();
        assert_eq!(updates[0].update_id, 7001);

        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 555);
        assert_eq!(message.text.as_deref(), Some("how are my sales"));
        assert_eq!(message.from.as_ref().unwrap().username.as_deref(), Some("maker"));
    }

    #[test]
    fn parses_a_rejected_call() {
        let body = r#"{"ok": false, "description": "Unauthorized"}"#;
        let envelope: ApiEnvelope<Vec<Update>> = serde_json::from_str(body).unwrap();
        assert!(!envelope.ok);
        assert_eq!(envelope.description.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn non_message_updates_deserialize_without_text() {
        let body = r#"{"ok": true, "result": [{"update_id": 8}]}"#;
        let envelope: ApiEnvelope<Vec<Update>> = serde_json::from_str(body).unwrap();
        assert!(envelope.result.unwrap()[0].message.is_none());
    }
}
