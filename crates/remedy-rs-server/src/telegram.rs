//! Telegram Bot API types and client.

use crate::error::TransportError;
use async_trait::async_trait;
use log::debug;
use remedy_rs_config::ServerConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Incoming webhook update. Only message updates are handled.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    /// Sizes of the same photo, smallest first.
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
}

impl Message {
    /// Largest available size of an attached photo.
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photo.as_ref().and_then(|sizes| sizes.last())
    }

    /// Full sender name from the profile.
    pub fn sender_name(&self) -> Option<String> {
        let user = self.from.as_ref()?;
        let name = match &user.last_name {
            Some(last) => format!("{} {}", user.first_name, last),
            None => user.first_name.clone(),
        };
        let name = name.trim().to_string();
        (!name.is_empty()).then_some(name)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PhotoSize {
    pub file_id: String,
    /// Stable across bots and redeliveries.
    pub file_unique_id: String,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TransportError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TransportError::Api(
                self.description
                    .unwrap_or_else(|| "request not ok".to_string()),
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct File {
    #[serde(default)]
    file_path: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Outbound side of the transport.
#[async_trait]
pub trait TelegramApi: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError>;

    /// Download the bytes of a photo by file id.
    async fn download_photo(&self, file_id: &str) -> Result<Vec<u8>, TransportError>;
}

/// Bot API client over HTTPS.
#[derive(Clone)]
pub struct HttpTelegramApi {
    client: Client,
    api_base: String,
    token: String,
}

impl HttpTelegramApi {
    /// Build a client, reading the bot token from `token_env`.
    pub fn new(config: &ServerConfig) -> Result<Self, TransportError> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| TransportError::MissingEnv(config.token_env.clone()))?;
        Self::with_token(config, token)
    }

    pub fn with_token(
        config: &ServerConfig,
        token: impl Into<String>,
    ) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }
}

#[async_trait]
impl TelegramApi for HttpTelegramApi {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        let response: ApiResponse<serde_json::Value> = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&SendMessage { chat_id, text })
            .send()
            .await?
            .json()
            .await?;
        response.into_result()?;
        debug!("sent message (chat_id={}, len={})", chat_id, text.len());
        Ok(())
    }

    async fn download_photo(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        let file: File = self
            .client
            .get(self.method_url("getFile"))
            .query(&[("file_id", file_id)])
            .send()
            .await?
            .json::<ApiResponse<File>>()
            .await?
            .into_result()?;
        let path = file
            .file_path
            .ok_or_else(|| TransportError::Api("file has no path".to_string()))?;
        let bytes = self
            .client
            .get(format!("{}/file/bot{}/{}", self.api_base, self.token, path))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn photo_update_decodes_with_largest_size_last() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 10,
            "message": {
                "message_id": 7,
                "date": 1717243200,
                "chat": {"id": 5731, "type": "private"},
                "from": {"id": 5731, "is_bot": false, "first_name": "Ana", "last_name": "Ruiz"},
                "photo": [
                    {"file_id": "small", "file_unique_id": "u-small", "width": 90, "height": 90},
                    {"file_id": "big", "file_unique_id": "u-big", "width": 1280, "height": 960}
                ]
            }
        }))
        .expect("decode");
        let message = update.message.expect("message");
        assert_eq!(message.largest_photo().map(|p| p.file_id.as_str()), Some("big"));
        assert_eq!(message.sender_name().as_deref(), Some("Ana Ruiz"));
        assert_eq!(message.text, None);
    }

    #[test]
    fn api_errors_carry_description() {
        let response: ApiResponse<File> = serde_json::from_value(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: invalid file_id"
        }))
        .expect("decode");
        match response.into_result() {
            Err(TransportError::Api(message)) => {
                assert_eq!(message, "Bad Request: invalid file_id");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
