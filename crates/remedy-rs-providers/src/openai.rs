//! OpenAI chat completions client used for replies and prescription reading.

use crate::error::{ProviderError, require_env};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use log::{debug, warn};
use remedy_rs_config::GeneratorConfig;
use remedy_rs_protocol::{
    CollaboratorError, ImageInput, PrescriptionData, PrescriptionReader, ReplyGenerator,
    ReplyRequest, Role, parse_prescription_reply,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Instructions sent with every prescription photo.
const READER_PROMPT: &str = r#"Analiza esta imagen de una fórmula médica colombiana y extrae:
1. Tipo de documento del paciente (CC, TI, etc.)
2. Número de documento
3. Nombre completo del paciente
4. Fecha de atención
5. EPS del paciente
6. Nombre del doctor
7. Lista de TODOS los medicamentos con sus dosis, exactamente como aparecen en la fórmula
8. Diagnóstico si aparece

Si algún campo no se puede leer, indica "No visible".

Devuelve un objeto JSON con esta estructura exacta:
{
  "datos": {
    "tipo_documento": "...",
    "numero_documento": "...",
    "paciente": "...",
    "fecha_atencion": "...",
    "eps": "...",
    "doctor": "...",
    "diagnostico": "...",
    "ips": "...",
    "medicamentos": ["medicamento 1 con dosis", "medicamento 2 con dosis"]
  }
}"#;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    vision_model: String,
}

impl OpenAiClient {
    /// Build a client from config, reading the API key from `api_key_env`.
    pub fn new(config: &GeneratorConfig) -> Result<Self, ProviderError> {
        let api_key = require_env(&config.api_key_env)?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(
        config: &GeneratorConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            vision_model: config
                .vision_model
                .clone()
                .unwrap_or_else(|| config.model.clone()),
        })
    }

    async fn complete(&self, body: &ChatCompletionRequest) -> Result<String, CollaboratorError> {
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| CollaboratorError::Request(format!("chat request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            warn!(
                "chat completion rejected (model={}, status={})",
                body.model, status
            );
            return Err(CollaboratorError::Request(format!(
                "status {status}: {body_text}"
            )));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| CollaboratorError::Malformed(format!("invalid response: {err}")))?;
        first_choice_text(parsed)
    }
}

fn first_choice_text(response: ChatCompletionResponse) -> Result<String, CollaboratorError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| CollaboratorError::Malformed("empty completion".to_string()))
}

/// Context as the system message, then the recent turns in order.
fn reply_messages(request: &ReplyRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.history.len() + 1);
    messages.push(ChatMessage {
        role: "system",
        content: MessageContent::Text(request.context.clone()),
    });
    messages.extend(request.history.iter().map(|turn| ChatMessage {
        role: match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        },
        content: MessageContent::Text(turn.content.clone()),
    }));
    messages
}

fn reader_messages(image: &ImageInput) -> Vec<ChatMessage> {
    let data_url = format!(
        "data:{};base64,{}",
        image.mime_type,
        BASE64_STANDARD.encode(&image.bytes)
    );
    vec![ChatMessage {
        role: "user",
        content: MessageContent::Parts(vec![
            ContentPart::Text {
                text: READER_PROMPT.to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: data_url,
                    detail: "high",
                },
            },
        ]),
    }]
}

#[async_trait]
impl ReplyGenerator for OpenAiClient {
    async fn generate(&self, request: &ReplyRequest) -> Result<String, CollaboratorError> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: reply_messages(request),
        };
        debug!(
            "requesting reply (model={}, history_len={})",
            self.model,
            request.history.len()
        );
        self.complete(&body).await
    }
}

#[async_trait]
impl PrescriptionReader for OpenAiClient {
    async fn read(&self, image: &ImageInput) -> Result<PrescriptionData, CollaboratorError> {
        let body = ChatCompletionRequest {
            model: self.vision_model.clone(),
            messages: reader_messages(image),
        };
        debug!(
            "reading prescription (model={}, bytes={})",
            self.vision_model,
            image.bytes.len()
        );
        let reply = self.complete(&body).await?;
        parse_prescription_reply(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use remedy_rs_protocol::Turn;
    use serde_json::json;

    #[test]
    fn reply_request_puts_context_first() {
        let request = ReplyRequest {
            context: "## Estado".to_string(),
            history: vec![Turn::user("hola"), Turn::assistant("¡Hola!")],
        };
        let body = ChatCompletionRequest {
            model: "o4-mini".to_string(),
            messages: reply_messages(&request),
        };
        let encoded = serde_json::to_value(&body).expect("encode");
        assert_eq!(
            encoded,
            json!({
                "model": "o4-mini",
                "messages": [
                    {"role": "system", "content": "## Estado"},
                    {"role": "user", "content": "hola"},
                    {"role": "assistant", "content": "¡Hola!"}
                ]
            })
        );
    }

    #[test]
    fn reader_request_embeds_image_as_data_url() {
        let image = ImageInput {
            media_id: "m1".to_string(),
            bytes: vec![1, 2, 3],
            mime_type: "image/png".to_string(),
        };
        let encoded = serde_json::to_value(reader_messages(&image)).expect("encode");
        assert_eq!(
            encoded[0]["content"][1],
            json!({
                "type": "image_url",
                "image_url": {"url": "data:image/png;base64,AQID", "detail": "high"}
            })
        );
        assert_eq!(encoded[0]["content"][0]["type"], "text");
    }

    #[test]
    fn empty_choices_are_malformed() {
        let response: ChatCompletionResponse =
            serde_json::from_value(json!({"choices": []})).expect("decode");
        assert!(matches!(
            first_choice_text(response),
            Err(CollaboratorError::Malformed(_))
        ));

        let response: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "  Listo.  "}}]
        }))
        .expect("decode");
        assert_eq!(first_choice_text(response).expect("text"), "Listo.");
    }
}
