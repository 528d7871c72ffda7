//! Webhook router and update handling.

use crate::telegram::{Message, TelegramApi, Update};
use anyhow::Context;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{debug, error, info, warn};
use remedy_rs_core::{ComplaintEngine, RemedyCoreError, replies};
use remedy_rs_protocol::{ImageInput, InboundTurn, TurnOutcome};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared state of the webhook handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ComplaintEngine>,
    pub api: Arc<dyn TelegramApi>,
}

impl AppState {
    pub fn new(engine: Arc<ComplaintEngine>, api: Arc<dyn TelegramApi>) -> Self {
        Self { engine, api }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/telegram/webhook", post(webhook))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(bind: &str, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("webhook server listening (bind={})", bind);
    axum::serve(listener, router(state))
        .await
        .context("webhook server stopped")?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.engine.sessions().len(),
    }))
}

/// Always answers 200 so Telegram does not redeliver the update.
async fn webhook(State(state): State<AppState>, body: Bytes) -> StatusCode {
    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => handle_update(&state, update).await,
        Err(err) => warn!("ignored malformed update (err={})", err),
    }
    StatusCode::OK
}

/// Process one update and send every reply back to the chat.
pub async fn handle_update(state: &AppState, update: Update) {
    let Some(message) = update.message else {
        debug!("ignored non-message update (update_id={})", update.update_id);
        return;
    };
    let chat_id = message.chat.id;
    let replies = match process_message(state, &message).await {
        Ok(outcome) => outcome.replies,
        Err(err) => {
            error!(
                "failed to process message (chat_id={}, message_id={}, err={})",
                chat_id, message.message_id, err
            );
            vec![replies::UNEXPECTED_ERROR.to_string()]
        }
    };
    for reply in replies {
        if let Err(err) = state.api.send_message(chat_id, &reply).await {
            error!("failed to send reply (chat_id={}, err={})", chat_id, err);
        }
    }
}

async fn process_message(
    state: &AppState,
    message: &Message,
) -> Result<TurnOutcome, RemedyCoreError> {
    let user_id = message.chat.id.to_string();
    let sender_name = message.sender_name();

    if let Some(photo) = message.largest_photo() {
        let bytes = match state.api.download_photo(&photo.file_id).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(
                    "failed to download photo (chat_id={}, file_id={}, err={})",
                    message.chat.id, photo.file_id, err
                );
                return Ok(TurnOutcome {
                    replies: vec![replies::UNREADABLE_PRESCRIPTION.to_string()],
                    prescription_unreadable: true,
                    ..TurnOutcome::default()
                });
            }
        };
        let image = ImageInput {
            media_id: photo.file_unique_id.clone(),
            bytes,
            mime_type: "image/jpeg".to_string(),
        };
        let turn = with_identity(InboundTurn::image(user_id, image), message, sender_name);
        return state.engine.handle(turn).await;
    }

    let Some(text) = message.text.as_deref() else {
        debug!(
            "ignored message without text or photo (chat_id={})",
            message.chat.id
        );
        return Ok(TurnOutcome::default());
    };

    match command(text) {
        Some("start") => state.engine.start(&user_id, sender_name.as_deref()).await,
        Some("help") => Ok(TurnOutcome {
            replies: vec![replies::HELP.to_string()],
            ..TurnOutcome::default()
        }),
        Some("reset") => state.engine.reset(&user_id).await,
        _ => {
            let turn = with_identity(InboundTurn::text(user_id, text), message, sender_name);
            state.engine.handle(turn).await
        }
    }
}

fn with_identity(turn: InboundTurn, message: &Message, sender_name: Option<String>) -> InboundTurn {
    let turn = turn.with_message_id(message.message_id.to_string());
    match sender_name {
        Some(name) => turn.with_sender_name(name),
        None => turn,
    }
}

/// Bot command name without the slash or a `@botname` suffix.
fn command(text: &str) -> Option<&str> {
    let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
    Some(word.split('@').next().unwrap_or(word))
}

#[cfg(test)]
mod tests {
    use super::command;
    use pretty_assertions::assert_eq;

    #[test]
    fn commands_strip_bot_suffix() {
        assert_eq!(command("/start"), Some("start"));
        assert_eq!(command(" /reset@NoMeEntregaronBot "), Some("reset"));
        assert_eq!(command("hola"), None);
        assert_eq!(command("15/03/1985"), None);
    }
}
