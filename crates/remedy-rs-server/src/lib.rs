//! Telegram webhook transport for the complaint engine.
//!
//! Converts Telegram updates into inbound turns, runs them through the
//! engine, and sends the replies back with the Bot API.

mod error;
mod telegram;
mod webhook;

pub use error::TransportError;
pub use telegram::{Chat, HttpTelegramApi, Message, PhotoSize, TelegramApi, Update, User};
pub use webhook::{AppState, handle_update, router, serve};
