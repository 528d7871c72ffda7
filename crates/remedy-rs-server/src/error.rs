use thiserror::Error;

/// Errors talking to the chat transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// The Bot API answered `ok: false` or an unexpected payload.
    #[error("bot api error: {0}")]
    Api(String),
    #[error("missing environment variable: {0}")]
    MissingEnv(String),
}
