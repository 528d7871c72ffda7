use thiserror::Error;

/// Errors raised while constructing providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A required environment variable is unset or empty.
    #[error("missing environment variable: {0}")]
    MissingEnv(String),
    /// A provider name in config is not known.
    #[error("unknown {kind} provider: {name}")]
    UnknownProvider { kind: &'static str, name: String },
    /// Config lacks a value the provider needs.
    #[error("invalid provider config: {0}")]
    Config(String),
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read a non-empty environment variable.
pub(crate) fn require_env(name: &str) -> Result<String, ProviderError> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ProviderError::MissingEnv(name.to_string()))
}
