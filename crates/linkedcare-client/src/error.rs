use linkedcare_core::CoreError;
use thiserror::Error;

/// Errors raised by the Linked Care client.
///
/// Business rejections and unintelligible responses are not errors; they are
/// returned as [`crate::Outcome`] values. Only conditions the caller cannot
/// handle inline end up here.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network, TLS or client construction failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Certificate could not be located, read or chosen.
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// The token endpoint answered with a non-success status.
    #[error("Token exchange rejected: HTTP {status}")]
    TokenRejected { status: u16 },

    /// Every attempt was answered with 401 Unauthorized.
    #[error("Giving up on {url} after {attempts} unauthorized attempts")]
    AttemptsExhausted { attempts: u32, url: String },

    /// A resource kind without a default collection was used without naming one.
    #[error("{kind} has no default collection; an explicit collection is required")]
    MissingCollection { kind: &'static str },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl ClientError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn certificate(message: impl Into<String>) -> Self {
        Self::Certificate(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the in-flight operation must be abandoned and the session restarted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AttemptsExhausted { .. } | Self::TokenRejected { .. }
        )
    }

    /// Whether the caller broke the API contract (never retried).
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::MissingCollection { .. } | Self::InvalidQuery(_))
    }

    /// Short category label for structured logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Certificate(_) => "certificate",
            Self::TokenRejected { .. } => "authentication",
            Self::AttemptsExhausted { .. } => "exhausted",
            Self::MissingCollection { .. } | Self::InvalidQuery(_) => "usage",
            Self::Config(_) => "config",
            Self::Core(_) => "model",
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
