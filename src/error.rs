use crate::query::error::QueryError;
use thiserror::Error;

/// Longest backend message carried into an envelope.
pub(crate) const MAX_BACKEND_MESSAGE_CHARS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShimErrorCode {
    Transport,
    Timeout,
    Backend,
    Decode,
    InvalidQuery,
    InvalidIdentifier,
    InvalidRange,
    InvalidConfig,
}

impl ShimErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ShimErrorCode::Transport => "transport",
            ShimErrorCode::Timeout => "timeout",
            ShimErrorCode::Backend => "backend",
            ShimErrorCode::Decode => "decode",
            ShimErrorCode::InvalidQuery => "invalid_query",
            ShimErrorCode::InvalidIdentifier => "invalid_identifier",
            ShimErrorCode::InvalidRange => "invalid_range",
            ShimErrorCode::InvalidConfig => "invalid_config",
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ShimError {
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// The backend rejected the statement. `message` never carries SQL text
    /// or parameter values.
    #[error("database error ({status}): {message}")]
    Backend { status: u16, message: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },
}

impl ShimError {
    pub fn code(&self) -> ShimErrorCode {
        match self {
            ShimError::Transport { .. } => ShimErrorCode::Transport,
            ShimError::Timeout { .. } => ShimErrorCode::Timeout,
            ShimError::Backend { .. } => ShimErrorCode::Backend,
            ShimError::Decode(_) => ShimErrorCode::Decode,
            ShimError::Query(QueryError::InvalidIdentifier { .. }) => {
                ShimErrorCode::InvalidIdentifier
            }
            ShimError::Query(QueryError::InvalidRange { .. }) => ShimErrorCode::InvalidRange,
            ShimError::Query(QueryError::InvalidQuery { .. }) => ShimErrorCode::InvalidQuery,
            ShimError::InvalidConfig { .. } => ShimErrorCode::InvalidConfig,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }

    /// True when the failure happened before or during the network hop,
    /// as opposed to the backend refusing the statement.
    pub fn is_transport(&self) -> bool {
        matches!(self, ShimError::Transport { .. } | ShimError::Timeout { .. })
    }

    pub(crate) fn backend(status: u16, message: impl Into<String>) -> Self {
        ShimError::Backend {
            status,
            message: truncate_message(message.into()),
        }
    }
}

fn truncate_message(message: String) -> String {
    if message.chars().count() <= MAX_BACKEND_MESSAGE_CHARS {
        return message;
    }
    let mut out: String = message.chars().take(MAX_BACKEND_MESSAGE_CHARS).collect();
    out.push_str("...");
    out
}
