//! Error types for the chat engine.

use dynabot_core::error::DynabotError;

/// Hard failures of a chat turn.
///
/// Provider failures are not here: they become a [`crate::Reply::Fallback`].
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("storage error: {0}")]
    StorageError(String),
}

impl From<DynabotError> for ChatError {
    fn from(err: DynabotError) -> Self {
        ChatError::StorageError(err.to_string())
    }
}

/// Failures of the external generation provider.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// The provider session never started.
    #[error("chat session unavailable: {0}")]
    SessionUnavailable(String),
    /// The request did not reach the service or the connection broke.
    #[error("request failed: {0}")]
    Request(String),
    /// The service answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    /// The service answered but the body carried no usable text.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Whether the same request may succeed if sent again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Request(_) => true,
            ProviderError::Http { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            ProviderError::SessionUnavailable(_) | ProviderError::MalformedResponse(_) => false,
        }
    }
}

/// Failures of microphone capture or transcription.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VoiceCaptureError {
    #[error("voice input is disabled")]
    Disabled,
    #[error("no speech detected within {0} seconds")]
    Timeout(u64),
    #[error("microphone unavailable: {0}")]
    Microphone(String),
    #[error("transcription failed: {0}")]
    Transcription(String),
}
