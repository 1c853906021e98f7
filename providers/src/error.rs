use thiserror::Error;

/// Failure talking to the model endpoint.
///
/// `retryable()` reports whether another attempt could reasonably succeed;
/// the internal retry loop has already been exhausted by the time callers
/// see one of these.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("model endpoint unreachable: {message}")]
    Unreachable { message: String },

    #[error("model request timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    #[error("model endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("could not decode model response: {message}")]
    InvalidResponse { message: String },
}

impl ProviderError {
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            Self::Unreachable { .. } | Self::Timeout { .. } => true,
            Self::Http { status, .. } => matches!(*status, 408 | 409 | 429 | 500..=599),
            Self::InvalidResponse { .. } => false,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}
