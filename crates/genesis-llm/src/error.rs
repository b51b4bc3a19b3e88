use thiserror::Error;

/// Failure of the text generation capability
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("Model provider unavailable: {0}")]
    Unavailable(String),

    #[error("Model call timed out after {0} ms")]
    Timeout(u64),

    #[error("Model provider rate limit or quota exceeded: {0}")]
    RateLimited(String),

    #[error("Model provider rejected credentials")]
    Unauthorized,

    #[error("Model provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CapabilityError {
    /// Map a non-success HTTP status from a provider to an error
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let message = body.into();
        match status {
            401 | 403 => Self::Unauthorized,
            429 => Self::RateLimited(message),
            500..=599 => Self::Unavailable(format!("{}: {}", status, message)),
            _ => Self::Provider { status, message },
        }
    }
}

pub type Result<T> = std::result::Result<T, CapabilityError>;
