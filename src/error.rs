use thiserror::Error;

#[derive(Error, Debug)]
pub enum LiveStarsError {
    #[error("GitHub API error: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Transport error: {0}")]
    TransportError(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    DecodeError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Subscription error for repository {repository_id}: {reason}")]
    SubscriptionError { repository_id: u64, reason: String },

    #[error("Actor error: {0}")]
    ActorError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),
}

impl From<url::ParseError> for LiveStarsError {
    fn from(err: url::ParseError) -> Self {
        LiveStarsError::InvalidUrl(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LiveStarsError>;
