use thiserror::Error;

/// Result type local to docql-limit.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// `window` and `retry_after` are in seconds; `retry_after` is always > 0.
    #[error("rate limit exceeded: {limit} calls per {window}s; retry after {retry_after:.3}s")]
    RateLimitExceeded {
        limit: u32,
        window: f64,
        retry_after: f64,
    },

    #[error("invalid rate limiter configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn retry_after(&self) -> Option<f64> {
        match self {
            Error::RateLimitExceeded { retry_after, .. } => Some(*retry_after),
            Error::Config(_) => None,
        }
    }
}
