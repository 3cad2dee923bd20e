//! Error types for the latency benchmark

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, BenchError>;

/// Benchmark errors
#[derive(Error, Debug)]
pub enum BenchError {
    /// Account balance cannot cover the order value
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Symbol is not listed on the venue
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    /// Order value is below the venue minimum
    #[error("order value below minimum: {0}")]
    BelowMinimumValue(String),

    /// Signature or API key rejected
    #[error("authorization failed: {0}")]
    Unauthorized(String),

    /// Venue rate limit exhausted
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Transport-level failure (connection reset, DNS, TLS, ...)
    #[error("transport error: {0}")]
    Transport(String),

    /// Venue rejected the request for an unclassified reason
    #[error("venue error: {0}")]
    Venue(String),

    /// No response within the configured deadline
    #[error("timed out: {0}")]
    Timeout(String),

    /// A benchmark run is already in progress
    #[error("benchmark already running")]
    AlreadyRunning,

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

impl BenchError {
    /// Permanent failures are never retried; everything else is treated
    /// as transient.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            BenchError::InsufficientFunds(_)
                | BenchError::UnknownInstrument(_)
                | BenchError::BelowMinimumValue(_)
                | BenchError::Unauthorized(_)
                | BenchError::RateLimited(_)
        )
    }
}

impl From<config::ConfigError> for BenchError {
    fn from(e: config::ConfigError) -> Self {
        BenchError::Config(e.to_string())
    }
}
