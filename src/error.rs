//! Error types for the recommendation engine

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the recommendation engine
#[derive(Error, Debug)]
pub enum Error {
    /// Structurally invalid input (zero limit, unknown strategy tag,
    /// non-positive TTL, weights not summing to 1). Never retried,
    /// never cached.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown item or user reported by a collaborator. Recovered
    /// internally by falling back to trending; only surfaced by the
    /// collaborator ports themselves.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Strategy computation exceeded its deadline or was cancelled
    #[error("computation timed out: {0}")]
    Timeout(String),

    /// Catalog or history collaborator failed
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the error should be retried against the upstream once
    /// before degrading.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::UpstreamUnavailable(_))
    }
}

// =============================================================================
// Tests
// =============================================================================
