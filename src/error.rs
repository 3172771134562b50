//! Error taxonomy for the vocabulary service
//!
//! Every failure a caller can observe maps onto one of these variants. The
//! split matters: a persistence failure must never be reported as an unknown
//! word, and an extraction failure never reaches a synchronous caller.

use thiserror::Error;

use crate::extractor::ExtractError;

pub type VocabResult<T> = Result<T, VocabError>;

/// Main error type for the vocabulary service
#[derive(Error, Debug)]
pub enum VocabError {
    /// Missing or malformed request fields. Rejected before any work starts.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    /// The backing store could not be reached or refused the operation.
    #[error("vocabulary store unavailable: {0}")]
    StoreUnavailable(String),

    /// A real-time channel frame that could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Import data that would break id or word uniqueness.
    #[error("conflicting vocabulary data: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VocabError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::Protocol(_) => 400,
            Self::Conflict(_) => 409,
            Self::Extraction(_) => 502,
            Self::StoreUnavailable(_) => 503,
            Self::Io(_) | Self::Serialization(_) => 500,
        }
    }

    /// Short machine-readable code used in websocket error frames.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Extraction(_) => "extraction_failed",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Protocol(_) => "malformed_message",
            Self::Conflict(_) => "conflict",
            Self::Io(_) | Self::Serialization(_) => "internal",
        }
    }

    /// Transient failures are worth retrying by the client; the rest are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Extraction(_))
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for VocabError {
    fn from(err: sqlx::Error) -> Self {
        VocabError::StoreUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(VocabError::InvalidInput("url".into()).http_status(), 400);
        assert_eq!(VocabError::Protocol("bad".into()).http_status(), 400);
        assert_eq!(VocabError::Conflict("dup".into()).http_status(), 409);
        assert_eq!(
            VocabError::StoreUnavailable("down".into()).http_status(),
            503
        );
    }

    #[test]
    fn test_store_errors_are_transient() {
        assert!(VocabError::StoreUnavailable("down".into()).is_transient());
        assert!(!VocabError::InvalidInput("x".into()).is_transient());
        assert_eq!(
            VocabError::StoreUnavailable("down".into()).code(),
            "store_unavailable"
        );
    }
}
