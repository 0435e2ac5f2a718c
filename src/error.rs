//! Error types for tessera
//!
//! Every failure is scoped to the request that produced it. Decode and
//! schema errors are raised before any index is mutated.

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed predicate, row or request bytes (unknown tag, truncated stream)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Operation the target indexer or tree does not implement
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Request does not fit the configured column schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Registry configuration rejected at construction
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// JSON configuration could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Error::Decode(msg.into())
    }

    /// Create an unsupported operation error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::UnsupportedOperation(msg.into())
    }

    /// Create a schema mismatch error
    pub fn schema(msg: impl Into<String>) -> Self {
        Error::SchemaMismatch(msg.into())
    }

    /// Create an invalid config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    /// Stable numeric code written into faulted responses.
    pub fn code(&self) -> u32 {
        match self {
            Error::Decode(_) => 1,
            Error::UnsupportedOperation(_) => 2,
            Error::SchemaMismatch(_) => 3,
            Error::InvalidConfig(_) | Error::Json(_) => 4,
        }
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::UnsupportedOperation(_))
    }

    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, Error::SchemaMismatch(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = [
            Error::decode("x"),
            Error::unsupported("x"),
            Error::schema("x"),
            Error::config("x"),
        ];
        let mut codes: Vec<u32> = errors.iter().map(Error::code).collect();
        codes.dedup();
        assert_eq!(codes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_error_display() {
        let err = Error::unsupported("fetch on unindexed column");
        assert_eq!(err.to_string(), "Unsupported operation: fetch on unindexed column");
        assert!(err.is_unsupported());
        assert!(!err.is_decode());
    }
}
