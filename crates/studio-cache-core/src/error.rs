//! Error types for cache operations

use thiserror::Error;

/// Main error type for all cache operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Serialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Persistent store refused a write because its capacity is used up
    #[error("storage quota exceeded")]
    QuotaExceeded,

    /// Persistent store cannot be used at all (disabled, missing, revoked)
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Store refused this particular key or value; other keys still work
    #[error("storage rejected entry: {0}")]
    Rejected(String),

    /// Backend operation failed
    #[error("backend error: {0}")]
    Backend(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Whether the error signals a store that is down rather than one that is full
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CacheError::Unavailable(_) | CacheError::Backend(_))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            CacheError::Deserialization(err.to_string())
        } else {
            CacheError::Serialization(err.to_string())
        }
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::QuotaExceeded;
        assert_eq!(err.to_string(), "storage quota exceeded");

        let err = CacheError::Unavailable("disabled".to_string());
        assert_eq!(err.to_string(), "storage unavailable: disabled");

        let err = CacheError::Serialization("failed".to_string());
        assert_eq!(err.to_string(), "serialization error: failed");
    }

    #[test]
    fn test_unavailable_classification() {
        assert!(CacheError::Unavailable("x".into()).is_unavailable());
        assert!(CacheError::Backend("io".into()).is_unavailable());
        assert!(!CacheError::QuotaExceeded.is_unavailable());
        assert!(!CacheError::Rejected("bad name".into()).is_unavailable());
    }

    #[test]
    fn test_from_json_error() {
        let err = serde_json::from_str::<u32>("{not json").unwrap_err();
        assert!(matches!(CacheError::from(err), CacheError::Deserialization(_)));
    }
}
