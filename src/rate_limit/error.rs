//! Counter Store Error Types
//!
//! Errors raised by counter store adapters. None of these cross the public
//! gate operations; the limiter and tracker convert them to fallback values.

/// Error types for counter store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store could not be reached
    #[error("Counter store unavailable: {0}")]
    Unavailable(String),

    /// Store call exceeded its deadline
    #[error("Counter store operation timed out after {0}ms")]
    Timeout(u64),

    /// Store answered with an error
    #[error("Counter store error: {0}")]
    Backend(String),

    /// Stored value is not an integer counter
    #[error("Invalid counter value at {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

impl StoreError {
    /// Short label used for the `kind` metric dimension
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Unavailable(_) => "unavailable",
            StoreError::Timeout(_) => "timeout",
            StoreError::Backend(_) => "backend",
            StoreError::InvalidValue { .. } => "invalid_value",
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            StoreError::Timeout(0)
        } else if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

/// Parse a raw counter value read from the store.
///
/// Absent keys count as zero.
pub fn parse_counter(key: &str, raw: Option<String>) -> Result<i64, StoreError> {
    match raw {
        None => Ok(0),
        Some(value) => value.trim().parse::<i64>().map_err(|_| StoreError::InvalidValue {
            key: key.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_counter_absent_is_zero() {
        assert_eq!(parse_counter("k", None).unwrap(), 0);
    }

    #[test]
    fn test_parse_counter_value() {
        assert_eq!(parse_counter("k", Some("42".to_string())).unwrap(), 42);
    }

    #[test]
    fn test_parse_counter_garbage() {
        let err = parse_counter("k", Some("abc".to_string())).unwrap_err();
        assert_eq!(err.kind(), "invalid_value");
        assert!(err.to_string().contains("\"abc\""));
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::Timeout(250);
        assert_eq!(err.to_string(), "Counter store operation timed out after 250ms");
        assert_eq!(StoreError::Unavailable("down".into()).kind(), "unavailable");
    }
}
