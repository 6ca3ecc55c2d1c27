//! Fleet Coordinator error types.
//!
//! Nothing in the coordination core propagates these to the hosting process.
//! They exist so store and provider failures can be logged with a stable
//! category and counted in metrics.

use thiserror::Error;

/// Fleet Coordinator error type.
#[derive(Debug, Error)]
pub enum FcError {
    /// Shared store operation failed (network, timeout, script error).
    #[error("Redis error: {0}")]
    Redis(String),

    /// A stored document could not be decoded or encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Meeting provider call failed.
    #[error("Meeting provider error: {0}")]
    Provider(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FcError {
    /// Bounded label for the `error_type` dimension in metrics and logs.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            FcError::Redis(_) => "redis",
            FcError::Serialization(_) => "serialization",
            FcError::Provider(_) => "provider",
            FcError::Config(_) => "config",
        }
    }
}

impl From<serde_json::Error> for FcError {
    fn from(err: serde_json::Error) -> Self {
        FcError::Serialization(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            FcError::Redis("timeout".to_string()).to_string(),
            "Redis error: timeout"
        );
        assert_eq!(
            FcError::Provider("502 Bad Gateway".to_string()).to_string(),
            "Meeting provider error: 502 Bad Gateway"
        );
    }

    #[test]
    fn test_error_type_labels() {
        assert_eq!(FcError::Redis(String::new()).error_type(), "redis");
        assert_eq!(
            FcError::Serialization(String::new()).error_type(),
            "serialization"
        );
        assert_eq!(FcError::Provider(String::new()).error_type(), "provider");
        assert_eq!(FcError::Config(String::new()).error_type(), "config");
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let fc_err: FcError = err.into();
        assert!(matches!(fc_err, FcError::Serialization(_)));
    }
}
