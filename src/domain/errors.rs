//! Domain error types
//!
//! This module defines the error hierarchy for Anonymous.
//! Persistence failures are modelled separately in [`StoreError`] so the
//! anonymization retry loop can tell uniqueness conflicts apart from every
//! other storage failure without inspecting third-party error types.

use thiserror::Error;

/// Main Anonymous error type
///
/// This is the primary error type used throughout the library.
#[derive(Debug, Error)]
pub enum AnonymousError {
    /// Configuration-related errors, including malformed rule sets
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The record type did not declare any anonymization rules
    #[error(
        "Class {record_type} must implement anonymization rules to use the anonymization functionality"
    )]
    NotImplemented {
        /// Concrete record type name
        record_type: String,
    },

    /// Persistence-layer errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl AnonymousError {
    /// Returns `true` if this error is a uniqueness conflict raised by the store
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, AnonymousError::Store(err) if err.is_unique_violation())
    }

    /// Returns the store error when this error originated in the persistence layer
    pub fn as_store_error(&self) -> Option<&StoreError> {
        match self {
            AnonymousError::Store(err) => Some(err),
            _ => None,
        }
    }
}

/// Persistence-layer errors
///
/// Errors reported by a [`RecordStore`](crate::adapters::database::RecordStore)
/// implementation. These errors don't expose driver types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A written value collided with an existing unique value
    #[error("Uniqueness conflict on {constraint}: {message}")]
    UniqueViolation {
        /// Name of the violated constraint or column
        constraint: String,
        /// Driver or store message
        message: String,
    },

    /// The store rejected the values for any other integrity or validation reason
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The record or table does not exist
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Failed to reach the store
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query or statement failure
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Failed to open, commit or roll back a transaction
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

impl StoreError {
    /// Returns `true` for the retryable uniqueness-conflict class
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for AnonymousError {
    fn from(err: std::io::Error) -> Self {
        AnonymousError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for AnonymousError {
    fn from(err: serde_json::Error) -> Self {
        AnonymousError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for AnonymousError {
    fn from(err: toml::de::Error) -> Self {
        AnonymousError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_error_display() {
        let err = AnonymousError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_not_implemented_names_type() {
        let err = AnonymousError::NotImplemented {
            record_type: "User".to_string(),
        };
        assert!(err.to_string().starts_with("Class User must implement"));
    }

    #[test]
    fn test_store_error_conversion() {
        let store_err = StoreError::UniqueViolation {
            constraint: "users_email_key".to_string(),
            message: "duplicate key".to_string(),
        };
        let err: AnonymousError = store_err.clone().into();
        assert!(err.is_unique_violation());
        assert_eq!(err.as_store_error(), Some(&store_err));
    }

    #[test]
    fn test_other_store_errors_are_not_conflicts() {
        let err: AnonymousError = StoreError::Validation("name can't be blank".to_string()).into();
        assert!(!err.is_unique_violation());
        assert!(!AnonymousError::Configuration("x".to_string()).is_unique_violation());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: AnonymousError = io_err.into();
        assert!(matches!(err, AnonymousError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: AnonymousError = json_err.into();
        assert!(matches!(err, AnonymousError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: AnonymousError = toml_err.into();
        assert!(matches!(err, AnonymousError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_errors_implement_std_error() {
        let err = AnonymousError::Configuration("Test error".to_string());
        let _: &dyn std::error::Error = &err;
        let store_err = StoreError::ConnectionFailed("refused".to_string());
        let _: &dyn std::error::Error = &store_err;
    }
}
