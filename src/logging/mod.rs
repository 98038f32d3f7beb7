//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Console output
//! - JSON-formatted log files with rotation
//! - Configurable log levels (overridable through `RUST_LOG`)
//!
//! # Example
//!
//! ```no_run
//! use anonymous::logging::init_logging;
//! use anonymous::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log a retry after a uniqueness conflict
///
/// # Example
///
/// ```no_run
/// use anonymous::log_retry_attempt;
///
/// log_retry_attempt!("users", "42", 1, 3, "duplicate email");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($record_type:expr, $record_id:expr, $retry:expr, $max_retries:expr, $reason:expr) => {
        tracing::warn!(
            record_type = %$record_type,
            record_id = %$record_id,
            retry = $retry,
            max_retries = $max_retries,
            reason = %$reason,
            "Uniqueness conflict, retrying anonymization"
        );
    };
}

/// Log a committed anonymization
///
/// # Example
///
/// ```no_run
/// use anonymous::log_anonymization_complete;
/// use anonymous::anonymization::AnonymizationOutcome;
/// use anonymous::domain::RecordId;
///
/// let outcome = AnonymizationOutcome::new(
///     "users".to_string(),
///     RecordId::new("42").unwrap(),
///     1,
///     vec!["email".to_string()],
///     3,
/// );
/// log_anonymization_complete!(&outcome);
/// ```
#[macro_export]
macro_rules! log_anonymization_complete {
    ($outcome:expr) => {
        tracing::info!(
            record_type = %$outcome.record_type,
            record_id = %$outcome.record_id,
            attempts = $outcome.attempts,
            fields = $outcome.fields.len(),
            duration_ms = $outcome.processing_time_ms,
            "Record anonymized"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use anonymous::log_error_with_context;
/// use anonymous::domain::AnonymousError;
///
/// let error = AnonymousError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = %$context,
            "Error occurred"
        );
    };
}
