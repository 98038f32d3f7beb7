//! Configuration management for Anonymous.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Anonymous uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `ANONYMOUS_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Declarative per-table anonymization rules
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry-run mode
//! - [`AnonymizationConfig`](crate::anonymization::AnonymizationConfig) - Retry bound and audit log
//! - [`PostgreSQLConfig`] - Database connection
//! - [`LoggingConfig`] - Local log files
//! - [`TableConfig`] - Field rules per table
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [anonymization]
//! max_retries = 3
//!
//! [postgresql]
//! connection_string = "${ANONYMOUS_DATABASE_URL}"
//!
//! [[tables]]
//! name = "users"
//!
//! [tables.fields.email]
//! kind = "template"
//! template = "user-{id}@example.invalid"
//!
//! [tables.fields.last_name]
//! kind = "fake"
//! faker = "last_name"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{AnonymousConfig, ApplicationConfig, LoggingConfig, PostgreSQLConfig, TableConfig};
pub use secret::{secret_string, SecretString, SecretValue};
