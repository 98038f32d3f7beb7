//! Audit logging module
//!
//! Provides structured audit logging for committed anonymizations.

pub mod logger;

pub use logger::AuditLogger;
