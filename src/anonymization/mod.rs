//! Anonymization module
//!
//! This module replaces the persisted fields of records with generated values
//! and writes them back transactionally, retrying when a generated value
//! collides with a unique constraint.
//!
//! # Architecture
//!
//! The anonymization pipeline consists of:
//! - **Rules**: per-field replacement rules ([`FieldRule`], [`RuleSet`]), either built
//!   in code or compiled from declarative [`RuleDefinition`]s
//! - **Generation**: [`generate`] derives a fresh attribute mapping from the current one
//! - **Orchestration**: [`AnonymizationEngine`] runs each attempt in a nested
//!   transaction with bounded retry on uniqueness conflicts
//! - **Audit**: Structured logging with hashed original values
//!
//! # Usage
//!
//! ```rust,ignore
//! use anonymous::anonymization::{AnonymizationConfig, AnonymizationEngine};
//!
//! let engine = AnonymizationEngine::new(store, AnonymizationConfig::with_max_retries(3))?;
//! let outcome = engine.anonymize_strict(&mut record).await?;
//! ```

pub mod anonymizer;
pub mod audit;
pub mod config;
pub mod definitions;
pub mod engine;
pub mod generator;
pub mod models;
pub mod record;
pub mod rules;

// Re-export main types
pub use config::{AnonymizationConfig, AuditConfig};
pub use definitions::{compile_rules, RuleDefinition};
pub use engine::AnonymizationEngine;
pub use generator::{declared_changes, generate};
pub use models::AnonymizationOutcome;
pub use record::{Anonymizable, Record};
pub use rules::{FieldRule, RuleSet, Template};

/// Public name of the orchestrator
pub type Anonymizer = AnonymizationEngine;
