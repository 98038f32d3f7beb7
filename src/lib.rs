// Anonymous - Transactional record anonymization
// Copyright (c) 2025 Anonymous Contributors
// Licensed under the MIT License

//! # Anonymous - Transactional record anonymization
//!
//! Anonymous replaces the persisted fields of database records with generated
//! values. Each record is written back in its own nested transaction, and an
//! attempt whose values collide with a unique constraint is regenerated and
//! retried up to a configured bound.
//!
//! ## Architecture
//!
//! - [`anonymization`] - Field rules, value generation and the retrying engine
//! - [`adapters`] - Record stores (in-memory, PostgreSQL)
//! - [`domain`] - Core types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//! - [`cli`] - Command-line interface
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use anonymous::adapters::memory::MemoryStore;
//! use anonymous::anonymization::{AnonymizationConfig, AnonymizationEngine, Record, RuleSet};
//! use anonymous::domain::{Attributes, RecordId};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     store.create_table("users", &["email"])?;
//!
//!     let id = RecordId::new("7")?;
//!     let mut attrs = Attributes::new();
//!     attrs.insert("id".to_string(), json!(7));
//!     attrs.insert("email".to_string(), json!("jane@example.com"));
//!     store.insert("users", id.clone(), attrs.clone())?;
//!
//!     let rules = RuleSet::new()
//!         .generate("email", |_| Ok(json!(format!("{}@example.invalid", uuid::Uuid::new_v4()))));
//!     let mut record = Record::new("users", id, attrs).with_rules(rules);
//!
//!     let engine = AnonymizationEngine::new(store, AnonymizationConfig::with_max_retries(3))?;
//!     let outcome = engine.anonymize_strict(&mut record).await?;
//!     println!("Committed after {} attempt(s)", outcome.attempts);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library functions return [`domain::AnonymousError`]. Store failures are
//! wrapped as [`domain::StoreError`], whose `UniqueViolation` variant is the
//! only one the engine retries.

pub mod adapters;
pub mod anonymization;
pub mod cli;
pub mod config;
pub mod domain;
pub mod logging;
