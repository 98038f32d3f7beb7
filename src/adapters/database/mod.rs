//! Database abstraction layer
//!
//! This module provides a trait-based abstraction for record storage, allowing
//! the anonymization engine to work with different backends (in-memory,
//! PostgreSQL).

pub mod traits;

pub use traits::{RecordStore, StoreTransaction};
