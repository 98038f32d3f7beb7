//! In-memory store adapter
//!
//! Used by tests and dry runs. Supports unique columns, row validators and
//! isolated nested transactions.

pub mod store;

pub use store::{MemoryStore, MemoryTransaction, TransactionStats, Validator};
