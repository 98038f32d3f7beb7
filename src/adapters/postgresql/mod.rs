//! PostgreSQL database integration
//!
//! This module provides record stores backed by PostgreSQL.

pub mod adapter;
pub mod client;
pub mod sql;

pub use adapter::{PostgreSQLSession, PostgreSQLStore, PostgreSQLTransaction};
pub use client::PostgreSQLClient;
