//! Database abstraction traits
//!
//! This module defines the traits that store adapters must implement to work
//! with the anonymization engine.

use crate::domain::{Attributes, RecordId, StoreResult};
use async_trait::async_trait;

/// Record store used by the anonymization engine
///
/// A store hands out nested transactional scopes and gives read access to
/// persisted records. "Nested" means that rolling a scope back undoes only the
/// work done inside it, never an enclosing transaction the caller may hold.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Open a new nested transactional scope
    ///
    /// # Errors
    ///
    /// Returns an error if no connection is available or the scope cannot be
    /// opened.
    async fn begin_nested(&self) -> StoreResult<Box<dyn StoreTransaction>>;

    /// Load the current attributes of a record
    ///
    /// # Returns
    ///
    /// Returns `Ok(None)` if the record does not exist.
    async fn fetch(&self, record_type: &str, id: &RecordId) -> StoreResult<Option<Attributes>>;

    /// List the ids of every record of a type, in a stable order
    async fn list_ids(&self, record_type: &str) -> StoreResult<Vec<RecordId>>;

    /// Human-readable store name for logs
    fn store_name(&self) -> &str;
}

/// One nested transactional scope
///
/// A scope must be finished with [`commit`](Self::commit) or
/// [`rollback`](Self::rollback).
#[async_trait]
pub trait StoreTransaction: Send {
    /// Write `attributes` to the record
    ///
    /// Only the fields present in `attributes` are written; every other field
    /// of the stored record keeps its current value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UniqueViolation`](crate::domain::StoreError::UniqueViolation)
    /// if a value collides with a unique constraint, or any other
    /// [`StoreError`](crate::domain::StoreError) if the write is rejected.
    async fn update(
        &mut self,
        record_type: &str,
        id: &RecordId,
        attributes: &Attributes,
    ) -> StoreResult<()>;

    /// Make the scope's writes visible to the enclosing transaction or database
    ///
    /// Deferred constraint checks may surface here as
    /// [`StoreError::UniqueViolation`](crate::domain::StoreError::UniqueViolation);
    /// the scope is rolled back in that case.
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Discard the scope's writes
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
