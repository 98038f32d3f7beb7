//! Domain models and types for Anonymous.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`RecordId`])
//! - **Attribute mappings** ([`Attributes`])
//! - **Error types** ([`AnonymousError`], [`StoreError`])
//! - **Result type aliases** ([`Result`], [`StoreResult`])
//!
//! # Error Handling
//!
//! All fallible library operations return [`Result<T, AnonymousError>`]. Store
//! failures lift into it with the `?` operator:
//!
//! ```rust
//! use anonymous::domain::{Result, StoreError, StoreResult};
//!
//! fn lookup() -> StoreResult<()> {
//!     Err(StoreError::NotFound("users/42".to_string()))
//! }
//!
//! fn example() -> Result<()> {
//!     lookup()?;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod ids;
pub mod record;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{AnonymousError, StoreError};
pub use ids::RecordId;
pub use record::{attributes_from_json, attributes_to_json, Attributes};
pub use result::{Result, StoreResult};
