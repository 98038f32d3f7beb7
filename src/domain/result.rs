//! Result type aliases for Anonymous

use super::errors::{AnonymousError, StoreError};

/// Result type alias for Anonymous operations
///
/// # Examples
///
/// ```
/// use anonymous::domain::result::Result;
/// use anonymous::domain::errors::AnonymousError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(AnonymousError::Configuration("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, AnonymousError>;

/// Result type alias for persistence operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
