//! Result type alias for Redactify

use super::errors::RedactifyError;

/// Result type alias for Redactify operations
///
/// Convenience alias using `RedactifyError` as the error type; use this
/// throughout the codebase for fallible operations.
pub type Result<T> = std::result::Result<T, RedactifyError>;
