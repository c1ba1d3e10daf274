//! Error types for the allocation and yield engine.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the core for caller mistakes.
///
/// Numeric edge cases (zero totals, empty catalogs, missing quotes) are
/// resolved to defined values and never surface here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// An identifier that is not part of the fixed asset set or the catalog.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },
}

impl CoreError {
    pub fn unknown_asset(symbol: &str) -> Self {
        CoreError::InvalidArgument {
            reason: format!("unknown asset '{symbol}'"),
        }
    }

    pub fn unknown_strategy(id: &str) -> Self {
        CoreError::InvalidArgument {
            reason: format!("unknown strategy '{id}'"),
        }
    }
}
