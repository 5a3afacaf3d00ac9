//! Error types for PointLedger operations.

use crate::UserId;
use thiserror::Error;

/// Main error type for point operations.
///
/// Every failure of the point service is returned by value as one of these
/// variants; nothing unwinds across a held user lock.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PointError {
    /// Malformed input rejected before any lock is taken.
    #[error("Invalid {field}: {message}")]
    InvalidArgument {
        field: &'static str,
        message: String,
    },

    /// Use amount exceeds the current balance.
    #[error("Insufficient points: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    /// Charge would push the balance past the representable maximum.
    #[error("Charge of {amount} would overflow balance {current}")]
    Overflow { current: i64, amount: i64 },

    /// The user's lock was not acquired within the bound.
    #[error("Timed out after {waited_ms}ms waiting for lock on user {user_id}")]
    LockTimeout { user_id: UserId, waited_ms: u64 },

    /// The wait for the user's lock was cancelled.
    #[error("Lock wait cancelled for user {user_id}")]
    Cancelled { user_id: UserId },

    /// Backing store failure.
    #[error("Store error: {0}")]
    Store(String),
}

impl PointError {
    /// Build an `InvalidArgument` error.
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        PointError::InvalidArgument {
            field,
            message: message.into(),
        }
    }

    /// Check if the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PointError::LockTimeout { .. } | PointError::Cancelled { .. }
        )
    }

    /// Check if this is a rejection of the request itself (bad input or a
    /// business rule), as opposed to an infrastructure failure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            PointError::InvalidArgument { .. }
                | PointError::InsufficientFunds { .. }
                | PointError::Overflow { .. }
        )
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            PointError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            PointError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            PointError::Overflow { .. } => "OVERFLOW",
            PointError::LockTimeout { .. } => "LOCK_TIMEOUT",
            PointError::Cancelled { .. } => "CANCELLED",
            PointError::Store(_) => "STORE_ERROR",
        }
    }
}

/// Result type alias for point operations.
pub type Result<T> = std::result::Result<T, PointError>;
