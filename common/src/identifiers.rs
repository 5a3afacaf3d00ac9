//! Identifier types for PointLedger entities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a user whose point balance is tracked.
///
/// Any `i64` can be wrapped; only strictly positive ids are accepted by the
/// validator, so the raw value is kept signed to let invalid input reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Create a new user ID.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Check that the ID is in the accepted range.
    pub const fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<UserId> for i64 {
    fn from(id: UserId) -> Self {
        id.0
    }
}
