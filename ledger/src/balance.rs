//! User point balance.

use pointledger_common::{time, UserId};
use serde::{Deserialize, Serialize};

/// Current point balance of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPoint {
    /// User this balance belongs to.
    pub id: UserId,
    /// Current balance, always within `0..=i64::MAX`.
    pub point: i64,
    /// Last update, epoch milliseconds.
    pub update_millis: i64,
}

impl UserPoint {
    /// Create a balance record stamped with the current time.
    pub fn new(id: UserId, point: i64) -> Self {
        Self {
            id,
            point,
            update_millis: time::now_millis(),
        }
    }

    /// Zero balance for a user that never transacted.
    pub fn empty(id: UserId) -> Self {
        Self::new(id, 0)
    }
}
