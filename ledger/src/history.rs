//! Point history records.

use pointledger_common::{TransactionType, UserId};
use serde::{Deserialize, Serialize};

/// One committed point mutation. Records are never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointHistory {
    /// Store-assigned sequence number.
    pub id: u64,
    /// User the mutation applied to.
    pub user_id: UserId,
    /// Amount moved, always positive.
    pub amount: i64,
    /// Charge or use.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Commit time, epoch milliseconds.
    pub update_millis: i64,
}

impl PointHistory {
    /// Signed effect on the balance.
    pub fn signed_amount(&self) -> i64 {
        self.kind.signed_amount(self.amount)
    }
}

/// Net balance change described by a run of history records.
///
/// History is an audit trail, not the source of truth for balances; this is
/// used for reconciliation checks only.
pub fn net_change(records: &[PointHistory]) -> i128 {
    records.iter().map(|r| r.signed_amount() as i128).sum()
}
