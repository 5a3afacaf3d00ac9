//! Transaction kinds recorded in the point history.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a committed point mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Points added to the balance.
    Charge,
    /// Points spent from the balance.
    Use,
}

impl TransactionType {
    /// Stable wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Charge => "CHARGE",
            TransactionType::Use => "USE",
        }
    }

    /// Signed effect of `amount` on the balance.
    pub fn signed_amount(&self, amount: i64) -> i64 {
        match self {
            TransactionType::Charge => amount,
            TransactionType::Use => -amount,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_string(&TransactionType::Charge).unwrap(),
            "\"CHARGE\""
        );
        assert_eq!(TransactionType::Use.to_string(), "USE");
    }

    #[test]
    fn test_signed_amount() {
        assert_eq!(TransactionType::Charge.signed_amount(300), 300);
        assert_eq!(TransactionType::Use.signed_amount(300), -300);
    }
}
