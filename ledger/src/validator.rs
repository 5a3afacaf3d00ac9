//! Input and balance-rule validation.

use pointledger_common::{PointError, Result, UserId};

/// Stateless checks on ids, amounts and balances.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointValidator;

impl PointValidator {
    /// Create a validator.
    pub const fn new() -> Self {
        Self
    }

    /// Reject non-positive user ids.
    pub fn validate_id(&self, id: UserId) -> Result<()> {
        if !id.is_valid() {
            return Err(PointError::invalid(
                "id",
                format!("user id must be positive, got {id}"),
            ));
        }
        Ok(())
    }

    /// Reject non-positive charge amounts.
    pub fn validate_charge_amount(&self, amount: i64) -> Result<()> {
        if amount <= 0 {
            return Err(PointError::invalid(
                "amount",
                format!("charge amount must be greater than zero, got {amount}"),
            ));
        }
        Ok(())
    }

    /// Reject non-positive use amounts.
    pub fn validate_use_amount(&self, amount: i64) -> Result<()> {
        if amount <= 0 {
            return Err(PointError::invalid(
                "amount",
                format!("use amount must be greater than zero, got {amount}"),
            ));
        }
        Ok(())
    }

    /// Require `current >= amount`.
    pub fn validate_balance(&self, current: i64, amount: i64) -> Result<()> {
        if current < amount {
            return Err(PointError::InsufficientFunds {
                required: amount,
                available: current,
            });
        }
        Ok(())
    }

    /// Require that `current + amount` stays within `i64::MAX`.
    pub fn validate_overflow(&self, current: i64, amount: i64) -> Result<()> {
        if i64::MAX - current < amount {
            return Err(PointError::Overflow { current, amount });
        }
        Ok(())
    }
}
