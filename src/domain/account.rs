//! User balance account.
//!
//! One account per identity, created by an explicit provisioning call from
//! the identity workflow. The balance never goes below zero; the only
//! mutators are [`Account::charge`] and [`Account::topup`], and both must run
//! on a row that is exclusively locked by the surrounding storage unit.
//! Neither mutator deduplicates on its own; exactly-once semantics belong to
//! the coordinator that calls them.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::money;
use crate::error::LedgerError;

pub const DEFAULT_CURRENCY: &str = "NPR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub balance: BigDecimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Whether the balance covers `amount`. A negative amount is a caller
    /// error, not a business rejection.
    pub fn can_charge(&self, amount: &BigDecimal) -> Result<bool, LedgerError> {
        if money::is_negative(amount) {
            return Err(LedgerError::InvalidAmount(format!(
                "charge amount must not be negative, got {amount}"
            )));
        }
        Ok(self.balance >= *amount)
    }

    /// Decrements the balance. Fails with `InsufficientFunds` before any
    /// mutation when the balance does not cover the amount.
    pub fn charge(&mut self, amount: &BigDecimal) -> Result<(), LedgerError> {
        if !self.can_charge(amount)? {
            return Err(LedgerError::InsufficientFunds);
        }
        self.balance = money::quantize(&(&self.balance - amount));
        debug_assert!(!money::is_negative(&self.balance));
        Ok(())
    }

    /// Increments the balance.
    pub fn topup(&mut self, amount: &BigDecimal) -> Result<(), LedgerError> {
        if money::is_negative(amount) {
            return Err(LedgerError::InvalidAmount(format!(
                "top-up amount must not be negative, got {amount}"
            )));
        }
        self.balance = money::quantize(&(&self.balance + amount));
        Ok(())
    }
}
