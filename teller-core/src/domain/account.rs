//! Account domain model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::user::{User, UserId};

pub type AccountId = i64;

/// Decimal places kept for balances and amounts (DECIMAL(18, 4) columns)
pub const MONEY_SCALE: u32 = 4;

/// Largest balance or amount the store can hold
pub fn max_money() -> Decimal {
    Decimal::new(999_999_999_999_999_999, MONEY_SCALE)
}

/// Whether `amount` survives a round trip through the store unchanged
pub fn is_storable(amount: Decimal) -> bool {
    amount.normalize().scale() <= MONEY_SCALE && amount.abs() <= max_money()
}

/// A balance-bearing account.
///
/// Accounts are values: fetch one, mutate it in memory, then hand it back to
/// the store. A mutated copy is not durable until the store reports success,
/// and must be dropped after a failed persist rather than reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: Decimal,
    /// Owning user (relation only)
    pub owner_id: Option<UserId>,
}

impl Account {
    pub fn new(id: AccountId, balance: Decimal, owner_id: Option<UserId>) -> Self {
        Self {
            id,
            balance,
            owner_id,
        }
    }

    /// Whether `user` owns this account
    pub fn is_owned_by(&self, user: &User) -> bool {
        self.owner_id == Some(user.id)
    }

    /// Add `amount` to the balance.
    ///
    /// Returns false and leaves the balance untouched when the result would
    /// exceed [`max_money`].
    pub fn credit(&mut self, amount: Decimal) -> bool {
        if amount < Decimal::ZERO {
            return false;
        }
        match self.balance.checked_add(amount) {
            Some(balance) if balance <= max_money() => {
                self.balance = balance;
                true
            }
            _ => false,
        }
    }

    /// Subtract `amount` from the balance.
    ///
    /// Returns false and leaves the balance untouched when it would go below zero.
    pub fn debit(&mut self, amount: Decimal) -> bool {
        if amount < Decimal::ZERO {
            return false;
        }
        if amount > self.balance {
            return false;
        }
        self.balance -= amount;
        true
    }
}
