//! Interest operator - periodic interest accrual
//!
//! Interest is paid through the ordinary deposit path, acting as a system
//! identity resolved by name. Each accrual is audited twice: once by the
//! deposit itself and once as an Interest entry with the same outcome.

use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Operation, User, MONEY_SCALE};
use crate::ports::AccountStore;
use crate::services::{AccountManager, BankHistory};

/// Interest accrual parameters
#[derive(Debug, Clone, PartialEq)]
pub struct InterestSettings {
    /// Multiplier applied to the balance on each accrual
    pub rate: Decimal,
    /// Name of the user that interest deposits are made as
    pub authority_name: String,
    pub description: String,
}

impl Default for InterestSettings {
    fn default() -> Self {
        Self {
            rate: Decimal::new(2, 1),
            authority_name: "InterestOperator".to_string(),
            description: "Interest ...".to_string(),
        }
    }
}

/// Outcome of a batch accrual
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccrualReport {
    /// Accounts visited
    pub accounts: usize,
    /// Accounts whose interest deposit succeeded
    pub credited: usize,
    /// Accounts whose interest deposit reported failure
    pub failed: usize,
    /// Sum of interest successfully deposited
    pub total_interest: Decimal,
}

/// Pays interest into accounts
pub struct InterestOperator {
    store: Arc<dyn AccountStore>,
    manager: Arc<AccountManager>,
    history: Arc<BankHistory>,
    settings: InterestSettings,
}

impl InterestOperator {
    pub fn new(
        store: Arc<dyn AccountStore>,
        manager: Arc<AccountManager>,
        history: Arc<BankHistory>,
        settings: InterestSettings,
    ) -> Self {
        Self {
            store,
            manager,
            history,
            settings,
        }
    }

    pub fn settings(&self) -> &InterestSettings {
        &self.settings
    }

    fn authority(&self) -> Result<User> {
        self.store
            .find_user_by_name(&self.settings.authority_name)?
            .ok_or_else(|| {
                Error::MissingIdentity(format!(
                    "interest authority '{}' not found",
                    self.settings.authority_name
                ))
            })
    }

    /// Interest owed on `account` for one period.
    ///
    /// Never negative, and rounded half-to-even to the stored scale.
    pub fn interest_for(&self, account: &Account) -> Result<Decimal> {
        let interest = account.balance.checked_mul(self.settings.rate).ok_or_else(|| {
            Error::invalid_argument(format!(
                "interest on account {} overflows at rate {}",
                account.id, self.settings.rate
            ))
        })?;
        Ok(interest
            .max(Decimal::ZERO)
            .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven))
    }

    /// Deposit one period of interest into `account`.
    ///
    /// Returns the deposit outcome, which is also the outcome recorded on the
    /// Interest audit entry.
    pub fn accrue(&self, account: &Account) -> Result<bool> {
        let authority = self.authority()?;
        self.accrue_as(&authority, account).map(|(success, _)| success)
    }

    /// Returns the deposit outcome and the interest attempted
    fn accrue_as(&self, authority: &User, account: &Account) -> Result<(bool, Decimal)> {
        let interest = self.interest_for(account)?;
        debug!(account_id = account.id, %interest, "accruing interest");

        let success = self
            .manager
            .deposit(authority, interest, &self.settings.description, account.id)?;

        let operation = Operation::interest(authority, interest, &self.settings.description, account);
        self.history.record(&operation, success)?;
        Ok((success, interest))
    }

    /// Accrue interest on every account, in ascending id order.
    ///
    /// A storage fault, a missing authority or an overflowing interest
    /// computation aborts the batch; accounts already credited stay credited.
    pub fn accrue_all(&self) -> Result<AccrualReport> {
        let authority = self.authority()?;
        let mut report = AccrualReport::default();

        for account in self.store.list_accounts()? {
            report.accounts += 1;
            let (success, interest) = self.accrue_as(&authority, &account)?;
            if success {
                report.credited += 1;
                report.total_interest = report.total_interest.saturating_add(interest);
            } else {
                report.failed += 1;
            }
        }

        info!(
            accounts = report.accounts,
            credited = report.credited,
            failed = report.failed,
            total = %report.total_interest,
            "interest accrued"
        );
        Ok(report)
    }
}
