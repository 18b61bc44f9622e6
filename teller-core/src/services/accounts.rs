//! Account manager - deposits, withdrawals and transfers
//!
//! Every money movement runs under the lock of each account it touches:
//! fetch a fresh copy, mutate it in memory, persist it, then report the
//! outcome to the bank history. A copy whose persist failed is dropped,
//! never reused.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{is_storable, AccountId, Operation, Session, User, MONEY_SCALE};
use crate::ports::AccountStore;
use crate::services::{AccountLocks, AuthenticationManager, BankHistory};

/// Orchestrates money movement between accounts
pub struct AccountManager {
    store: Arc<dyn AccountStore>,
    auth: Arc<AuthenticationManager>,
    history: Arc<BankHistory>,
    locks: AccountLocks,
}

fn check_amount(amount: Decimal) -> Result<()> {
    if amount < Decimal::ZERO {
        return Err(Error::invalid_argument(format!(
            "Amount must not be negative, got {}",
            amount
        )));
    }
    if !is_storable(amount) {
        return Err(Error::invalid_argument(format!(
            "Amount {} is out of range or has more than {} decimal places",
            amount, MONEY_SCALE
        )));
    }
    Ok(())
}

impl AccountManager {
    pub fn new(
        store: Arc<dyn AccountStore>,
        auth: Arc<AuthenticationManager>,
        history: Arc<BankHistory>,
    ) -> Self {
        Self {
            store,
            auth,
            history,
            locks: AccountLocks::new(),
        }
    }

    /// Credit `amount` to an account.
    ///
    /// Deposits are not authorized. A missing account is not an error: the
    /// attempt is audited with `success = false` and `Ok(false)` is returned.
    pub fn deposit(
        &self,
        actor: &User,
        amount: Decimal,
        description: &str,
        account_id: AccountId,
    ) -> Result<bool> {
        check_amount(amount)?;
        let _guard = self.locks.lock(account_id);

        let account = self.store.find_account(account_id)?;
        let operation = Operation::deposit(actor, amount, description, account.as_ref());

        let success = match account {
            Some(mut account) => account.credit(amount) && self.store.update_account(&account)?,
            None => {
                debug!(account_id, "deposit into unknown account");
                false
            }
        };

        self.history.record(&operation, success)?;
        if success {
            info!(account_id, %amount, actor = actor.id, "deposit");
        }
        Ok(success)
    }

    /// Debit `amount` from an account the actor may withdraw from.
    ///
    /// Insufficient funds return `Ok(false)` without touching the store.
    pub fn withdraw(
        &self,
        actor: &User,
        amount: Decimal,
        description: &str,
        account_id: AccountId,
    ) -> Result<bool> {
        check_amount(amount)?;
        let _guard = self.locks.lock(account_id);

        let mut account = self
            .store
            .find_account(account_id)?
            .ok_or_else(|| Error::invalid_argument(format!("Account {} not found", account_id)))?;

        let operation = Operation::withdrawal(actor, amount, description, &account);
        if !self.auth.can_invoke_operation(&operation, actor) {
            return self.deny(&operation, actor, account_id);
        }

        let success = if account.debit(amount) {
            self.store.update_account(&account)?
        } else {
            debug!(account_id, %amount, "insufficient funds");
            false
        };

        self.history.record(&operation, success)?;
        if success {
            info!(account_id, %amount, actor = actor.id, "withdrawal");
        }
        Ok(success)
    }

    /// Move `amount` from `source_id` to `dest_id`.
    ///
    /// Only the outgoing leg is authorized. The returned flag reflects the
    /// source persist alone: a destination persist that reports failure is
    /// logged as a warning but does not change the result, and both legs are
    /// audited with the same flag.
    pub fn transfer(
        &self,
        actor: &User,
        amount: Decimal,
        description: &str,
        source_id: AccountId,
        dest_id: AccountId,
    ) -> Result<bool> {
        check_amount(amount)?;
        if source_id == dest_id {
            return Err(Error::invalid_argument(format!(
                "Cannot transfer from account {} to itself",
                source_id
            )));
        }
        let _guard = self.locks.lock_pair(source_id, dest_id);

        let mut source = self
            .store
            .find_account(source_id)?
            .ok_or_else(|| Error::invalid_argument(format!("Source account {} not found", source_id)))?;
        let mut dest = self
            .store
            .find_account(dest_id)?
            .ok_or_else(|| Error::invalid_argument(format!("Destination account {} not found", dest_id)))?;

        let outgoing = Operation::transfer_out(actor, amount, description, &source);
        let incoming = Operation::transfer_in(actor, amount, description, &dest);
        if !self.auth.can_invoke_operation(&outgoing, actor) {
            return self.deny(&outgoing, actor, source_id);
        }

        let mut success = source.debit(amount) && dest.credit(amount);
        if success {
            success = self.store.update_account(&source)?;
            if success && !self.store.update_account(&dest)? {
                warn!(
                    source_id,
                    dest_id,
                    %amount,
                    "destination persist failed after source was debited"
                );
            }
        } else {
            debug!(source_id, %amount, "insufficient funds for transfer");
        }

        self.history.record(&outgoing, success)?;
        self.history.record(&incoming, success)?;
        if success {
            info!(source_id, dest_id, %amount, actor = actor.id, "transfer");
        }
        Ok(success)
    }

    fn deny(&self, operation: &Operation, actor: &User, account_id: AccountId) -> Result<bool> {
        let reason = format!("user {} does not own account {}", actor.id, account_id);
        warn!(actor = actor.id, account_id, kind = %operation.kind(), "operation denied");
        self.history.record_unauthorized(operation, reason.as_str())?;
        Err(Error::unauthorized(reason))
    }

    /// Authenticate and open a session for the caller
    pub fn login(&self, username: &str, secret: &str) -> Result<Session> {
        let user = self.auth.login(username, secret)?;
        Ok(Session::new(user))
    }

    /// Close a session, consuming it
    pub fn logout(&self, session: Session) -> Result<bool> {
        self.auth.logout(session.user())
    }
}
