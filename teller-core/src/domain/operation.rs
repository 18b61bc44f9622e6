//! Operation domain model
//!
//! An `Operation` is an immutable record of something an actor attempted.
//! It is built once per call, handed to the audit trail and then dropped;
//! it never carries transactional state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::account::{Account, AccountId};
use super::user::User;

/// Kind of an attempted operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Deposit,
    Withdrawal,
    /// Outbound leg of an internal transfer
    TransferOut,
    /// Inbound leg of an internal transfer
    TransferIn,
    LogIn,
    LogOut,
    Interest,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Deposit => "deposit",
            OperationKind::Withdrawal => "withdrawal",
            OperationKind::TransferOut => "transfer_out",
            OperationKind::TransferIn => "transfer_in",
            OperationKind::LogIn => "log_in",
            OperationKind::LogOut => "log_out",
            OperationKind::Interest => "interest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(OperationKind::Deposit),
            "withdrawal" => Some(OperationKind::Withdrawal),
            "transfer_out" => Some(OperationKind::TransferOut),
            "transfer_in" => Some(OperationKind::TransferIn),
            "log_in" => Some(OperationKind::LogIn),
            "log_out" => Some(OperationKind::LogOut),
            "interest" => Some(OperationKind::Interest),
            _ => None,
        }
    }

    /// Money leaves the target account (subject to ownership checks)
    pub fn is_withdrawal(&self) -> bool {
        matches!(self, OperationKind::Withdrawal | OperationKind::TransferOut)
    }

    /// Money enters the target account
    pub fn is_deposit(&self) -> bool {
        matches!(
            self,
            OperationKind::Deposit | OperationKind::TransferIn | OperationKind::Interest
        )
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attempted operation, recorded for audit only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    kind: OperationKind,
    actor: Option<User>,
    amount: Option<Decimal>,
    description: String,
    /// Snapshot of the target account as it was when the operation was built
    account: Option<Account>,
    timestamp: DateTime<Utc>,
}

impl Operation {
    fn build(
        kind: OperationKind,
        actor: Option<&User>,
        amount: Option<Decimal>,
        description: impl Into<String>,
        account: Option<&Account>,
    ) -> Self {
        Self {
            kind,
            actor: actor.cloned(),
            amount,
            description: description.into(),
            account: account.cloned(),
            timestamp: Utc::now(),
        }
    }

    /// Deposit into `account`; the account may be missing (not found)
    pub fn deposit(
        actor: &User,
        amount: Decimal,
        description: impl Into<String>,
        account: Option<&Account>,
    ) -> Self {
        Self::build(OperationKind::Deposit, Some(actor), Some(amount), description, account)
    }

    pub fn withdrawal(
        actor: &User,
        amount: Decimal,
        description: impl Into<String>,
        account: &Account,
    ) -> Self {
        Self::build(OperationKind::Withdrawal, Some(actor), Some(amount), description, Some(account))
    }

    pub fn transfer_out(
        actor: &User,
        amount: Decimal,
        description: impl Into<String>,
        source: &Account,
    ) -> Self {
        Self::build(OperationKind::TransferOut, Some(actor), Some(amount), description, Some(source))
    }

    pub fn transfer_in(
        actor: &User,
        amount: Decimal,
        description: impl Into<String>,
        destination: &Account,
    ) -> Self {
        Self::build(OperationKind::TransferIn, Some(actor), Some(amount), description, Some(destination))
    }

    pub fn interest(
        actor: &User,
        amount: Decimal,
        description: impl Into<String>,
        account: &Account,
    ) -> Self {
        Self::build(OperationKind::Interest, Some(actor), Some(amount), description, Some(account))
    }

    /// Login attempt; the actor is absent when the user name did not resolve
    pub fn log_in(actor: Option<&User>, description: impl Into<String>) -> Self {
        Self::build(OperationKind::LogIn, actor, None, description, None)
    }

    pub fn log_out(actor: &User, description: impl Into<String>) -> Self {
        Self::build(OperationKind::LogOut, Some(actor), None, description, None)
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn actor(&self) -> Option<&User> {
        self.actor.as_ref()
    }

    pub fn amount(&self) -> Option<Decimal> {
        self.amount
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn account_id(&self) -> Option<AccountId> {
        self.account.as_ref().map(|a| a.id)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
