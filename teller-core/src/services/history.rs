//! Bank history - the append-only audit trail
//!
//! Every attempted operation ends up here exactly once per recorded fact:
//! executed operations with their outcome, authorization denials tagged as
//! such, and login/logout events. Entries are only ever appended.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, AuditEntry, Operation, User};
use crate::ports::AccountStore;

/// Last id handed out in this process
static LAST_ENTRY_ID: AtomicU64 = AtomicU64::new(0);

/// Entry id: millisecond timestamp in the upper bits, low 16 bits free for
/// entries sharing a millisecond. Never repeats or goes backwards within a
/// process, even if the wall clock does; the store resolves clashes with ids
/// written by earlier processes.
fn next_entry_id(timestamp_ms: i64) -> u64 {
    let candidate = (timestamp_ms.max(0) as u64) << 16;
    let previous = LAST_ENTRY_ID
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(candidate.max(last.saturating_add(1)))
        })
        .unwrap_or_else(|last| last);
    candidate.max(previous.saturating_add(1))
}

fn generate_entry_id() -> u64 {
    next_entry_id(Utc::now().timestamp_millis())
}

/// Audit logger over the store's audit capability
pub struct BankHistory {
    store: Arc<dyn AccountStore>,
}

impl BankHistory {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    fn append(&self, entry: AuditEntry) -> Result<()> {
        debug!(
            entry_id = entry.id,
            kind = %entry.kind,
            actor = ?entry.actor_id,
            account = ?entry.account_id,
            success = entry.success,
            disposition = entry.disposition.as_str(),
            "audit"
        );
        self.store.append_audit(&entry)
    }

    /// Record an executed operation and its outcome
    pub fn record(&self, operation: &Operation, success: bool) -> Result<()> {
        self.append(AuditEntry::from_operation(generate_entry_id(), operation, success))
    }

    /// Record an operation refused by authorization.
    ///
    /// Stored with `success = false` and a denial tag, so it never reads as an
    /// ordinary execution failure.
    pub fn record_unauthorized(&self, operation: &Operation, reason: impl Into<String>) -> Result<()> {
        let entry = AuditEntry::from_operation(generate_entry_id(), operation, false).denied(reason);
        self.append(entry)
    }

    pub fn record_login_success(&self, user: &User) -> Result<()> {
        self.record(&Operation::log_in(Some(user), "Logged in"), true)
    }

    /// Record a failed login. `user` is None when the name did not resolve.
    pub fn record_login_failure(&self, user: Option<&User>, reason: &str) -> Result<()> {
        self.record(&Operation::log_in(user, reason), false)
    }

    pub fn record_logout(&self, user: &User) -> Result<()> {
        self.record(&Operation::log_out(user, "Logged out"), true)
    }

    /// Removed entry point. Deposits are recorded through [`BankHistory::record`].
    pub fn record_deposit_legacy(&self, _account: &Account, _amount: Decimal, _success: bool) -> Result<()> {
        Err(Error::unsupported(
            "record_deposit_legacy was removed; record the deposit operation instead",
        ))
    }

    /// Removed entry point. Withdrawals are recorded through [`BankHistory::record`].
    pub fn record_withdrawal_legacy(&self, _account: &Account, _amount: Decimal, _success: bool) -> Result<()> {
        Err(Error::unsupported(
            "record_withdrawal_legacy was removed; record the withdrawal operation instead",
        ))
    }

    /// Most recent entries, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        self.store.audit_trail(limit)
    }

    /// Most recent authorization denials, newest first
    pub fn denials(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        self.store.denial_trail(limit)
    }
}
