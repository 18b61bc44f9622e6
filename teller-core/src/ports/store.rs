//! Account store port - persistence abstraction

use crate::domain::result::Result;
use crate::domain::{Account, AccountId, AuditEntry, Credential, User};

/// Persistence capabilities the core consumes.
///
/// Implementations (adapters) own durability. Every method may fail with
/// `Error::Storage`; the core never retries.
pub trait AccountStore: Send + Sync {
    // === Accounts ===

    /// Find an account by id
    fn find_account(&self, id: AccountId) -> Result<Option<Account>>;

    /// Persist the account's current balance.
    ///
    /// Returns `Ok(false)` when the store declined the write (e.g. the row
    /// no longer exists) and `Err` on a storage fault.
    fn update_account(&self, account: &Account) -> Result<bool>;

    /// All accounts, ascending by id
    fn list_accounts(&self) -> Result<Vec<Account>>;

    // === Identity ===

    /// Find a user by display name
    fn find_user_by_name(&self, name: &str) -> Result<Option<User>>;

    /// Stored credential for a user
    fn find_credential(&self, user: &User) -> Result<Option<Credential>>;

    // === Audit ===

    /// Append one audit record.
    ///
    /// The stored id is `entry.id` unless that would not sort after every
    /// existing record, in which case the store uses the next free id.
    fn append_audit(&self, entry: &AuditEntry) -> Result<()>;

    /// Most recent audit records, newest first
    fn audit_trail(&self, limit: usize) -> Result<Vec<AuditEntry>>;

    /// Most recent authorization denials, newest first
    fn denial_trail(&self, limit: usize) -> Result<Vec<AuditEntry>>;
}
