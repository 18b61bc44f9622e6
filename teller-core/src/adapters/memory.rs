//! In-memory account store
//!
//! Keeps everything in process. Used by tests and throwaway runs; the
//! switches let tests simulate a store that faults or declines writes.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use rust_decimal::Decimal;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, AccountId, AuditEntry, Credential, Role, User, UserId};
use crate::ports::AccountStore;

#[derive(Default)]
struct State {
    users: BTreeMap<UserId, User>,
    credentials: HashMap<UserId, Credential>,
    accounts: BTreeMap<AccountId, Account>,
    audit: Vec<AuditEntry>,
}

/// Store backed by process memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    /// Every call fails with a storage fault
    fail_lookups: AtomicBool,
    /// `update_account` fails with a storage fault
    fail_updates: AtomicBool,
    /// `update_account` returns Ok(false)
    reject_updates: AtomicBool,
    /// Account ids whose updates return Ok(false)
    rejected_accounts: Mutex<Vec<AccountId>>,
    /// `append_audit` fails with a storage fault
    fail_audit: AtomicBool,
    update_calls: AtomicUsize,
    updated_ids: Mutex<Vec<AccountId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| Error::storage(format!("memory store poisoned: {}", e)))
    }

    fn check_lookup(&self) -> Result<()> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(Error::storage("simulated lookup fault"));
        }
        Ok(())
    }

    // === Provisioning ===

    /// Insert or replace a user
    pub fn put_user(&self, user: User) -> Result<()> {
        self.state()?.users.insert(user.id, user);
        Ok(())
    }

    /// Create a user with the next free id
    pub fn add_user(&self, name: &str, role: Role) -> Result<User> {
        let mut state = self.state()?;
        let id = state.users.keys().next_back().map_or(1, |last| last + 1);
        let user = User::new(id, name, role);
        state.users.insert(id, user.clone());
        Ok(user)
    }

    pub fn set_credential(&self, credential: Credential) -> Result<()> {
        self.state()?.credentials.insert(credential.user_id, credential);
        Ok(())
    }

    /// Insert or replace an account
    pub fn put_account(&self, account: Account) -> Result<()> {
        self.state()?.accounts.insert(account.id, account);
        Ok(())
    }

    /// Create an account with the next free id
    pub fn open_account(&self, owner_id: Option<UserId>, balance: Decimal) -> Result<Account> {
        let mut state = self.state()?;
        let id = state.accounts.keys().next_back().map_or(1, |last| last + 1);
        let account = Account::new(id, balance, owner_id);
        state.accounts.insert(id, account.clone());
        Ok(account)
    }

    // === Fault injection ===

    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn set_reject_updates(&self, reject: bool) {
        self.reject_updates.store(reject, Ordering::SeqCst);
    }

    /// Decline updates for one account only
    pub fn reject_updates_for(&self, id: AccountId) {
        if let Ok(mut ids) = self.rejected_accounts.lock() {
            ids.push(id);
        }
    }

    pub fn set_fail_audit(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    // === Inspection ===

    /// Number of `update_account` calls received
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Account ids passed to `update_account`, in call order
    pub fn updated_ids(&self) -> Vec<AccountId> {
        self.updated_ids
            .lock()
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// Every audit entry, oldest first
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state().map(|s| s.audit.clone()).unwrap_or_default()
    }

    /// Current balance of an account, bypassing fault switches
    pub fn balance_of(&self, id: AccountId) -> Option<Decimal> {
        self.state()
            .ok()
            .and_then(|s| s.accounts.get(&id).map(|a| a.balance))
    }
}

impl AccountStore for MemoryStore {
    fn find_account(&self, id: AccountId) -> Result<Option<Account>> {
        self.check_lookup()?;
        Ok(self.state()?.accounts.get(&id).cloned())
    }

    fn update_account(&self, account: &Account) -> Result<bool> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut ids) = self.updated_ids.lock() {
            ids.push(account.id);
        }

        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Error::storage("simulated update fault"));
        }
        let rejected = self
            .rejected_accounts
            .lock()
            .map(|ids| ids.contains(&account.id))
            .unwrap_or(false);
        if rejected || self.reject_updates.load(Ordering::SeqCst) {
            return Ok(false);
        }

        let mut state = self.state()?;
        match state.accounts.get_mut(&account.id) {
            Some(stored) => {
                stored.balance = account.balance;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        self.check_lookup()?;
        Ok(self.state()?.accounts.values().cloned().collect())
    }

    fn find_user_by_name(&self, name: &str) -> Result<Option<User>> {
        self.check_lookup()?;
        Ok(self
            .state()?
            .users
            .values()
            .find(|u| u.name == name)
            .cloned())
    }

    fn find_credential(&self, user: &User) -> Result<Option<Credential>> {
        self.check_lookup()?;
        Ok(self.state()?.credentials.get(&user.id).cloned())
    }

    fn append_audit(&self, entry: &AuditEntry) -> Result<()> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(Error::storage("simulated audit fault"));
        }
        let mut state = self.state()?;
        let mut entry = entry.clone();
        if let Some(last) = state.audit.last() {
            entry.id = entry.id.max(last.id.saturating_add(1));
        }
        state.audit.push(entry);
        Ok(())
    }

    fn audit_trail(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        self.check_lookup()?;
        Ok(self
            .state()?
            .audit
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    fn denial_trail(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        self.check_lookup()?;
        Ok(self
            .state()?
            .audit
            .iter()
            .rev()
            .filter(|e| e.is_denial())
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Operation;

    #[test]
    fn test_ids_are_sequential() {
        let store = MemoryStore::new();
        let a = store.add_user("alice", Role::User).unwrap();
        let b = store.add_user("bob", Role::User).unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        let first = store.open_account(Some(a.id), Decimal::ZERO).unwrap();
        let second = store.open_account(Some(b.id), Decimal::ZERO).unwrap();
        assert_eq!((first.id, second.id), (1, 2));
    }

    #[test]
    fn test_update_switches() {
        let store = MemoryStore::new();
        let mut account = store.open_account(None, Decimal::new(10, 0)).unwrap();
        account.balance = Decimal::new(20, 0);

        store.set_reject_updates(true);
        assert!(!store.update_account(&account).unwrap());
        assert_eq!(store.balance_of(account.id), Some(Decimal::new(10, 0)));

        store.set_reject_updates(false);
        store.set_fail_updates(true);
        assert!(store.update_account(&account).is_err());

        store.set_fail_updates(false);
        assert!(store.update_account(&account).unwrap());
        assert_eq!(store.balance_of(account.id), Some(Decimal::new(20, 0)));
        assert_eq!(store.update_calls(), 3);
    }

    #[test]
    fn test_audit_ids_stay_unique_and_ordered() {
        let store = MemoryStore::new();
        let user = User::new(1, "alice", Role::User);
        let entry = AuditEntry::from_operation(500, &Operation::log_out(&user, "Logged out"), true);

        store.append_audit(&entry).unwrap();
        store.append_audit(&entry).unwrap();
        store.append_audit(&AuditEntry { id: 7, ..entry.clone() }).unwrap();

        let ids: Vec<u64> = store.audit_entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![500, 501, 502]);
    }

    #[test]
    fn test_lookup_fault() {
        let store = MemoryStore::new();
        store.set_fail_lookups(true);
        assert!(store.find_account(1).is_err());
        assert!(store.find_user_by_name("alice").is_err());
    }
}
