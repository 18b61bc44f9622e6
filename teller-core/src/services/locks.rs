//! Per-account exclusive locks
//!
//! Check, mutate and persist of an account balance run while holding that
//! account's lock. Multi-account work takes its locks in ascending id order,
//! so two transfers with swapped endpoints cannot deadlock.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::domain::AccountId;

/// Registry of account ids currently held
#[derive(Default)]
pub struct AccountLocks {
    held: Mutex<HashSet<AccountId>>,
    released: Condvar,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, HashSet<AccountId>> {
        // The set is only touched by insert/remove, so it is consistent even
        // after a panic elsewhere.
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until `id` is free, then hold it
    pub fn lock(&self, id: AccountId) -> AccountGuard<'_> {
        self.acquire(vec![id])
    }

    /// Hold two accounts at once. Equal ids take a single lock.
    pub fn lock_pair(&self, first: AccountId, second: AccountId) -> AccountGuard<'_> {
        self.acquire(vec![first, second])
    }

    fn acquire(&self, mut ids: Vec<AccountId>) -> AccountGuard<'_> {
        ids.sort_unstable();
        ids.dedup();

        let mut held = self.registry();
        for id in &ids {
            while held.contains(id) {
                held = self
                    .released
                    .wait(held)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            held.insert(*id);
        }

        AccountGuard { locks: self, ids }
    }

    /// Whether `id` is held right now
    pub fn is_locked(&self, id: AccountId) -> bool {
        self.registry().contains(&id)
    }
}

/// Releases its accounts on drop
#[must_use = "the accounts are released as soon as the guard is dropped"]
pub struct AccountGuard<'a> {
    locks: &'a AccountLocks,
    ids: Vec<AccountId>,
}

impl AccountGuard<'_> {
    pub fn ids(&self) -> &[AccountId] {
        &self.ids
    }
}

impl Drop for AccountGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.locks.registry();
        for id in &self.ids {
            held.remove(id);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}
