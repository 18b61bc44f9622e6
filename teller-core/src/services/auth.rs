//! Authentication manager - login, logout and operation authorization
//!
//! Passwords are digested with Argon2id into PHC strings. Unknown user and
//! wrong password surface as the same error; the audit trail records which
//! one happened.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{Credential, Operation, User};
use crate::ports::AccountStore;
use crate::services::BankHistory;

/// Salt length for newly issued credentials
const SALT_LEN: usize = 16;

/// Authenticates users and decides who may move money out of an account
pub struct AuthenticationManager {
    store: Arc<dyn AccountStore>,
    history: Arc<BankHistory>,
    params: Params,
}

impl AuthenticationManager {
    pub fn new(store: Arc<dyn AccountStore>, history: Arc<BankHistory>) -> Self {
        Self::with_params(store, history, Params::default())
    }

    /// Use custom Argon2 cost parameters for newly issued credentials.
    ///
    /// Verification always uses the parameters stored in the digest.
    pub fn with_params(store: Arc<dyn AccountStore>, history: Arc<BankHistory>, params: Params) -> Self {
        Self { store, history, params }
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Resolve `username` and check `secret` against the stored credential
    pub fn login(&self, username: &str, secret: &str) -> Result<User> {
        let Some(user) = self.store.find_user_by_name(username)? else {
            warn!(username, "login for unknown user");
            self.history
                .record_login_failure(None, &format!("Unknown user '{}'", username))?;
            return Err(Error::UnknownIdentityOrCredential);
        };

        let credential = self.store.find_credential(&user)?;
        let verified = match &credential {
            Some(credential) => self.verify(secret, credential),
            None => {
                debug!(user_id = user.id, "no stored credential");
                false
            }
        };

        if !verified {
            warn!(user_id = user.id, "login rejected");
            self.history.record_login_failure(Some(&user), "Login failed")?;
            return Err(Error::UnknownIdentityOrCredential);
        }

        self.history.record_login_success(&user)?;
        info!(user_id = user.id, "logged in");
        Ok(user)
    }

    /// Always succeeds once the logout is on record
    pub fn logout(&self, user: &User) -> Result<bool> {
        self.history.record_logout(user)?;
        info!(user_id = user.id, "logged out");
        Ok(true)
    }

    /// Admins may run anything. Other users may only move money out of
    /// accounts they own; every non-withdrawal kind is allowed.
    pub fn can_invoke_operation(&self, operation: &Operation, actor: &User) -> bool {
        if actor.is_admin() {
            return true;
        }
        if !operation.kind().is_withdrawal() {
            return true;
        }
        operation
            .account()
            .is_some_and(|account| account.is_owned_by(actor))
    }

    /// Digest `secret` with the given salt.
    ///
    /// The same secret and salt always produce the same digest.
    pub fn hash_password(&self, secret: &str, salt: &[u8]) -> Result<String> {
        let salt = SaltString::encode_b64(salt)
            .map_err(|e| Error::invalid_argument(format!("Invalid salt: {}", e)))?;
        let digest = self
            .hasher()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| Error::invalid_argument(format!("Failed to hash password: {}", e)))?;
        Ok(digest.to_string())
    }

    /// Build a credential for `user` with a fresh random salt
    pub fn issue_credential(&self, user: &User, secret: &str) -> Result<Credential> {
        let salt: [u8; SALT_LEN] = rand::thread_rng().gen();
        let digest = self.hash_password(secret, &salt)?;
        Ok(Credential::new(user.id, digest))
    }

    fn verify(&self, secret: &str, credential: &Credential) -> bool {
        match PasswordHash::new(&credential.digest) {
            Ok(stored) => self
                .hasher()
                .verify_password(secret.as_bytes(), &stored)
                .is_ok(),
            Err(e) => {
                warn!(user_id = credential.user_id, error = %e, "stored digest is malformed");
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::domain::{Account, OperationKind, Role};
    use rust_decimal::Decimal;

    /// Cheap Argon2 costs so tests stay fast
    pub(crate) fn test_params() -> Params {
        Params::new(1024, 1, 1, None).unwrap()
    }

    fn setup() -> (Arc<MemoryStore>, AuthenticationManager) {
        let store = Arc::new(MemoryStore::new());
        let history = Arc::new(BankHistory::new(store.clone()));
        let auth = AuthenticationManager::with_params(store.clone(), history, test_params());
        (store, auth)
    }

    fn enroll(store: &MemoryStore, auth: &AuthenticationManager, name: &str, role: Role, secret: &str) -> User {
        let user = store.add_user(name, role).unwrap();
        store.set_credential(auth.issue_credential(&user, secret).unwrap()).unwrap();
        user
    }

    #[test]
    fn test_hash_password_is_deterministic() {
        let (_store, auth) = setup();
        let salt = [7u8; SALT_LEN];

        let first = auth.hash_password("hunter2", &salt).unwrap();
        let second = auth.hash_password("hunter2", &salt).unwrap();
        let other = auth.hash_password("hunter3", &salt).unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert!(first.starts_with("$argon2id$"));
    }

    #[test]
    fn test_issued_credentials_use_fresh_salts() {
        let (_store, auth) = setup();
        let user = User::new(1, "alice", Role::User);

        let a = auth.issue_credential(&user, "secret").unwrap();
        let b = auth.issue_credential(&user, "secret").unwrap();
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn test_login_success() {
        let (store, auth) = setup();
        let alice = enroll(&store, &auth, "alice", Role::User, "secret");

        let user = auth.login("alice", "secret").unwrap();
        assert_eq!(user, alice);

        let entries = store.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, OperationKind::LogIn);
        assert!(entries[0].success);
    }

    #[test]
    fn test_login_wrong_password_logs_resolved_user() {
        let (store, auth) = setup();
        let alice = enroll(&store, &auth, "alice", Role::User, "secret");

        let result = auth.login("alice", "wrong");
        assert!(matches!(result, Err(Error::UnknownIdentityOrCredential)));

        let entries = store.audit_entries();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].success);
        assert_eq!(entries[0].actor_id, Some(alice.id));
    }

    #[test]
    fn test_login_unknown_user_logs_null_actor() {
        let (store, auth) = setup();

        let result = auth.login("mallory", "whatever");
        assert!(matches!(result, Err(Error::UnknownIdentityOrCredential)));

        let entries = store.audit_entries();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].success);
        assert_eq!(entries[0].actor_id, None);
        assert!(entries[0].description.contains("mallory"));
    }

    #[test]
    fn test_login_without_credential_fails_like_bad_password() {
        let (store, auth) = setup();
        let bob = store.add_user("bob", Role::User).unwrap();

        let result = auth.login("bob", "anything");
        assert!(matches!(result, Err(Error::UnknownIdentityOrCredential)));
        assert_eq!(store.audit_entries()[0].actor_id, Some(bob.id));
    }

    #[test]
    fn test_login_with_malformed_digest_is_rejected() {
        let (store, auth) = setup();
        let carol = store.add_user("carol", Role::User).unwrap();
        store.set_credential(Credential::new(carol.id, "not-a-phc-string")).unwrap();

        assert!(matches!(
            auth.login("carol", "secret"),
            Err(Error::UnknownIdentityOrCredential)
        ));
    }

    #[test]
    fn test_login_lookup_fault_propagates_without_audit() {
        let (store, auth) = setup();
        store.set_fail_lookups(true);

        assert!(matches!(auth.login("alice", "secret"), Err(Error::Storage(_))));
        assert!(store.audit_entries().is_empty());
    }

    #[test]
    fn test_logout_always_true() {
        let (store, auth) = setup();
        let user = User::new(1, "alice", Role::User);

        assert!(auth.logout(&user).unwrap());
        assert_eq!(store.audit_entries()[0].kind, OperationKind::LogOut);
    }

    #[test]
    fn test_can_invoke_operation() {
        let (_store, auth) = setup();
        let owner = User::new(1, "owner", Role::User);
        let other = User::new(2, "other", Role::User);
        let admin = User::new(3, "admin", Role::Admin);
        let account = Account::new(10, Decimal::new(1000, 0), Some(owner.id));
        let orphan = Account::new(11, Decimal::new(1000, 0), None);
        let amount = Decimal::new(100, 0);

        let withdrawal = Operation::withdrawal(&other, amount, "Withdraw", &account);
        assert!(!auth.can_invoke_operation(&withdrawal, &other));
        assert!(auth.can_invoke_operation(&withdrawal, &owner));
        assert!(auth.can_invoke_operation(&withdrawal, &admin));

        let leg = Operation::transfer_out(&other, amount, "Transfer", &account);
        assert!(!auth.can_invoke_operation(&leg, &other));
        assert!(auth.can_invoke_operation(&leg, &owner));

        let unowned = Operation::withdrawal(&owner, amount, "Withdraw", &orphan);
        assert!(!auth.can_invoke_operation(&unowned, &owner));
        assert!(auth.can_invoke_operation(&unowned, &admin));

        let deposit = Operation::deposit(&other, amount, "Deposit", Some(&account));
        assert!(auth.can_invoke_operation(&deposit, &other));

        let incoming = Operation::transfer_in(&other, amount, "Transfer", &account);
        assert!(auth.can_invoke_operation(&incoming, &other));

        let interest = Operation::interest(&other, amount, "Interest", &account);
        assert!(auth.can_invoke_operation(&interest, &other));
        assert!(auth.can_invoke_operation(&Operation::log_out(&other, "bye"), &other));
    }
}
