//! Teller Core - account operations, authorization, audit and interest
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Account, Operation, AuditEntry, etc.)
//! - **ports**: Trait definitions for external dependencies (AccountStore)
//! - **services**: Business logic orchestration
//! - **adapters**: Concrete implementations (DuckDB, in-memory)

pub mod domain;
pub mod ports;
pub mod services;
pub mod adapters;
pub mod config;
pub mod migrations;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::duckdb::DuckDbStore;
use config::Config;
use ports::AccountStore;
use services::*;

// Re-export commonly used types at crate root
pub use domain::{
    Account, AccountId, AuditEntry, Credential, Disposition, Operation, OperationKind, Role,
    Session, User, UserId,
};
pub use domain::result::Error;
pub use services::{AccrualReport, InterestSettings};

/// Main context for Teller operations
///
/// This is the primary entry point for all business logic. It holds
/// the store, configuration, and all services wired to share them.
pub struct BankContext {
    pub config: Config,
    pub store: Arc<DuckDbStore>,
    pub history: Arc<BankHistory>,
    pub auth: Arc<AuthenticationManager>,
    pub accounts: Arc<AccountManager>,
    pub interest: InterestOperator,
}

impl BankContext {
    /// Open the bank in `bank_dir`, creating the database on first use
    pub fn new(bank_dir: &Path) -> Result<Self> {
        let config = Config::load(bank_dir)?;
        let db_path = bank_dir.join(&config.database_filename);

        let store = Arc::new(DuckDbStore::new(&db_path)?);

        // Initialize schema
        store
            .ensure_schema()
            .with_context(|| format!("Failed to initialize {}", db_path.display()))?;

        Self::with_store(config, store)
    }

    /// Wire every service over an already-open store
    pub fn with_store(config: Config, store: Arc<DuckDbStore>) -> Result<Self> {
        let port: Arc<dyn AccountStore> = store.clone();
        let params = config.hashing.params()?;

        let history = Arc::new(BankHistory::new(Arc::clone(&port)));
        let auth = Arc::new(AuthenticationManager::with_params(
            Arc::clone(&port),
            Arc::clone(&history),
            params,
        ));
        let accounts = Arc::new(AccountManager::new(
            Arc::clone(&port),
            Arc::clone(&auth),
            Arc::clone(&history),
        ));
        let interest = InterestOperator::new(
            port,
            Arc::clone(&accounts),
            Arc::clone(&history),
            config.interest.clone(),
        );

        Ok(Self {
            config,
            store,
            history,
            auth,
            accounts,
            interest,
        })
    }

    /// Create a user and give them a password
    pub fn enroll(&self, name: &str, role: Role, secret: &str) -> Result<User> {
        if secret.is_empty() {
            return Err(Error::invalid_argument("Password must not be empty").into());
        }
        let user = self.store.add_user(name, role)?;
        let credential = self.auth.issue_credential(&user, secret)?;
        self.store.set_credential(&credential)?;
        Ok(user)
    }
}
