//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on one part of the bank: audit, authentication, money movement,
//! interest.

mod accounts;
mod auth;
mod history;
mod interest;
mod locks;
pub mod migration;

pub use accounts::AccountManager;
pub use auth::AuthenticationManager;
pub use history::BankHistory;
pub use interest::{AccrualReport, InterestOperator, InterestSettings};
pub use locks::{AccountGuard, AccountLocks};
pub use migration::{MigrationResult, MigrationService};
