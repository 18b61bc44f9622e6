//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
pub mod audit;
mod credential;
mod operation;
pub mod result;
mod session;
mod user;

pub use account::{is_storable, max_money, Account, AccountId, MONEY_SCALE};
pub use audit::{AuditEntry, Disposition};
pub use credential::Credential;
pub use operation::{Operation, OperationKind};
pub use session::Session;
pub use user::{Role, User, UserId};
