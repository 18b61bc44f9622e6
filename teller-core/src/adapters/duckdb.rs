//! DuckDB account store implementation

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{
    is_storable, Account, AccountId, AuditEntry, Credential, Disposition, OperationKind, Role,
    User, UserId, MONEY_SCALE,
};
use crate::ports::AccountStore;
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of attempts when the database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// DuckDB-backed store for users, credentials, accounts and the audit trail
pub struct DuckDbStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbStore {
    /// Open (or create) the bank database at `db_path`.
    ///
    /// Busy-file errors are retried with exponential backoff; any other
    /// failure is returned immediately.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    attempt += 1;
                    if !is_retryable_error(&err_msg) || attempt >= MAX_RETRIES {
                        return Err(e.into());
                    }
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt - 1));
                    warn!(
                        delay_ms = delay.as_millis() as u64,
                        attempt,
                        max = MAX_RETRIES,
                        error = %err_msg,
                        "database busy, retrying"
                    );
                    thread::sleep(delay);
                }
            }
        }
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> std::result::Result<Connection, duckdb::Error> {
        // Extension autoloading stays off; nothing here needs extensions.
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::storage(format!("connection lock poisoned: {}", e)))
    }

    /// Run any pending schema migrations
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure the schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        let result = self.run_migrations()?;
        if !result.applied.is_empty() {
            debug!(applied = ?result.applied, "schema migrated");
        }
        Ok(())
    }

    /// Database file path (None for in-memory stores)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    // === Provisioning ===

    /// Create a user with the next free id
    pub fn add_user(&self, name: &str, role: Role) -> Result<User> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_argument("user name cannot be empty"));
        }
        let conn = self.conn()?;
        let id: UserId = conn.query_row("SELECT nextval('seq_user_id')", [], |row| row.get(0))?;
        conn.execute(
            "INSERT INTO users (user_id, name, role) VALUES (?, ?, ?)",
            params![id, name, role.as_str()],
        )?;
        Ok(User::new(id, name, role))
    }

    /// Insert or replace a user's credential
    pub fn set_credential(&self, credential: &Credential) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO credentials (user_id, digest) VALUES (?, ?)
             ON CONFLICT (user_id) DO UPDATE SET digest = EXCLUDED.digest",
            params![credential.user_id, credential.digest],
        )?;
        Ok(())
    }

    /// Open an account with the next free id
    pub fn open_account(&self, owner_id: Option<UserId>, balance: Decimal) -> Result<Account> {
        if balance < Decimal::ZERO {
            return Err(Error::invalid_argument("opening balance cannot be negative"));
        }
        if !is_storable(balance) {
            return Err(Error::invalid_argument(format!(
                "opening balance {} is out of range or has more than {} decimal places",
                balance, MONEY_SCALE
            )));
        }
        let conn = self.conn()?;
        let id: AccountId =
            conn.query_row("SELECT nextval('seq_account_id')", [], |row| row.get(0))?;
        conn.execute(
            "INSERT INTO accounts (account_id, balance, owner_id) VALUES (?, CAST(? AS DECIMAL(18, 4)), ?)",
            params![id, balance.to_string(), owner_id],
        )?;
        Ok(Account::new(id, balance, owner_id))
    }

    /// All users, ascending by id
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT user_id, name, role FROM users ORDER BY user_id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, UserId>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, name, role)| row_to_user(id, name, &role))
            .collect()
    }
}

impl AccountStore for DuckDbStore {
    fn find_account(&self, id: AccountId) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT account_id, balance::VARCHAR, owner_id FROM accounts WHERE account_id = ?",
        )?;
        let mut rows = stmt.query_map([id], |row| {
            Ok((
                row.get::<_, AccountId>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<UserId>>(2)?,
            ))
        })?;

        match rows.next() {
            Some(row) => {
                let (id, balance, owner_id) = row?;
                Ok(Some(Account::new(id, parse_decimal(&balance)?, owner_id)))
            }
            None => Ok(None),
        }
    }

    fn update_account(&self, account: &Account) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE accounts SET balance = CAST(? AS DECIMAL(18, 4)) WHERE account_id = ?",
            params![account.balance.to_string(), account.id],
        )?;
        Ok(changed == 1)
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT account_id, balance::VARCHAR, owner_id FROM accounts ORDER BY account_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, AccountId>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<UserId>>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, balance, owner_id)| Ok(Account::new(id, parse_decimal(&balance)?, owner_id)))
            .collect()
    }

    fn find_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT user_id, name, role FROM users WHERE name = ?")?;
        let mut rows = stmt.query_map([name], |row| {
            Ok((
                row.get::<_, UserId>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        match rows.next() {
            Some(row) => {
                let (id, name, role) = row?;
                Ok(Some(row_to_user(id, name, &role)?))
            }
            None => Ok(None),
        }
    }

    fn find_credential(&self, user: &User) -> Result<Option<Credential>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT user_id, digest FROM credentials WHERE user_id = ?")?;
        let mut rows = stmt.query_map([user.id], |row| {
            Ok(Credential::new(row.get::<_, UserId>(0)?, row.get::<_, String>(1)?))
        })?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn append_audit(&self, entry: &AuditEntry) -> Result<()> {
        // Holding the connection lock keeps the max lookup and the insert together
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO audit_log (
                entry_id, recorded_at, kind, actor_id, actor_name, account_id,
                amount, description, success, disposition, denial_reason
            ) VALUES (
                GREATEST(
                    CAST(? AS UBIGINT),
                    CAST((SELECT COALESCE(MAX(entry_id), 0) FROM audit_log) + 1 AS UBIGINT)
                ),
                ?, ?, ?, ?, ?, CAST(? AS DECIMAL(18, 4)), ?, ?, ?, ?
            )
            "#,
            params![
                entry.id,
                entry.recorded_at.to_rfc3339(),
                entry.kind.as_str(),
                entry.actor_id,
                entry.actor_name,
                entry.account_id,
                entry.amount.map(|a| a.to_string()),
                entry.description,
                entry.success,
                entry.disposition.as_str(),
                entry.denial_reason,
            ],
        )?;
        Ok(())
    }

    fn audit_trail(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        self.query_audit(None, limit)
    }

    fn denial_trail(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        self.query_audit(Some(Disposition::Denied), limit)
    }
}

impl DuckDbStore {
    /// Newest-first audit rows, optionally restricted to one disposition
    fn query_audit(&self, disposition: Option<Disposition>, limit: usize) -> Result<Vec<AuditEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT entry_id, recorded_at, kind, actor_id, actor_name, account_id,
                   amount::VARCHAR, description, success, disposition, denial_reason
            FROM audit_log
            WHERE CAST(? AS VARCHAR) IS NULL OR disposition = CAST(? AS VARCHAR)
            ORDER BY entry_id DESC
            LIMIT ?
            "#,
        )?;

        let filter = disposition.map(|d| d.as_str());
        let rows = stmt
            .query_map(params![filter, filter, limit as i64], |row| {
                Ok(AuditRow {
                    id: row.get(0)?,
                    recorded_at: row.get(1)?,
                    kind: row.get(2)?,
                    actor_id: row.get(3)?,
                    actor_name: row.get(4)?,
                    account_id: row.get(5)?,
                    amount: row.get(6)?,
                    description: row.get(7)?,
                    success: row.get(8)?,
                    disposition: row.get(9)?,
                    denial_reason: row.get(10)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(AuditRow::into_entry).collect()
    }
}

/// Raw audit_log row, converted outside the duckdb row closure
struct AuditRow {
    id: u64,
    recorded_at: String,
    kind: String,
    actor_id: Option<UserId>,
    actor_name: Option<String>,
    account_id: Option<AccountId>,
    amount: Option<String>,
    description: String,
    success: bool,
    disposition: String,
    denial_reason: Option<String>,
}

impl AuditRow {
    fn into_entry(self) -> Result<AuditEntry> {
        let kind = OperationKind::parse(&self.kind)
            .ok_or_else(|| Error::storage(format!("unknown operation kind '{}'", self.kind)))?;
        let disposition = Disposition::parse(&self.disposition).ok_or_else(|| {
            Error::storage(format!("unknown audit disposition '{}'", self.disposition))
        })?;
        let amount = self.amount.as_deref().map(parse_decimal).transpose()?;

        Ok(AuditEntry {
            id: self.id,
            recorded_at: parse_timestamp(&self.recorded_at)?,
            kind,
            actor_id: self.actor_id,
            actor_name: self.actor_name,
            account_id: self.account_id,
            amount,
            description: self.description,
            success: self.success,
            disposition,
            denial_reason: self.denial_reason,
        })
    }
}

// Helper functions

fn row_to_user(id: UserId, name: String, role: &str) -> Result<User> {
    let role: Role = role
        .parse()
        .map_err(|_| Error::storage(format!("user {} has unknown role '{}'", id, role)))?;
    Ok(User::new(id, name, role))
}

/// Parse a DECIMAL read back as VARCHAR, normalized so 1000.0000 prints as 1000
fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str_exact(s.trim())
        .map(|d| d.normalize())
        .map_err(|e| Error::storage(format!("bad decimal '{}': {}", s, e)))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::storage(format!("bad timestamp '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Operation;

    fn store() -> DuckDbStore {
        let store = DuckDbStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        store
    }

    #[test]
    fn test_retryable_errors() {
        assert!(is_retryable_error("IO Error: database is locked"));
        assert!(is_retryable_error(
            "The process cannot access the file because it is being used by another process"
        ));
        assert!(!is_retryable_error("Catalog Error: Table with name users does not exist"));
    }

    #[test]
    fn test_parse_decimal_normalizes_scale() {
        assert_eq!(parse_decimal("1000.0000").unwrap().to_string(), "1000");
        assert_eq!(parse_decimal("12.3400").unwrap(), Decimal::new(1234, 2));
        assert!(parse_decimal("abc").is_err());
    }

    #[test]
    fn test_user_roundtrip() {
        let store = store();
        let alice = store.add_user("alice", Role::User).unwrap();
        let root = store.add_user("root", Role::Admin).unwrap();
        assert_ne!(alice.id, root.id);

        let found = store.find_user_by_name("root").unwrap().unwrap();
        assert_eq!(found, root);
        assert!(store.find_user_by_name("nobody").unwrap().is_none());
        assert_eq!(store.list_users().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_user_name_rejected() {
        let store = store();
        assert!(matches!(
            store.add_user("  ", Role::User),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_credential_upsert() {
        let store = store();
        let user = store.add_user("alice", Role::User).unwrap();

        store.set_credential(&Credential::new(user.id, "first")).unwrap();
        store.set_credential(&Credential::new(user.id, "second")).unwrap();

        let credential = store.find_credential(&user).unwrap().unwrap();
        assert_eq!(credential.digest, "second");
    }

    #[test]
    fn test_account_update_persists_exact_balance() {
        let store = store();
        let mut account = store.open_account(None, Decimal::new(100000, 2)).unwrap();

        account.balance = Decimal::new(110025, 2);
        assert!(store.update_account(&account).unwrap());

        let reloaded = store.find_account(account.id).unwrap().unwrap();
        assert_eq!(reloaded.balance, Decimal::new(110025, 2));
    }

    #[test]
    fn test_opening_balance_must_fit_the_column() {
        let store = store();
        assert!(matches!(
            store.open_account(None, Decimal::new(1, 5)),
            Err(Error::InvalidArgument(_))
        ));
        assert!(store.list_accounts().unwrap().is_empty());
    }

    #[test]
    fn test_audit_entries_with_identical_ids_are_both_kept() {
        let store = store();
        let user = store.add_user("alice", Role::User).unwrap();
        let login = AuditEntry::from_operation(1 << 40, &Operation::log_in(Some(&user), "Logged in"), true);
        let logout = AuditEntry::from_operation(1 << 40, &Operation::log_out(&user, "Logged out"), true);

        store.append_audit(&login).unwrap();
        store.append_audit(&logout).unwrap();

        let trail = store.audit_trail(10).unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].kind, OperationKind::LogOut);
        assert_eq!(trail[1].id, 1 << 40);
        assert_eq!(trail[0].id, (1 << 40) + 1);
    }

    #[test]
    fn test_audit_id_behind_the_trail_is_moved_forward() {
        let store = store();
        let user = store.add_user("alice", Role::User).unwrap();
        let later = AuditEntry::from_operation(5_000, &Operation::log_in(Some(&user), "Logged in"), true);
        let earlier = AuditEntry::from_operation(10, &Operation::log_out(&user, "Logged out"), true);

        store.append_audit(&later).unwrap();
        store.append_audit(&earlier).unwrap();

        let trail = store.audit_trail(10).unwrap();
        assert_eq!(trail[0].id, 5_001);
        assert_eq!(trail[0].kind, OperationKind::LogOut);
    }

    #[test]
    fn test_denial_trail_filters_in_the_store() {
        let store = store();
        let user = store.add_user("alice", Role::User).unwrap();
        let account = Account::new(1, Decimal::ONE_HUNDRED, Some(99));
        let withdrawal = Operation::withdrawal(&user, Decimal::ONE, "Cash", &account);

        store
            .append_audit(&AuditEntry::from_operation(1, &withdrawal, false).denied("not the owner"))
            .unwrap();
        for id in 2..=20 {
            store
                .append_audit(&AuditEntry::from_operation(id, &Operation::log_out(&user, "Logged out"), true))
                .unwrap();
        }

        let denials = store.denial_trail(5).unwrap();
        assert_eq!(denials.len(), 1);
        assert_eq!(denials[0].denial_reason.as_deref(), Some("not the owner"));
        assert_eq!(store.audit_trail(100).unwrap().len(), 20);
    }

    #[test]
    fn test_update_missing_account_reports_false() {
        let store = store();
        let ghost = Account::new(999, Decimal::ONE, None);
        assert!(!store.update_account(&ghost).unwrap());
    }
}
