//! Migration service - bank schema migrations
//!
//! Applies the embedded SQL files in order. Each file and its sys_migrations
//! record commit together, so a failed migration leaves no trace and is
//! retried on the next open.

use std::collections::HashSet;

use duckdb::Connection;
use tracing::{debug, warn};

use crate::domain::result::{Error, Result};
use crate::migrations::MIGRATIONS;

/// Created by the first migration; lists every applied migration
const BOOKKEEPING_TABLE: &str = "sys_migrations";

/// Result of running migrations
#[derive(Debug)]
pub struct MigrationResult {
    /// Names of newly applied migrations
    pub applied: Vec<String>,
    /// Count of migrations that were already applied
    pub already_applied: usize,
}

/// Runs schema migrations over a borrowed connection
pub struct MigrationService<'a> {
    conn: &'a Connection,
}

impl<'a> MigrationService<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Apply every migration not yet recorded, in name order.
    ///
    /// The bootstrap file creates sys_migrations itself, so on a fresh
    /// database it is applied before anything is looked up.
    pub fn run_pending(&self) -> Result<MigrationResult> {
        let fresh = !self.has_migrations_table()?;
        let recorded: HashSet<String> = if fresh {
            HashSet::new()
        } else {
            self.get_applied()?.into_iter().collect()
        };

        let mut applied = Vec::new();
        for (name, sql) in MIGRATIONS.iter() {
            if recorded.contains(*name) {
                continue;
            }
            self.apply(name, sql)?;
            applied.push(name.to_string());
        }

        Ok(MigrationResult {
            applied,
            already_applied: recorded.len(),
        })
    }

    /// Run one migration and record it in a single transaction
    fn apply(&self, name: &str, sql: &str) -> Result<()> {
        debug!(migration = name, "applying migration");
        self.conn.execute_batch("BEGIN TRANSACTION")?;

        let outcome = self.conn.execute_batch(sql).and_then(|_| {
            self.conn
                .execute("INSERT INTO sys_migrations (migration_name) VALUES (?)", [name])
                .map(|_| ())
        });

        match outcome {
            Ok(()) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    warn!(migration = name, error = %rollback, "rollback failed");
                }
                Err(Error::storage(format!("migration {} failed: {}", name, e)))
            }
        }
    }

    fn has_migrations_table(&self) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            [BOOKKEEPING_TABLE],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Names of applied migrations, sorted
    pub fn get_applied(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT migration_name FROM sys_migrations ORDER BY migration_name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Names of migrations still to apply
    pub fn get_pending(&self) -> Result<Vec<String>> {
        let recorded: HashSet<String> = if self.has_migrations_table()? {
            self.get_applied()?.into_iter().collect()
        } else {
            HashSet::new()
        };
        Ok(MIGRATIONS
            .iter()
            .map(|(name, _)| name.to_string())
            .filter(|name| !recorded.contains(name))
            .collect())
    }
}
