//! Bank schema migrations
//!
//! SQL files are embedded with include_str! and applied in name order by
//! `MigrationService`. Each applied name is recorded in sys_migrations.

/// (filename, sql) pairs. New files use the next NNN_ prefix and are
/// appended here.
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
    ("002_audit_log.sql", include_str!("002_audit_log.sql")),
];
