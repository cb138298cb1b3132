//! SQLite store utilities.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so readers keep working while a writer commits
//! - `busy_timeout` (5s unless configured) so concurrent writers queue on
//!   the write lock instead of failing immediately
//! - `foreign_keys = ON` so every relation row references a live row

pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Duration;

use crate::config::StoreConfig;

/// Busy timeout used when no configuration overrides it.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the catalog database, apply runtime pragmas, and
/// migrate the schema to the latest version.
///
/// # Errors
///
/// Returns an error if opening/configuring/migrating the database fails.
pub fn open_store(config: &StoreConfig) -> Result<Connection> {
    let path = config.database_path.as_path();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create database directory {}", parent.display()))?;
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open database {}", path.display()))?;

    configure_connection(&conn, config.busy_timeout()).context("configure sqlite pragmas")?;
    let version = migrations::migrate(&mut conn).context("apply schema migrations")?;
    tracing::debug!(path = %path.display(), schema_version = version, "store opened");

    Ok(conn)
}

/// Open a private in-memory store with the full schema applied.
///
/// # Errors
///
/// Returns an error if configuring or migrating the database fails.
pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("open in-memory database")?;
    configure_connection(&conn, DEFAULT_BUSY_TIMEOUT).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply schema migrations")?;
    Ok(conn)
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

/// Start a write transaction that takes the write lock up front.
///
/// The returned transaction rolls back when dropped without a commit.
pub(crate) fn begin_write(conn: &Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

/// Start a read transaction so multi-query reads see one snapshot.
pub(crate) fn begin_read(conn: &Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Deferred)
}

/// Wall-clock microseconds for the audit columns.
pub(crate) fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}
