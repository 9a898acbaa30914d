//! Database schema migrations for atelier.
//!
//! Migrations are versioned and applied automatically when opening the
//! database. The `schema_version` table tracks the current migration
//! version.

use rusqlite::{Connection, Result as SqliteResult};

/// Apply all pending migrations to bring the database to the current schema
/// version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

/// Create the schema_version table if it doesn't exist.
fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or(0)
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration v1: Initial schema (baseline).
///
/// The base tables are created by BlockDb::migrate() directly; this marks
/// the database as being at the baseline version.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    set_schema_version(conn, 1)?;
    Ok(())
}

/// Migration v2: time tracking columns.
///
/// Adds to capacity_blocks:
/// - actual_hours: accumulated tracked duration
/// - tracking_started_at: running-timer anchor timestamp
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE capacity_blocks ADD COLUMN actual_hours REAL;
         ALTER TABLE capacity_blocks ADD COLUMN tracking_started_at TEXT;",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()
}

/// Migration v3: reconciliation fields on projects.
///
/// Adds to projects:
/// - days_advanced: calendar days gained, written by reconciliation
/// - confirmed_delivery_date: the committed client-facing date
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE projects ADD COLUMN days_advanced INTEGER NOT NULL DEFAULT 0;
         ALTER TABLE projects ADD COLUMN confirmed_delivery_date TEXT;",
    )?;

    set_schema_version(&tx, 3)?;
    tx.commit()
}
