//! Versioned provisioning of the PeopleDB schema.
//!
//! # Responsibility
//! - Bring a connection from any older `user_version` up to the latest people schema.
//! - Confirm the `people` table exposes every column the person decoder reads by name.
//!
//! # Invariants
//! - Versions start at 1 and grow by one; version 0 is an unprovisioned database.
//! - Pending steps and the `user_version` bump commit together or not at all.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "people",
    sql: include_str!("0001_people.sql"),
}];

/// Columns of `people` that `PersonMapping` reads by name.
pub const PEOPLE_COLUMNS: [&str; 6] = [
    "id",
    "first_name",
    "last_name",
    "dob",
    "salary_cents",
    "email",
];

/// What one `apply_migrations` call changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
    /// Names of the steps applied, oldest first. Empty when already current.
    pub applied: Vec<&'static str>,
}

/// Latest schema version this build provisions.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies pending steps, then checks the people columns.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the database is newer than this build.
/// - `SchemaMismatch` when `people` lacks a column the decoder needs, which
///   happens with hand-edited or foreign databases carrying our version number.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<MigrationReport> {
    let from_version = user_version(conn)?;
    let latest = latest_version();

    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > from_version)
        .collect();

    if !pending.is_empty() {
        let tx = conn.transaction()?;
        for migration in &pending {
            tx.execute_batch(migration.sql)?;
            tx.pragma_update(None, "user_version", migration.version)?;
        }
        tx.commit()?;
    }

    verify_people_columns(conn)?;

    Ok(MigrationReport {
        from_version,
        to_version: latest,
        applied: pending.iter().map(|migration| migration.name).collect(),
    })
}

/// Fails with `SchemaMismatch` listing every decoder column `people` lacks.
pub fn verify_people_columns(conn: &Connection) -> DbResult<()> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('people');")?;
    let present = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let missing: Vec<&'static str> = PEOPLE_COLUMNS
        .iter()
        .copied()
        .filter(|column| !present.iter().any(|name| name == column))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DbError::SchemaMismatch {
            table: "people",
            missing,
        })
    }
}

fn user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
