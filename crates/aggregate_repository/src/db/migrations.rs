//! Migration runner for application-supplied schemas.
//!
//! The repository layer does not own any tables; each application passes the
//! DDL for its aggregates as an ordered list of [`Migration`]s.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

/// One schema step. `version` values must increase strictly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub version: u32,
    pub sql: &'static str,
}

impl Migration {
    pub const fn new(version: u32, sql: &'static str) -> Self {
        Self { version, sql }
    }
}

/// Latest version in `migrations`, `0` when empty.
pub fn latest_version(migrations: &[Migration]) -> u32 {
    migrations.last().map_or(0, |migration| migration.version)
}

/// Applies every migration newer than the database's `user_version` in one
/// transaction.
pub fn apply_migrations(conn: &mut Connection, migrations: &[Migration]) -> DbResult<()> {
    check_order(migrations)?;

    let current_version = current_user_version(conn)?;
    let latest = latest_version(migrations);

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in migrations
        .iter()
        .filter(|migration| migration.version > current_version)
    {
        tx.execute_batch(migration.sql)?;
        tx.pragma_update(None, "user_version", migration.version)?;
    }
    tx.commit()?;

    Ok(())
}

fn check_order(migrations: &[Migration]) -> DbResult<()> {
    let mut previous = 0;
    for migration in migrations {
        if migration.version <= previous {
            return Err(DbError::InvalidMigrationOrder {
                previous,
                next: migration.version,
            });
        }
        previous = migration.version;
    }
    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
