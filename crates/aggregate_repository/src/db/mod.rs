//! SQLite bootstrap for the persistence gateway.
//!
//! # Responsibility
//! - Open and tune the single connection owned by a gateway.
//! - Apply the application's schema migrations before first use.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - No repository touches the connection before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use migrations::{apply_migrations, latest_version, Migration};
pub use open::open_connection;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    InvalidMigrationOrder {
        previous: u32,
        next: u32,
    },
}

impl DbError {
    /// Whether the underlying SQLite failure is a constraint violation
    /// (unique, not-null, foreign key, check).
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::InvalidMigrationOrder { previous, next } => write!(
                f,
                "migration versions must increase strictly, got {next} after {previous}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::InvalidMigrationOrder { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
