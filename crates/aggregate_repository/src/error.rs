//! Error type shared by repositories, sessions and transactions.

use crate::db::DbError;
use crate::domain::transaction::OperationKind;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Failure of a repository call or a transaction commit.
///
/// Absence is never an error: lookups return `Option` or an empty `Vec`.
#[derive(Debug)]
pub enum RepoError {
    /// Caller misuse detected before any storage access or log mutation.
    InvalidArgument(String),
    /// Store-level failure; the SQLite error is kept as the cause.
    Persistence {
        operation: &'static str,
        source: DbError,
    },
    /// A replayed operation failed and the whole commit was rolled back.
    CommitFailed {
        /// Zero-based position of the failing operation in the log.
        index: usize,
        kind: OperationKind,
        repository: &'static str,
        source: Box<RepoError>,
    },
    /// The transaction handle already had its single commit attempt.
    TransactionClosed,
    /// A persisted row could not be mapped back to an aggregate.
    InvalidData(String),
    /// The blocking database task did not run to completion.
    Execution(String),
}

impl RepoError {
    /// Builds a mapper tagging SQLite failures with the gateway operation.
    pub fn persistence(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |err| Self::Persistence {
            operation,
            source: DbError::Sqlite(err),
        }
    }

    /// Whether the root cause is a SQLite constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Self::Persistence { source, .. } => source.is_constraint_violation(),
            Self::CommitFailed { source, .. } => source.is_constraint_violation(),
            _ => false,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::Persistence { operation, source } => {
                write!(f, "persistence failure during {operation}: {source}")
            }
            Self::CommitFailed {
                index,
                kind,
                repository,
                source,
            } => write!(
                f,
                "transaction rolled back: operation #{index} ({kind} on {repository}) failed: {source}"
            ),
            Self::TransactionClosed => write!(f, "transaction was already committed"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Execution(message) => write!(f, "database task failed: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence { source, .. } => Some(source),
            Self::CommitFailed { source, .. } => Some(source.as_ref()),
            Self::InvalidArgument(_) => None,
            Self::TransactionClosed => None,
            Self::InvalidData(_) => None,
            Self::Execution(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Persistence {
            operation: "bootstrap",
            source: value,
        }
    }
}

/// Column read failures inside `Entity::from_row` become `InvalidData`.
impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::InvalidColumnName(_)
            | rusqlite::Error::InvalidColumnIndex(_)
            | rusqlite::Error::IntegralValueOutOfRange(..) => Self::InvalidData(value.to_string()),
            other => Self::Persistence {
                operation: "sqlite",
                source: DbError::Sqlite(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RepoError;
    use crate::domain::transaction::OperationKind;
    use rusqlite::Connection;
    use std::error::Error;

    fn unique_violation() -> rusqlite::Error {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY); INSERT INTO t VALUES ('a');")
            .unwrap();
        conn.execute("INSERT INTO t VALUES ('a');", []).unwrap_err()
    }

    #[test]
    fn commit_failure_keeps_constraint_cause() {
        let cause = RepoError::persistence("insert")(unique_violation());
        let err = RepoError::CommitFailed {
            index: 1,
            kind: OperationKind::Create,
            repository: "orders",
            source: Box::new(cause),
        };

        assert!(err.is_constraint_violation());
        let message = err.to_string();
        assert!(message.contains("operation #1"));
        assert!(message.contains("create on orders"));

        let persistence = err.source().unwrap();
        assert!(persistence.to_string().contains("during insert"));
        assert!(persistence.source().is_some());
    }

    #[test]
    fn column_read_failures_become_invalid_data() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn
            .query_row("SELECT 'not a number';", [], |row| row.get::<_, i64>(0))
            .unwrap_err();

        assert!(matches!(RepoError::from(err), RepoError::InvalidData(_)));
        assert!(matches!(
            RepoError::from(unique_violation()),
            RepoError::Persistence { operation: "sqlite", .. }
        ));
    }

    #[test]
    fn usage_errors_are_not_constraint_violations() {
        assert!(!RepoError::TransactionClosed.is_constraint_violation());
        assert!(!RepoError::InvalidArgument("offset".into()).is_constraint_violation());
    }
}
