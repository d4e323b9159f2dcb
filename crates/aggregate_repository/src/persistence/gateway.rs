//! Persistence gateway over one SQLite connection.
//!
//! # Responsibility
//! - Own the connection and open one transaction scope per unit of work.
//! - Run blocking SQLite work off the async executor.
//!
//! # Invariants
//! - A unit of work sees exactly one transaction; it commits only when the
//!   unit returns `Ok`, otherwise every effect is rolled back.
//! - Read-only scopes never commit.
//! - Units are serialized on the connection lock; the gateway adds no
//!   timeout or cancellation of its own.

use crate::config::GatewayConfig;
use crate::db::{open_connection, DbResult, Migration};
use crate::error::{RepoError, RepoResult};
use crate::persistence::session::Session;
use log::{debug, warn};
use parking_lot::Mutex;
use rusqlite::{Connection, TransactionBehavior};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Distinguishes gateways so transactions cannot cross between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GatewayId(Uuid);

impl Display for GatewayId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeMode {
    ReadWrite,
    ReadOnly,
}

impl ScopeMode {
    fn label(self) -> &'static str {
        match self {
            Self::ReadWrite => "read_write",
            Self::ReadOnly => "read_only",
        }
    }
}

/// Cheaply cloneable handle to one SQLite database.
#[derive(Clone)]
pub struct SqliteGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    id: GatewayId,
    persistence_unit: String,
    conn: Mutex<Connection>,
}

impl SqliteGateway {
    /// Opens the configured database and applies `migrations`.
    pub fn open(config: &GatewayConfig, migrations: &[Migration]) -> DbResult<Self> {
        let conn = open_connection(config, migrations)?;
        Ok(Self {
            inner: Arc::new(GatewayInner {
                id: GatewayId(Uuid::new_v4()),
                persistence_unit: config.persistence_unit.clone(),
                conn: Mutex::new(conn),
            }),
        })
    }

    pub fn id(&self) -> GatewayId {
        self.inner.id
    }

    pub fn persistence_unit(&self) -> &str {
        &self.inner.persistence_unit
    }

    /// Runs `unit` inside one read-write transaction.
    pub async fn run_in_transaction<T, F>(&self, unit: F) -> RepoResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session<'_>) -> RepoResult<T> + Send + 'static,
    {
        self.run(ScopeMode::ReadWrite, unit).await
    }

    /// Runs `unit` inside a read scope that refuses writes.
    pub async fn run_read_only<T, F>(&self, unit: F) -> RepoResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session<'_>) -> RepoResult<T> + Send + 'static,
    {
        self.run(ScopeMode::ReadOnly, unit).await
    }

    async fn run<T, F>(&self, mode: ScopeMode, unit: F) -> RepoResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session<'_>) -> RepoResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        match tokio::task::spawn_blocking(move || inner.execute(mode, unit)).await {
            Ok(outcome) => outcome,
            Err(err) => Err(RepoError::Execution(err.to_string())),
        }
    }
}

impl GatewayInner {
    fn execute<T>(
        &self,
        mode: ScopeMode,
        unit: impl FnOnce(&mut Session<'_>) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let started_at = Instant::now();
        let mut conn = self.conn.lock();
        let behavior = match mode {
            ScopeMode::ReadWrite => TransactionBehavior::Immediate,
            ScopeMode::ReadOnly => TransactionBehavior::Deferred,
        };
        let tx = conn
            .transaction_with_behavior(behavior)
            .map_err(RepoError::persistence("begin"))?;

        let outcome = {
            let mut session = Session::new(&tx, mode == ScopeMode::ReadOnly);
            unit(&mut session)
        };

        match (mode, outcome) {
            (ScopeMode::ReadWrite, Ok(value)) => {
                tx.commit().map_err(RepoError::persistence("commit"))?;
                debug!(
                    "event=tx_scope module=gateway status=ok unit={} mode={} duration_ms={}",
                    self.persistence_unit,
                    mode.label(),
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            (ScopeMode::ReadOnly, Ok(value)) => {
                tx.rollback().map_err(RepoError::persistence("rollback"))?;
                Ok(value)
            }
            (_, Err(err)) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(
                        "event=tx_scope module=gateway status=error unit={} error_code=rollback_failed error={}",
                        self.persistence_unit, rollback_err
                    );
                }
                debug!(
                    "event=tx_scope module=gateway status=rolled_back unit={} mode={} duration_ms={} error={}",
                    self.persistence_unit,
                    mode.label(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}
