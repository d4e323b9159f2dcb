//! Multi-repository transaction log over a [`SqliteGateway`].
//!
//! # Responsibility
//! - Record create/save/remove requests from any repository sharing the
//!   gateway, without touching storage.
//! - Replay the whole log inside one transaction scope on commit.
//!
//! # Invariants
//! - Operations replay strictly in append order, across repositories.
//! - Any failing operation rolls back every effect of the commit.
//! - One commit attempt per handle; the log is drained before replay, so a
//!   failed commit cannot be retried with the same handle.

use crate::domain::transaction::{OperationKind, Transaction};
use crate::error::{RepoError, RepoResult};
use crate::persistence::entity::Entity;
use crate::persistence::gateway::{GatewayId, SqliteGateway};
use crate::persistence::operation::Operation;
use async_trait::async_trait;
use log::{debug, error, info};
use parking_lot::Mutex;
use std::any::Any;
use std::time::Instant;

enum LogState {
    Open(Vec<Operation>),
    Closed,
}

/// Transaction handle for repositories backed by the same [`SqliteGateway`].
pub struct SqliteTransaction {
    gateway: SqliteGateway,
    log: Mutex<LogState>,
}

impl SqliteTransaction {
    pub fn new(gateway: SqliteGateway) -> Self {
        Self {
            gateway,
            log: Mutex::new(LogState::Open(Vec::new())),
        }
    }

    pub fn gateway_id(&self) -> GatewayId {
        self.gateway.id()
    }

    /// Records inserts; duplicates surface at commit.
    pub fn create<A: Entity>(&self, aggregates: Vec<A>) -> RepoResult<()> {
        self.append(Operation::new(OperationKind::Create, aggregates))
    }

    /// Records upserts.
    pub fn save<A: Entity>(&self, aggregates: Vec<A>) -> RepoResult<()> {
        self.append(Operation::new(OperationKind::Save, aggregates))
    }

    /// Records deletes.
    pub fn remove<A: Entity>(&self, aggregates: Vec<A>) -> RepoResult<()> {
        self.append(Operation::new(OperationKind::Remove, aggregates))
    }

    fn append(&self, operation: Operation) -> RepoResult<()> {
        match &mut *self.log.lock() {
            LogState::Open(log) => {
                debug!(
                    "event=tx_append module=transaction kind={} repository={} aggregates={} position={}",
                    operation.kind(),
                    operation.repository(),
                    operation.len(),
                    log.len()
                );
                log.push(operation);
                Ok(())
            }
            LogState::Closed => Err(RepoError::TransactionClosed),
        }
    }

    fn take_log(&self) -> RepoResult<Vec<Operation>> {
        match std::mem::replace(&mut *self.log.lock(), LogState::Closed) {
            LogState::Open(log) => Ok(log),
            LogState::Closed => Err(RepoError::TransactionClosed),
        }
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn commit(&self) -> RepoResult<()> {
        let log = self.take_log()?;
        let operations = log.len();
        let started_at = Instant::now();
        info!(
            "event=tx_commit module=transaction status=start unit={} operations={}",
            self.gateway.persistence_unit(),
            operations
        );

        let outcome = self
            .gateway
            .run_in_transaction(move |session| {
                for (index, operation) in log.iter().enumerate() {
                    operation.replay(index, session)?;
                }
                Ok(())
            })
            .await;

        match &outcome {
            Ok(()) => info!(
                "event=tx_commit module=transaction status=ok unit={} operations={} duration_ms={}",
                self.gateway.persistence_unit(),
                operations,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=tx_commit module=transaction status=error unit={} operations={} duration_ms={} error={}",
                self.gateway.persistence_unit(),
                operations,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        outcome
    }

    fn is_open(&self) -> bool {
        matches!(*self.log.lock(), LogState::Open(_))
    }

    fn pending(&self) -> usize {
        match &*self.log.lock() {
            LogState::Open(log) => log.len(),
            LogState::Closed => 0,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
