//! Repository contracts for identified aggregates.
//!
//! Every storage-touching method is async and runs in its own transaction
//! scope unless it is one of the `*_in` overloads, which only record the write
//! in a [`Transaction`] and resolve immediately.

use crate::domain::aggregate::Aggregate;
use crate::domain::transaction::Transaction;
use crate::error::{RepoError, RepoResult};
use async_trait::async_trait;
use rusqlite::types::{FromSql, Value};
use std::collections::HashMap;

/// Named query parameters. Keys may be given with or without the leading `:`.
pub type QueryParams = HashMap<String, Value>;

/// Validated pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

impl Page {
    /// Rejects negative values with [`RepoError::InvalidArgument`].
    pub fn new(offset: i64, limit: i64) -> RepoResult<Self> {
        if offset < 0 || limit < 0 {
            return Err(RepoError::InvalidArgument(format!(
                "offset and limit must not be negative (offset={offset}, limit={limit})"
            )));
        }
        Ok(Self {
            offset: offset.unsigned_abs(),
            limit: limit.unsigned_abs(),
        })
    }

    /// Window holding at most the first row.
    pub fn first() -> Self {
        Self {
            offset: 0,
            limit: 1,
        }
    }
}

/// CRUD repository for one aggregate type.
#[async_trait]
pub trait Repository<A: Aggregate>: Send + Sync {
    /// Generates a fresh identity without touching storage.
    fn next_identity(&self) -> A::Id;

    async fn get(&self, id: &A::Id) -> RepoResult<Option<A>>;

    async fn get_all(&self) -> RepoResult<Vec<A>>;

    /// One aggregate per requested id, in `ids` order; unknown ids are
    /// skipped and an id requested twice is returned twice.
    async fn find_by_ids(&self, ids: &[A::Id]) -> RepoResult<Vec<A>>;

    async fn create(&self, aggregate: &A) -> RepoResult<()>;

    async fn create_all(&self, aggregates: &[A]) -> RepoResult<()>;

    async fn save(&self, aggregate: &A) -> RepoResult<()>;

    async fn save_all(&self, aggregates: &[A]) -> RepoResult<()>;

    async fn remove(&self, aggregate: &A) -> RepoResult<()>;

    async fn remove_all(&self, aggregates: &[A]) -> RepoResult<()>;
}

/// Repository whose writes can join a multi-repository transaction.
///
/// The `*_in` methods fail with [`RepoError::InvalidArgument`] when handed a
/// transaction from another storage family or another gateway, and with
/// [`RepoError::TransactionClosed`] once the transaction was committed.
pub trait TransactionalRepository<A: Aggregate>: Repository<A> {
    fn create_transaction(&self) -> Box<dyn Transaction>;

    fn create_in(&self, transaction: &dyn Transaction, aggregate: &A) -> RepoResult<()> {
        self.create_all_in(transaction, std::slice::from_ref(aggregate))
    }

    fn create_all_in(&self, transaction: &dyn Transaction, aggregates: &[A]) -> RepoResult<()>;

    fn save_in(&self, transaction: &dyn Transaction, aggregate: &A) -> RepoResult<()> {
        self.save_all_in(transaction, std::slice::from_ref(aggregate))
    }

    fn save_all_in(&self, transaction: &dyn Transaction, aggregates: &[A]) -> RepoResult<()>;

    fn remove_in(&self, transaction: &dyn Transaction, aggregate: &A) -> RepoResult<()> {
        self.remove_all_in(transaction, std::slice::from_ref(aggregate))
    }

    fn remove_all_in(&self, transaction: &dyn Transaction, aggregates: &[A]) -> RepoResult<()>;
}

/// Parameterized queries returning aggregates or plain column values.
///
/// Queries are SQL `SELECT` statements; aggregate queries must project the
/// columns the aggregate is mapped from.
#[async_trait]
pub trait QueryRepository<A: Aggregate>: Send + Sync {
    async fn find_aggregates(&self, query: &str, params: &QueryParams) -> RepoResult<Vec<A>>;

    async fn find_aggregates_paged(
        &self,
        query: &str,
        params: &QueryParams,
        offset: i64,
        limit: i64,
    ) -> RepoResult<Vec<A>>;

    async fn find_aggregate(&self, query: &str, params: &QueryParams) -> RepoResult<Option<A>>;

    /// Values of the first projected column.
    async fn find_values<E>(&self, query: &str, params: &QueryParams) -> RepoResult<Vec<E>>
    where
        E: FromSql + Send + 'static;

    async fn find_value<E>(&self, query: &str, params: &QueryParams) -> RepoResult<Option<E>>
    where
        E: FromSql + Send + 'static;
}
