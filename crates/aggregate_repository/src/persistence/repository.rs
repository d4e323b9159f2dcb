//! Generic SQLite repository for any [`Entity`].
//!
//! # Responsibility
//! - Implement the repository, query and transactional contracts on top of
//!   [`SqliteGateway`] scopes.
//!
//! # Invariants
//! - Each immediate write is its own transaction.
//! - Reads run in read-only scopes and never see a pending transaction log.
//! - Deferred writes validate the handle before anything is appended.

use crate::domain::aggregate::Identity;
use crate::domain::repository::{
    Page, QueryParams, QueryRepository, Repository, TransactionalRepository,
};
use crate::domain::transaction::{OperationKind, Transaction};
use crate::error::{RepoError, RepoResult};
use crate::persistence::entity::Entity;
use crate::persistence::gateway::SqliteGateway;
use crate::persistence::operation::apply;
use crate::persistence::transaction::SqliteTransaction;
use async_trait::async_trait;
use rusqlite::types::FromSql;
use std::marker::PhantomData;

pub struct SqliteRepository<A> {
    gateway: SqliteGateway,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A> Clone for SqliteRepository<A> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            _aggregate: PhantomData,
        }
    }
}

impl<A: Entity> SqliteRepository<A> {
    pub fn new(gateway: SqliteGateway) -> Self {
        Self {
            gateway,
            _aggregate: PhantomData,
        }
    }

    pub fn gateway(&self) -> &SqliteGateway {
        &self.gateway
    }

    /// Concrete handle, for callers that want to append without going
    /// through a repository.
    pub fn begin(&self) -> SqliteTransaction {
        SqliteTransaction::new(self.gateway.clone())
    }

    async fn write(&self, kind: OperationKind, aggregates: Vec<A>) -> RepoResult<()> {
        self.gateway
            .run_in_transaction(move |session| apply(session, kind, &aggregates))
            .await
    }

    fn sqlite_transaction<'t>(
        &self,
        transaction: &'t dyn Transaction,
    ) -> RepoResult<&'t SqliteTransaction> {
        let sqlite = transaction
            .as_any()
            .downcast_ref::<SqliteTransaction>()
            .ok_or_else(|| {
                RepoError::InvalidArgument(format!(
                    "repository `{}` only accepts SQLite transactions",
                    A::TABLE
                ))
            })?;

        if sqlite.gateway_id() != self.gateway.id() {
            return Err(RepoError::InvalidArgument(format!(
                "transaction belongs to gateway {}, repository `{}` uses gateway {}",
                sqlite.gateway_id(),
                A::TABLE,
                self.gateway.id()
            )));
        }
        Ok(sqlite)
    }

    async fn query_page(
        &self,
        query: &str,
        params: &QueryParams,
        page: Option<Page>,
    ) -> RepoResult<Vec<A>> {
        let query = query.to_string();
        let params = params.clone();
        self.gateway
            .run_read_only(move |session| session.query_aggregates::<A>(&query, &params, page))
            .await
    }

    async fn query_values<E>(
        &self,
        query: &str,
        params: &QueryParams,
        page: Option<Page>,
    ) -> RepoResult<Vec<E>>
    where
        E: FromSql + Send + 'static,
    {
        let query = query.to_string();
        let params = params.clone();
        self.gateway
            .run_read_only(move |session| session.query_values::<E>(&query, &params, page))
            .await
    }
}

#[async_trait]
impl<A: Entity> Repository<A> for SqliteRepository<A> {
    fn next_identity(&self) -> A::Id {
        A::Id::generate()
    }

    async fn get(&self, id: &A::Id) -> RepoResult<Option<A>> {
        let id = id.clone();
        self.gateway
            .run_read_only(move |session| session.find::<A>(&id))
            .await
    }

    async fn get_all(&self) -> RepoResult<Vec<A>> {
        self.gateway
            .run_read_only(|session| session.find_all::<A>())
            .await
    }

    async fn find_by_ids(&self, ids: &[A::Id]) -> RepoResult<Vec<A>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        self.gateway
            .run_read_only(move |session| session.find_many::<A>(&ids))
            .await
    }

    async fn create(&self, aggregate: &A) -> RepoResult<()> {
        self.write(OperationKind::Create, vec![aggregate.clone()])
            .await
    }

    async fn create_all(&self, aggregates: &[A]) -> RepoResult<()> {
        self.write(OperationKind::Create, aggregates.to_vec()).await
    }

    async fn save(&self, aggregate: &A) -> RepoResult<()> {
        self.write(OperationKind::Save, vec![aggregate.clone()]).await
    }

    async fn save_all(&self, aggregates: &[A]) -> RepoResult<()> {
        self.write(OperationKind::Save, aggregates.to_vec()).await
    }

    async fn remove(&self, aggregate: &A) -> RepoResult<()> {
        self.write(OperationKind::Remove, vec![aggregate.clone()])
            .await
    }

    async fn remove_all(&self, aggregates: &[A]) -> RepoResult<()> {
        self.write(OperationKind::Remove, aggregates.to_vec()).await
    }
}

impl<A: Entity> TransactionalRepository<A> for SqliteRepository<A> {
    fn create_transaction(&self) -> Box<dyn Transaction> {
        Box::new(self.begin())
    }

    fn create_all_in(&self, transaction: &dyn Transaction, aggregates: &[A]) -> RepoResult<()> {
        self.sqlite_transaction(transaction)?
            .create(aggregates.to_vec())
    }

    fn save_all_in(&self, transaction: &dyn Transaction, aggregates: &[A]) -> RepoResult<()> {
        self.sqlite_transaction(transaction)?
            .save(aggregates.to_vec())
    }

    fn remove_all_in(&self, transaction: &dyn Transaction, aggregates: &[A]) -> RepoResult<()> {
        self.sqlite_transaction(transaction)?
            .remove(aggregates.to_vec())
    }
}

#[async_trait]
impl<A: Entity> QueryRepository<A> for SqliteRepository<A> {
    async fn find_aggregates(&self, query: &str, params: &QueryParams) -> RepoResult<Vec<A>> {
        self.query_page(query, params, None).await
    }

    async fn find_aggregates_paged(
        &self,
        query: &str,
        params: &QueryParams,
        offset: i64,
        limit: i64,
    ) -> RepoResult<Vec<A>> {
        let page = Page::new(offset, limit)?;
        self.query_page(query, params, Some(page)).await
    }

    async fn find_aggregate(&self, query: &str, params: &QueryParams) -> RepoResult<Option<A>> {
        let mut found = self.query_page(query, params, Some(Page::first())).await?;
        Ok(found.pop())
    }

    async fn find_values<E>(&self, query: &str, params: &QueryParams) -> RepoResult<Vec<E>>
    where
        E: FromSql + Send + 'static,
    {
        self.query_values(query, params, None).await
    }

    async fn find_value<E>(&self, query: &str, params: &QueryParams) -> RepoResult<Option<E>>
    where
        E: FromSql + Send + 'static,
    {
        let mut found = self
            .query_values(query, params, Some(Page::first()))
            .await?;
        Ok(found.pop())
    }
}
