//! DDD repository layer over SQLite.
//!
//! Repositories expose CRUD and query operations for identified aggregates,
//! each running in its own transaction. A [`Transaction`] handle obtained from
//! any repository collects writes from several repositories and applies them
//! atomically on commit.

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod logging;
pub mod persistence;

pub use config::{DatabaseTarget, GatewayConfig, LoggingConfig};
pub use db::{DbError, DbResult, Migration};
pub use domain::aggregate::{Aggregate, Identity};
pub use domain::repository::{
    Page, QueryParams, QueryRepository, Repository, TransactionalRepository,
};
pub use domain::transaction::{OperationKind, Transaction};
pub use error::{RepoError, RepoResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use persistence::{
    Entity, GatewayId, Session, SqliteGateway, SqliteRepository, SqliteTransaction,
};
