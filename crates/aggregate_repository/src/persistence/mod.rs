//! SQLite-backed persistence gateway, repositories and transaction log.
//!
//! # Responsibility
//! - Run units of work inside explicit transaction scopes on a blocking task.
//! - Map aggregates to rows through [`Entity`].
//! - Record deferred writes from several repositories and replay them in one
//!   scope at commit.
//!
//! # Invariants
//! - Session state never outlives its transaction scope.
//! - Deferred operations replay strictly in append order.

mod entity;
mod gateway;
mod operation;
mod repository;
mod session;
mod transaction;

pub use entity::Entity;
pub use gateway::{GatewayId, SqliteGateway};
pub use repository::SqliteRepository;
pub use session::Session;
pub use transaction::SqliteTransaction;
