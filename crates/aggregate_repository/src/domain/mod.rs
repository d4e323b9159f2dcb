//! Storage-agnostic repository contracts.
//!
//! # Responsibility
//! - Define what an aggregate and its identity are.
//! - Define repository and transaction contracts that application code
//!   depends on, independent of the backing store.
//!
//! # Invariants
//! - Reads are always immediate; only writes can be deferred into a
//!   transaction log.

pub mod aggregate;
pub mod repository;
pub mod transaction;
