//! Row mapping for aggregates stored in SQLite.

use crate::domain::aggregate::Aggregate;
use crate::error::RepoResult;
use rusqlite::types::Value;
use rusqlite::Row;

/// Table mapping for an aggregate.
///
/// Rows are read with `SELECT <ID_COLUMN>, <COLUMNS...> FROM <TABLE>`, so
/// `from_row` may address columns by name.
pub trait Entity: Aggregate {
    const TABLE: &'static str;
    const ID_COLUMN: &'static str = "id";
    /// Non-identity columns, in the order `values` returns them.
    const COLUMNS: &'static [&'static str];

    fn values(&self) -> Vec<Value>;

    fn from_row(row: &Row<'_>) -> RepoResult<Self>;
}

pub(crate) fn select_sql<A: Entity>() -> String {
    format!("SELECT {} FROM {}", column_list::<A>(), A::TABLE)
}

pub(crate) fn column_list<A: Entity>() -> String {
    std::iter::once(A::ID_COLUMN)
        .chain(A::COLUMNS.iter().copied())
        .collect::<Vec<_>>()
        .join(", ")
}
