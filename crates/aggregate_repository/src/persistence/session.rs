//! Session capability handed to every unit of work.
//!
//! # Responsibility
//! - Identity-keyed find/insert/merge/delete for mapped aggregates.
//! - Named-parameter queries with optional pagination.
//! - Track which identities were loaded or written in the current scope.
//!
//! # Invariants
//! - A session lives exactly as long as one transaction scope.
//! - Read-only sessions refuse every write before touching SQLite.
//! - "Tracked" means loaded or written through this session; merge and
//!   delete of tracked identities act in place, detached ones are attached
//!   first.

use crate::domain::repository::{Page, QueryParams};
use crate::error::{RepoError, RepoResult};
use crate::persistence::entity::{column_list, select_sql, Entity};
use log::debug;
use rusqlite::types::{FromSql, ToSql, Value};
use rusqlite::{params_from_iter, Connection};
use std::collections::{HashMap, HashSet};

/// Identities per statement in `find_many`, well under SQLite's bind limit.
const MAX_IDS_PER_LOOKUP: usize = 500;

pub struct Session<'conn> {
    conn: &'conn Connection,
    read_only: bool,
    tracked: HashSet<(&'static str, String)>,
}

impl<'conn> Session<'conn> {
    pub(crate) fn new(conn: &'conn Connection, read_only: bool) -> Self {
        Self {
            conn,
            read_only,
            tracked: HashSet::new(),
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Whether `id` was loaded or written through this session.
    pub fn contains<A: Entity>(&self, id: &A::Id) -> bool {
        self.tracked.contains(&tracking_key::<A>(id))
    }

    pub fn find<A: Entity>(&mut self, id: &A::Id) -> RepoResult<Option<A>> {
        let sql = format!("{} WHERE {} = ?1", select_sql::<A>(), A::ID_COLUMN);
        let mut stmt = self
            .conn
            .prepare_cached(&sql)
            .map_err(RepoError::persistence("find"))?;
        let mut rows = stmt.query([id]).map_err(RepoError::persistence("find"))?;
        let found = match rows.next().map_err(RepoError::persistence("find"))? {
            Some(row) => Some(A::from_row(row)?),
            None => None,
        };
        drop(rows);

        if let Some(aggregate) = &found {
            self.track(aggregate);
        }
        Ok(found)
    }

    /// One aggregate per requested id, in `ids` order; unknown ids are skipped
    /// and repeated ids yield repeated aggregates.
    pub fn find_many<A: Entity>(&mut self, ids: &[A::Id]) -> RepoResult<Vec<A>> {
        let mut found: HashMap<A::Id, A> = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_IDS_PER_LOOKUP) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "{} WHERE {} IN ({placeholders})",
                select_sql::<A>(),
                A::ID_COLUMN
            );
            for aggregate in self.load::<A>(&sql, params_from_iter(chunk.iter()))? {
                found.insert(aggregate.id().clone(), aggregate);
            }
        }

        Ok(ids.iter().filter_map(|id| found.get(id).cloned()).collect())
    }

    pub fn find_all<A: Entity>(&mut self) -> RepoResult<Vec<A>> {
        let sql = select_sql::<A>();
        self.load::<A>(&sql, [])
    }

    /// Inserts a new row; a duplicate identity is a constraint violation.
    pub fn insert<A: Entity>(&mut self, aggregate: &A) -> RepoResult<()> {
        self.ensure_writable("insert")?;
        let values = mapped_values(aggregate)?;

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            A::TABLE,
            column_list::<A>(),
            numbered_placeholders(A::COLUMNS.len() + 1)
        );
        let bound = bind_row(aggregate.id(), &values);
        self.conn
            .prepare_cached(&sql)
            .and_then(|mut stmt| stmt.execute(bound.as_slice()))
            .map_err(RepoError::persistence("insert"))?;

        self.track(aggregate);
        Ok(())
    }

    /// Update-if-exists, insert otherwise.
    pub fn merge<A: Entity>(&mut self, aggregate: &A) -> RepoResult<()> {
        self.ensure_writable("merge")?;
        let values = mapped_values(aggregate)?;

        if self.contains::<A>(aggregate.id()) && self.update_in_place(aggregate, &values)? {
            debug!(
                "event=session_merge module=session table={} mode=tracked",
                A::TABLE
            );
            return Ok(());
        }

        let sql = upsert_sql::<A>();
        let bound = bind_row(aggregate.id(), &values);
        self.conn
            .prepare_cached(&sql)
            .and_then(|mut stmt| stmt.execute(bound.as_slice()))
            .map_err(RepoError::persistence("merge"))?;
        debug!(
            "event=session_merge module=session table={} mode=detached",
            A::TABLE
        );

        self.track(aggregate);
        Ok(())
    }

    /// Deletes the row; an absent identity is not an error.
    pub fn delete<A: Entity>(&mut self, aggregate: &A) -> RepoResult<()> {
        self.ensure_writable("delete")?;
        let mode = if self.contains::<A>(aggregate.id()) {
            "tracked"
        } else {
            "detached"
        };

        let sql = format!("DELETE FROM {} WHERE {} = ?1", A::TABLE, A::ID_COLUMN);
        let removed = self
            .conn
            .prepare_cached(&sql)
            .and_then(|mut stmt| stmt.execute([aggregate.id()]))
            .map_err(RepoError::persistence("delete"))?;
        debug!(
            "event=session_delete module=session table={} mode={} rows={}",
            A::TABLE,
            mode,
            removed
        );

        self.tracked.remove(&tracking_key::<A>(aggregate.id()));
        Ok(())
    }

    /// Runs a `SELECT` projecting the aggregate's columns.
    pub fn query_aggregates<A: Entity>(
        &mut self,
        sql: &str,
        params: &QueryParams,
        page: Option<Page>,
    ) -> RepoResult<Vec<A>> {
        let sql = paged_sql(sql, page);
        let names = parameter_names(params);
        let bound = bind_named(&names);
        self.load::<A>(&sql, bound.as_slice())
    }

    /// Runs a `SELECT` and reads its first column.
    pub fn query_values<E: FromSql>(
        &self,
        sql: &str,
        params: &QueryParams,
        page: Option<Page>,
    ) -> RepoResult<Vec<E>> {
        let sql = paged_sql(sql, page);
        let names = parameter_names(params);
        let bound = bind_named(&names);

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(RepoError::persistence("query"))?;
        let mut rows = stmt
            .query(bound.as_slice())
            .map_err(RepoError::persistence("query"))?;
        let mut values = Vec::new();
        while let Some(row) = rows.next().map_err(RepoError::persistence("query"))? {
            values.push(row.get::<_, E>(0).map_err(RepoError::persistence("query"))?);
        }
        Ok(values)
    }

    fn load<A: Entity>(&mut self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<A>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(RepoError::persistence("query"))?;
        let mut rows = stmt
            .query(params)
            .map_err(RepoError::persistence("query"))?;
        let mut aggregates = Vec::new();
        while let Some(row) = rows.next().map_err(RepoError::persistence("query"))? {
            aggregates.push(A::from_row(row)?);
        }
        drop(rows);
        drop(stmt);

        for aggregate in &aggregates {
            self.track(aggregate);
        }
        Ok(aggregates)
    }

    fn update_in_place<A: Entity>(&self, aggregate: &A, values: &[Value]) -> RepoResult<bool> {
        if A::COLUMNS.is_empty() {
            return Ok(true);
        }
        let assignments = A::COLUMNS
            .iter()
            .enumerate()
            .map(|(index, column)| format!("{column} = ?{}", index + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {assignments} WHERE {} = ?1",
            A::TABLE,
            A::ID_COLUMN
        );
        let bound = bind_row(aggregate.id(), values);
        let changed = self
            .conn
            .prepare_cached(&sql)
            .and_then(|mut stmt| stmt.execute(bound.as_slice()))
            .map_err(RepoError::persistence("merge"))?;
        Ok(changed > 0)
    }

    fn track<A: Entity>(&mut self, aggregate: &A) {
        self.tracked.insert(tracking_key::<A>(aggregate.id()));
    }

    fn ensure_writable(&self, operation: &str) -> RepoResult<()> {
        if self.read_only {
            return Err(RepoError::InvalidArgument(format!(
                "{operation} is not allowed in a read-only scope"
            )));
        }
        Ok(())
    }
}

fn tracking_key<A: Entity>(id: &A::Id) -> (&'static str, String) {
    (A::TABLE, id.to_string())
}

fn mapped_values<A: Entity>(aggregate: &A) -> RepoResult<Vec<Value>> {
    let values = aggregate.values();
    if values.len() != A::COLUMNS.len() {
        return Err(RepoError::InvalidArgument(format!(
            "entity `{}` mapped {} values for {} columns",
            A::TABLE,
            values.len(),
            A::COLUMNS.len()
        )));
    }
    Ok(values)
}

fn bind_row<'a>(id: &'a dyn ToSql, values: &'a [Value]) -> Vec<&'a dyn ToSql> {
    std::iter::once(id)
        .chain(values.iter().map(|value| value as &dyn ToSql))
        .collect()
}

fn numbered_placeholders(count: usize) -> String {
    (1..=count)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn upsert_sql<A: Entity>() -> String {
    let insert = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        A::TABLE,
        column_list::<A>(),
        numbered_placeholders(A::COLUMNS.len() + 1)
    );
    if A::COLUMNS.is_empty() {
        return format!("{insert} ON CONFLICT({}) DO NOTHING", A::ID_COLUMN);
    }
    let updates = A::COLUMNS
        .iter()
        .map(|column| format!("{column} = excluded.{column}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{insert} ON CONFLICT({}) DO UPDATE SET {updates}", A::ID_COLUMN)
}

/// Wraps `sql` in a pagination window.
///
/// The closing parenthesis goes on its own line so a trailing `--` comment in
/// `sql` cannot swallow it.
fn paged_sql(sql: &str, page: Option<Page>) -> String {
    let sql = strip_terminator(sql.trim());
    match page {
        Some(page) => format!(
            "SELECT * FROM ({sql}\n) LIMIT {} OFFSET {}",
            page.limit, page.offset
        ),
        None => sql,
    }
}

/// Removes a final `;`, including one followed only by comments.
fn strip_terminator(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut last_token = None;
    let mut index = 0;
    while index < bytes.len() {
        let byte = bytes[index];
        match byte {
            b'-' if bytes.get(index + 1) == Some(&b'-') => {
                index = find_from(bytes, index + 2, b"\n").map_or(bytes.len(), |end| end + 1);
                continue;
            }
            b'/' if bytes.get(index + 1) == Some(&b'*') => {
                index = find_from(bytes, index + 2, b"*/").map_or(bytes.len(), |end| end + 2);
                continue;
            }
            b'\'' | b'"' | b'`' | b'[' => {
                let close = if byte == b'[' { b']' } else { byte };
                last_token = Some(index);
                index = find_from(bytes, index + 1, &[close]).map_or(bytes.len(), |end| end + 1);
                continue;
            }
            _ if byte.is_ascii_whitespace() => {}
            _ => last_token = Some(index),
        }
        index += 1;
    }

    match last_token {
        Some(position) if bytes[position] == b';' => {
            format!("{}{}", &sql[..position], &sql[position + 1..])
        }
        _ => sql.to_string(),
    }
}

fn find_from(bytes: &[u8], start: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(start..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| start + offset)
}

fn parameter_names(params: &QueryParams) -> Vec<(String, &Value)> {
    params
        .iter()
        .map(|(name, value)| {
            let name = if name.starts_with([':', '@', '$']) {
                name.clone()
            } else {
                format!(":{name}")
            };
            (name, value)
        })
        .collect()
}

fn bind_named<'a>(names: &'a [(String, &'a Value)]) -> Vec<(&'a str, &'a dyn ToSql)> {
    names
        .iter()
        .map(|(name, value)| (name.as_str(), *value as &dyn ToSql))
        .collect()
}
