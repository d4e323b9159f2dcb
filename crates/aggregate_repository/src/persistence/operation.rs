//! Deferred write operations and the closed set of apply functions.

use crate::domain::transaction::OperationKind;
use crate::error::{RepoError, RepoResult};
use crate::persistence::entity::Entity;
use crate::persistence::session::Session;

/// Applies one kind of write to every aggregate, in order.
///
/// Shared by immediate repository writes and transaction replay so both paths
/// have identical semantics.
pub(crate) fn apply<A: Entity>(
    session: &mut Session<'_>,
    kind: OperationKind,
    aggregates: &[A],
) -> RepoResult<()> {
    for aggregate in aggregates {
        match kind {
            OperationKind::Create => session.insert(aggregate)?,
            OperationKind::Save => session.merge(aggregate)?,
            OperationKind::Remove => session.delete(aggregate)?,
        }
    }
    Ok(())
}

/// Type-erased aggregates of one entity type.
trait Batch: Send {
    fn apply(&self, kind: OperationKind, session: &mut Session<'_>) -> RepoResult<()>;

    fn len(&self) -> usize;
}

impl<A: Entity> Batch for Vec<A> {
    fn apply(&self, kind: OperationKind, session: &mut Session<'_>) -> RepoResult<()> {
        apply(session, kind, self)
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

/// One immutable entry of a transaction log.
pub(crate) struct Operation {
    kind: OperationKind,
    repository: &'static str,
    aggregates: Box<dyn Batch>,
}

impl Operation {
    pub(crate) fn new<A: Entity>(kind: OperationKind, aggregates: Vec<A>) -> Self {
        Self {
            kind,
            repository: A::TABLE,
            aggregates: Box::new(aggregates),
        }
    }

    pub(crate) fn kind(&self) -> OperationKind {
        self.kind
    }

    pub(crate) fn repository(&self) -> &'static str {
        self.repository
    }

    pub(crate) fn len(&self) -> usize {
        self.aggregates.len()
    }

    /// Applies the operation; failures are wrapped with their log position.
    pub(crate) fn replay(&self, index: usize, session: &mut Session<'_>) -> RepoResult<()> {
        self.aggregates
            .apply(self.kind, session)
            .map_err(|source| RepoError::CommitFailed {
                index,
                kind: self.kind,
                repository: self.repository,
                source: Box::new(source),
            })
    }
}
