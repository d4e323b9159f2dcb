//! Multi-repository transaction contract.

use crate::error::RepoResult;
use async_trait::async_trait;
use std::any::Any;
use std::fmt::{Display, Formatter};

/// Kind of a deferred write recorded in a transaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Insert; fails when the identity already exists.
    Create,
    /// Update-if-exists, insert otherwise.
    Save,
    /// Delete; absent identities are not an error.
    Remove,
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Create => "create",
            Self::Save => "save",
            Self::Remove => "remove",
        };
        f.write_str(label)
    }
}

/// Handle collecting writes from several repositories and applying them in
/// one atomic scope.
///
/// A handle is single-use: after the first `commit` attempt, successful or
/// not, every further call returns [`crate::RepoError::TransactionClosed`].
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Replays the recorded operations in append order inside one
    /// transaction scope.
    async fn commit(&self) -> RepoResult<()>;

    /// `false` once `commit` has been attempted.
    fn is_open(&self) -> bool;

    /// Number of operations waiting for commit.
    fn pending(&self) -> usize;

    /// Lets a repository recognise handles of its own storage family.
    fn as_any(&self) -> &dyn Any;
}
