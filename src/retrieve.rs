//! The retrieval contract shared by the engine and its decorators.

use thiserror::Error;

use crate::context::{Context, ContextError};
use crate::git::GitError;
use crate::pinner::PinError;
use crate::reference::ReferenceError;
use crate::resource::{Resource, ResourceError};

/// Fetches the content of a remote resource.
///
/// Implementations resolve the resource's reference as a side effect: on
/// success `resource.reference` carries the commit hash the content was read
/// at.
pub trait Retriever: Send + Sync {
    fn retrieve(&self, ctx: &Context, resource: &mut Resource) -> Result<Vec<u8>, RetrieveError>;
}

/// Failures surfaced by retrievers.
#[derive(Debug, Error)]
pub enum RetrieveError {
    /// Creating the local working copy failed.
    #[error("git clone: {0}")]
    Clone(#[source] GitError),
    /// Updating the local working copy failed.
    #[error("git fetch: {0}")]
    Fetch(#[source] GitError),
    /// Resolving or reading the file at its commit failed.
    #[error("git show: {0}")]
    Show(#[source] GitError),
    /// A git failure outside the clone/fetch/show phases.
    #[error(transparent)]
    Git(#[from] GitError),
    /// A malformed hash or reference.
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    /// A malformed resource string.
    #[error(transparent)]
    Resource(#[from] ResourceError),
    /// The context was cancelled or timed out.
    #[error(transparent)]
    Cancelled(#[from] ContextError),
    /// A pin conflict or module-file failure.
    #[error(transparent)]
    Pin(#[from] PinError),
}
