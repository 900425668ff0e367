//! Git plumbing: authenticated clone/fetch/checkout/show operations, the
//! retrieval engine, and the hash-pinning session.
//!
//! Network operations go through libgit2 with per-authenticator credential
//! callbacks; a hardened `git` CLI fallback backs the plain cache when the
//! library path exhausts the chain. Local reads (revision resolution, file
//! content, worktree status) always use libgit2.

pub mod cli;
pub mod ops;
pub mod retriever;
pub mod session;

use std::fmt;

use thiserror::Error;

use crate::context::ContextError;

pub use ops::{CheckoutOpts, CloneOpts, FetchOpts, Repo, TagMode};
pub use retriever::Git;
pub use session::{FetchPolicy, ResetPolicy, Session, SessionError, SetOpts};

/// The per-method failures accumulated while iterating the auth chain.
#[derive(Debug)]
pub struct AuthAttempts(pub Vec<(String, String)>);

impl fmt::Display for AuthAttempts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .0
            .iter()
            .map(|(name, msg)| format!("    - {name}: {msg}"))
            .collect();
        f.write_str(&lines.join(",\n"))
    }
}

/// Classified failures from git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// A malformed or unsafe repository identifier or reference.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The reference does not exist remotely, or locally after fetching.
    #[error("reference {0} not found")]
    RefNotFound(String),
    /// The remote repository is missing or unreachable.
    #[error("repository {0} not found")]
    RepoNotFound(String),
    /// Every authenticator failed; the message enumerates each attempt.
    #[error("Unable to authenticate, tried: \n{0}")]
    AuthExhausted(AuthAttempts),
    /// The commit exists but the requested path does not.
    #[error("file not found: {0}")]
    FileNotFound(String),
    /// The commit hash is absent from the object database.
    #[error("object {0} not found")]
    ObjectNotFound(String),
    /// The operation needs an on-disk working tree.
    #[error("repository must be in a plain filesystem cache")]
    PlainCacheRequired,
    /// The context was cancelled or timed out.
    #[error(transparent)]
    Cancelled(#[from] ContextError),
    /// An unclassified libgit2 failure.
    #[error(transparent)]
    Git(#[from] git2::Error),
    /// An unclassified filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Rewrites a libgit2 error into the message recorded for one auth attempt.
///
/// Reference and repository misses get the stable phrasings consumed by
/// callers; everything else keeps the library's message.
pub(crate) fn attempt_message(
    err: &git2::Error,
    repo: &str,
    refname: Option<&str>,
) -> String {
    if let Some(refname) = refname {
        if looks_like_ref_not_found(err) {
            return format!("reference {refname} not found");
        }
    }
    if looks_like_repo_not_found(err) {
        return format!("repository {repo} not found");
    }
    err.message().to_string()
}

pub(crate) fn looks_like_ref_not_found(err: &git2::Error) -> bool {
    matches!(err.class(), git2::ErrorClass::Reference)
        || err.message().contains("couldn't find remote ref")
        || err.message().contains("matching reference")
}

pub(crate) fn looks_like_repo_not_found(err: &git2::Error) -> bool {
    let msg = err.message();
    (matches!(err.class(), git2::ErrorClass::Http | git2::ErrorClass::Net)
        && (msg.contains("404") || msg.contains("not found")))
        || (err.class() == git2::ErrorClass::Repository
            && err.code() == git2::ErrorCode::NotFound)
}
