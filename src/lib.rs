//! Stable, authenticated retrieval of files from remote git repositories.
//!
//! A [`Resource`] names a file as `(repo, filepath, ref)`, where the ref may
//! be a branch, tag, commit hash or HEAD. The [`Git`] engine retrieves
//! resource content through a local clone cache, serializing work per
//! repository and trying each configured authentication method in turn.
//! Layered on top sit [`Session`] (first-resolution hash pinning for the
//! lifetime of a caller) and [`Pinner`] (module-file-backed version pins
//! across runs).
//!
//! ```no_run
//! use golden_retriever::{Context, Git, Reference, Resource, Retriever};
//!
//! let git = Git::new(None).unwrap();
//! let mut resource = Resource::new(
//!     "github.com/SyslBot/a-public-repo",
//!     "README.md",
//!     Reference::head(),
//! );
//! let content = git.retrieve(&Context::background(), &mut resource).unwrap();
//! println!("{} bytes at {}", content.len(), resource.reference);
//! ```

pub mod auth;
pub mod cache;
pub mod context;
pub mod expand;
pub mod git;
pub mod mock;
pub mod once;
pub mod pinner;
pub mod reader;
pub mod reference;
pub mod resource;
pub mod retrieve;

pub use auth::{AuthOptions, Credential, SshKey};
pub use cache::Cacher;
pub use context::{CancelHandle, Context, ContextError};
pub use expand::{GithubExpander, RefExpander};
pub use git::{
    CheckoutOpts, CloneOpts, FetchOpts, FetchPolicy, Git, GitError, ResetPolicy, Session,
    SessionError, SetOpts, TagMode,
};
pub use pinner::{PinError, Pinner};
pub use reader::Reader;
pub use reference::{Hash, RefKind, Reference, ReferenceError, HEAD};
pub use resource::{Resource, ResourceError};
pub use retrieve::{RetrieveError, Retriever};
