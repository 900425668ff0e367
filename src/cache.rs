//! Local storage strategies for cached repository clones.
//!
//! Two strategies sit behind [`Cacher`]:
//!
//! - **ephemeral**: bare repositories under a process-owned temporary
//!   directory, discarded when the cache is dropped. No working trees, so
//!   checkout-style operations are unavailable.
//! - **plain**: ordinary working trees at `<root>/<repo>`, shared across
//!   processes and surviving the current one.
//!
//! Repository handles are opened on demand: `git2::Repository` is not
//! sharable across threads, so every caller gets its own handle onto the
//! same on-disk state.

use std::io;
use std::path::{Path, PathBuf};

use git2::Repository;
use tempfile::TempDir;

/// Directory under the user cache dir holding plain caches by default.
const DEFAULT_CACHE_DIR: &str = "anz-bank.golden-retriever";

/// Where cached clones live.
#[derive(Debug)]
pub enum Cacher {
    /// Bare repositories in a process-lifetime temporary directory.
    Ephemeral(EphemeralCache),
    /// Working trees rooted at a configured directory.
    Plain(PlainCache),
}

#[derive(Debug)]
pub struct EphemeralCache {
    root: TempDir,
}

#[derive(Debug)]
pub struct PlainCache {
    root: PathBuf,
}

/// The default plain-cache root: `<user-cache-dir>/anz-bank.golden-retriever`.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join(DEFAULT_CACHE_DIR)
}

/// Reports whether a repository identifier carries a `..` path component
/// that would let the derived directory escape the cache root.
pub(crate) fn contains_traversal(repo: &str) -> bool {
    repo.split(['/', '\\']).any(|part| part == "..")
}

impl Cacher {
    /// A cache of bare repositories that lives and dies with the process.
    pub fn ephemeral() -> io::Result<Cacher> {
        Ok(Cacher::Ephemeral(EphemeralCache {
            root: TempDir::new()?,
        }))
    }

    /// A cache of plain working trees rooted at `root`.
    pub fn plain(root: impl Into<PathBuf>) -> Cacher {
        Cacher::Plain(PlainCache { root: root.into() })
    }

    /// A plain cache at the default user cache location.
    pub fn default_plain() -> Cacher {
        Cacher::plain(default_cache_dir())
    }

    /// Whether this cache holds real working trees.
    ///
    /// Checkout, reset and on-disk reads require a plain cache.
    pub fn is_plain(&self) -> bool {
        matches!(self, Cacher::Plain(_))
    }

    /// Whether repositories in this cache are bare.
    pub fn bare(&self) -> bool {
        !self.is_plain()
    }

    /// The directory holding (or destined to hold) the clone of `repo`.
    ///
    /// Local-path repository identifiers are absolute; their leading
    /// separator is stripped so every clone stays under the cache root.
    /// Identifiers containing `..` components are rejected before any path
    /// is derived (see [`Cacher::get`] and the engine's operations).
    pub fn repo_dir(&self, repo: &str) -> PathBuf {
        let repo = repo.trim_start_matches('/');
        match self {
            Cacher::Ephemeral(c) => c.root.path().join(repo),
            Cacher::Plain(c) => c.root.join(repo),
        }
    }

    /// Opens the cached clone of `repo`, if one exists.
    ///
    /// Identifiers with `..` components never resolve to a repository.
    pub fn get(&self, repo: &str) -> Option<Repository> {
        if contains_traversal(repo) {
            return None;
        }
        let dir = self.repo_dir(repo);
        let result = match self {
            Cacher::Ephemeral(_) => Repository::open_bare(&dir),
            Cacher::Plain(_) => Repository::open(&dir),
        };
        result.ok()
    }

    /// The root directory of the cache.
    pub fn root(&self) -> &Path {
        match self {
            Cacher::Ephemeral(c) => c.root.path(),
            Cacher::Plain(c) => &c.root,
        }
    }
}
