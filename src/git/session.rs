//! Hash-pinning sessions over the retrieval engine.
//!
//! A session records the first hash each `(repo, ref)` key resolves to and
//! conforms every later operation on that key to it, making a batch of
//! operations stable while the upstream moves underneath.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::context::{Context, ContextError};
use crate::reference::{is_hash_like, Hash, HEAD};

use super::ops::{CheckoutOpts, CloneOpts, FetchOpts, TagMode};
use super::retriever::Git;
use super::GitError;

/// When a `set` consults the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    /// Fetch the first time this session touches anything, and whenever the
    /// reference is not known locally.
    #[default]
    First,
    /// Fetch only when the reference is not known locally.
    Unknown,
    /// Always fetch, unless the reference is a locally-known hash.
    True,
    /// Never fetch.
    False,
}

/// When a `set` discards local modifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetPolicy {
    /// Reset the first time this session sets anything.
    #[default]
    First,
    /// Reset only when moving to a different commit.
    OnCheckout,
    /// Always reset.
    True,
    /// Never reset.
    False,
}

/// Options for [`Session::set`].
#[derive(Debug, Clone)]
pub struct SetOpts {
    pub fetch: FetchPolicy,
    pub reset: ResetPolicy,
    /// Move the working tree to the target commit.
    pub checkout: bool,
    /// History depth for any fetch performed; 0 fetches everything.
    pub depth: i32,
    /// Only check the repository state; never mutate it.
    pub verify: bool,
    /// Log the decisions taken at info level.
    pub verbose: bool,
}

impl Default for SetOpts {
    fn default() -> SetOpts {
        SetOpts {
            fetch: FetchPolicy::First,
            reset: ResetPolicy::First,
            checkout: true,
            depth: 0,
            verify: false,
            verbose: false,
        }
    }
}

/// Failures specific to session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("repository {repo} is not available locally and fetching was disabled")]
    FetchDisabled { repo: String },
    #[error("repository {repo} was asked to be verified at reference {reference} but doesn't exist")]
    VerifyMissing { repo: String, reference: String },
    #[error("repository {repo} was asked to be verified at reference {reference} but was at {head}")]
    VerifyMismatch {
        repo: String,
        reference: String,
        head: String,
    },
    #[error("repository {repo} verified to be at reference {reference} but requested reset would modify contents")]
    VerifyDirty { repo: String, reference: String },
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Cancelled(#[from] ContextError),
}

/// A caller-scoped pinning layer over a shared [`Git`] engine.
pub struct Session {
    git: Arc<Git>,
    hashes: DashMap<String, Hash>,
}

impl Session {
    pub fn new(git: Arc<Git>) -> Session {
        Session {
            git,
            hashes: DashMap::new(),
        }
    }

    fn key(repo: &str, reference: &str) -> String {
        format!("{repo}@{reference}")
    }

    /// Ensures the cached working tree of `repo` is at the commit denoted by
    /// `reference`, then returns that commit.
    ///
    /// The first hash resolved for each `(repo, reference)` key is recorded
    /// and substituted on every later call within this session.
    pub fn set(
        &self,
        ctx: &Context,
        repo: &str,
        reference: &str,
        opts: SetOpts,
    ) -> Result<Hash, SessionError> {
        ctx.err_if_done()?;

        // Legacy module files carry a tags/ prefix.
        let reference = reference.strip_prefix("tags/").unwrap_or(reference);
        let key = Session::key(repo, reference);
        let session_first = self.hashes.is_empty();

        let refname = match self.hashes.get(&key) {
            Some(hash) => hash.to_string(),
            None => reference.to_string(),
        };

        if opts.verbose {
            log::info!("setting repo: {repo} to reference: {refname} with opts: {opts:?}");
        }

        let _slot = self.git.once().acquire(ctx, repo)?;
        let hash = self.set_locked(ctx, repo, &refname, session_first, &opts)?;
        self.hashes.entry(key).or_insert(hash);
        Ok(hash)
    }

    /// Resolves `reference` to a commit without touching the working tree.
    pub fn resolve(
        &self,
        ctx: &Context,
        repo: &str,
        reference: &str,
        opts: SetOpts,
    ) -> Result<Hash, SessionError> {
        self.set(
            ctx,
            repo,
            reference,
            SetOpts {
                checkout: false,
                reset: ResetPolicy::False,
                verify: false,
                ..opts
            },
        )
    }

    fn fetch_opts(depth: i32) -> FetchOpts {
        FetchOpts {
            depth,
            force: true,
            tags: TagMode::Default,
        }
    }

    fn set_locked(
        &self,
        ctx: &Context,
        repo: &str,
        refname: &str,
        session_first: bool,
        opts: &SetOpts,
    ) -> Result<Hash, SessionError> {
        let Some(existing) = self.git.open_repo(repo) else {
            return self.set_absent(ctx, repo, refname, opts);
        };

        let head = existing.head_hash().ok();
        let mut target = existing.resolve_hash(refname).ok();

        let known_hash = is_hash_like(refname) && target.is_some();
        let should_fetch = match opts.fetch {
            FetchPolicy::False => false,
            FetchPolicy::Unknown => target.is_none(),
            FetchPolicy::True => !known_hash,
            FetchPolicy::First => (session_first && !known_hash) || target.is_none(),
        };

        if should_fetch {
            existing.fetch_ref_or_all(ctx, refname, &Session::fetch_opts(opts.depth))?;
            target = Some(existing.resolve_hash(refname)?);
        }

        let Some(target) = target else {
            return Err(GitError::RefNotFound(refname.to_string()).into());
        };

        if opts.verify {
            if head != Some(target) {
                return Err(SessionError::VerifyMismatch {
                    repo: repo.to_string(),
                    reference: refname.to_string(),
                    head: head.map(|h| h.to_string()).unwrap_or_default(),
                });
            }
            if !matches!(opts.reset, ResetPolicy::True) {
                return Ok(target);
            }
            if !existing.is_clean()? {
                return Err(SessionError::VerifyDirty {
                    repo: repo.to_string(),
                    reference: refname.to_string(),
                });
            }
            return Ok(target);
        }

        if !opts.checkout {
            return Ok(target);
        }

        let should_reset = match opts.reset {
            ResetPolicy::True => true,
            ResetPolicy::False => false,
            ResetPolicy::First => session_first,
            ResetPolicy::OnCheckout => head != Some(target),
        };

        if head == Some(target) && !should_reset && existing.worktree_populated()? {
            if opts.verbose {
                log::info!("repo: {repo} already at reference: {refname}");
            }
            return Ok(target);
        }

        existing.checkout(
            refname,
            CheckoutOpts {
                force: !matches!(opts.reset, ResetPolicy::False),
            },
        )?;
        Ok(target)
    }

    /// First contact with a repository: clone it (or register it without a
    /// checkout) and make the requested reference available.
    fn set_absent(
        &self,
        ctx: &Context,
        repo: &str,
        refname: &str,
        opts: &SetOpts,
    ) -> Result<Hash, SessionError> {
        if matches!(opts.fetch, FetchPolicy::False) {
            return Err(SessionError::FetchDisabled {
                repo: repo.to_string(),
            });
        }
        if opts.verify {
            return Err(SessionError::VerifyMissing {
                repo: repo.to_string(),
                reference: refname.to_string(),
            });
        }

        let handle = if opts.checkout {
            self.git.clone_repo(
                ctx,
                repo,
                CloneOpts {
                    depth: opts.depth,
                    single_branch: false,
                    no_checkout: false,
                    tags: TagMode::Default,
                    reference_name: Some(refname.to_string()),
                },
            )?
        } else {
            let handle = self.git.init_with_remote(ctx, repo)?;
            handle.fetch_ref(ctx, HEAD, &Session::fetch_opts(opts.depth))?;
            handle
        };

        if !handle.exists(refname) {
            handle.fetch_ref_or_all(ctx, refname, &Session::fetch_opts(opts.depth))?;
        }

        if opts.checkout {
            handle.checkout(refname, CheckoutOpts { force: true })?;
        }

        Ok(handle.resolve_hash(refname)?)
    }
}
