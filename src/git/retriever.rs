//! The retrieval engine: clone-or-reuse decisions over the repository
//! cache, serialized per repository.

use dashmap::DashMap;

use crate::auth::{build_chain, AuthOptions, Authenticator};
use crate::cache::Cacher;
use crate::context::Context;
use crate::expand::RefExpander;
use crate::once::Once;
use crate::reference::Reference;
use crate::resource::Resource;
use crate::retrieve::{RetrieveError, Retriever};

use super::cli::GitCli;
use super::ops::{CloneOpts, FetchOpts, Repo, TagMode};
use super::GitError;

/// A [`Retriever`] over a local repository cache.
///
/// All state is safe to share across threads; operations against the same
/// repository are serialized through the once-queue, and whether a
/// `(repo, refname)` pair has been fetched is memoized for the engine's
/// lifetime.
pub struct Git {
    auth: Vec<Authenticator>,
    cacher: Cacher,
    cli: GitCli,
    once: Once,
    fetched: DashMap<String, ()>,
    expander: Option<Box<dyn RefExpander>>,
    forced_fetch: bool,
}

impl Git {
    /// An engine over an ephemeral cache: clones live and die with the
    /// process.
    pub fn new(options: Option<&AuthOptions>) -> Result<Git, GitError> {
        Ok(Git::with_cache(options, Cacher::ephemeral()?))
    }

    /// An engine over the given cache.
    pub fn with_cache(options: Option<&AuthOptions>, cacher: Cacher) -> Git {
        Git {
            auth: build_chain(options),
            cacher,
            cli: GitCli::new(),
            once: Once::new(),
            fetched: DashMap::new(),
            expander: None,
            forced_fetch: false,
        }
    }

    /// Installs a hosting-provider ref expander consulted by the fetch
    /// escalation path.
    pub fn with_expander(mut self, expander: Box<dyn RefExpander>) -> Git {
        self.expander = Some(expander);
        self
    }

    /// Always refresh references from the remote before showing content,
    /// even when the resource already resolves locally.
    pub fn with_forced_fetch(mut self, forced: bool) -> Git {
        self.forced_fetch = forced;
        self
    }

    pub(crate) fn auth(&self) -> &[Authenticator] {
        &self.auth
    }

    pub(crate) fn cacher(&self) -> &Cacher {
        &self.cacher
    }

    pub(crate) fn cli(&self) -> &GitCli {
        &self.cli
    }

    pub(crate) fn once(&self) -> &Once {
        &self.once
    }

    pub(crate) fn expander(&self) -> Option<&dyn RefExpander> {
        self.expander.as_deref()
    }

    fn fetched_key(repo: &str, refname: &str) -> String {
        format!("{repo}:{refname}")
    }

    fn was_fetched(&self, repo: &str, refname: &str) -> bool {
        self.fetched.contains_key(&Git::fetched_key(repo, refname))
    }

    fn mark_fetched(&self, repo: &str, refname: &str) {
        self.fetched.insert(Git::fetched_key(repo, refname), ());
    }

    /// The engine's default fetch options for refreshing a reference.
    fn refresh_opts() -> FetchOpts {
        FetchOpts {
            depth: 1,
            force: true,
            tags: TagMode::Default,
        }
    }

    /// The retrieval state machine, run while holding the repo's once-slot.
    fn retrieve_locked(
        &self,
        ctx: &Context,
        resource: &mut Resource,
    ) -> Result<Vec<u8>, RetrieveError> {
        let repo = match self.open_repo(&resource.repo) {
            None => self.retrieve_miss(ctx, resource)?,
            Some(repo) => {
                match self.retrieve_hit(ctx, resource, repo)? {
                    Some(content) => return Ok(content),
                    None => self
                        .open_repo(&resource.repo)
                        .ok_or_else(|| RetrieveError::Git(GitError::RepoNotFound(resource.repo.clone())))?,
                }
            }
        };
        self.show_resource(&repo, resource)
    }

    /// Cache miss: clone shallow without a checkout, then make sure a hash
    /// reference's object actually arrived.
    fn retrieve_miss<'g>(
        &'g self,
        ctx: &Context,
        resource: &Resource,
    ) -> Result<Repo<'g>, RetrieveError> {
        let reference = &resource.reference;
        let opts = CloneOpts {
            depth: 1,
            no_checkout: true,
            single_branch: false,
            tags: TagMode::Default,
            reference_name: (!reference.name().is_empty()).then(|| reference.name().to_string()),
        };
        let repo = self
            .clone_repo(ctx, &resource.repo, opts)
            .map_err(RetrieveError::Clone)?;

        if reference.is_hash() && !repo.exists(reference.hash().as_str()) {
            repo.fetch_ref(ctx, reference.hash().as_str(), &Git::refresh_opts())
                .map_err(RetrieveError::Fetch)?;
        }

        self.mark_fetched(&resource.repo, resource.reference.name());
        Ok(repo)
    }

    /// Cache hit: serve local content when possible, otherwise decide what
    /// to fetch. Returns the content when the local copy already satisfies
    /// the request.
    fn retrieve_hit(
        &self,
        ctx: &Context,
        resource: &mut Resource,
        repo: Repo<'_>,
    ) -> Result<Option<Vec<u8>>, RetrieveError> {
        if !self.forced_fetch {
            let mut attempt = resource.clone();
            if let Ok(content) = self.show_resource(&repo, &mut attempt) {
                resource.reference = attempt.reference;
                return Ok(Some(content));
            }
        }

        if resource.reference.is_head() {
            let branch = repo.default_branch()?;
            resource.reference = Reference::branch(branch);
        }

        let refname = resource.reference.name().to_string();
        if resource.reference.is_hash() {
            if !repo.exists(resource.reference.hash().as_str()) {
                repo.fetch_ref(ctx, resource.reference.hash().as_str(), &Git::refresh_opts())
                    .map_err(RetrieveError::Fetch)?;
            }
        } else if repo.is_tag(&refname) {
            // Tags are immutable; the resolved tag never needs refreshing.
            self.mark_fetched(&resource.repo, &refname);
        } else if !self.was_fetched(&resource.repo, &refname) {
            repo.fetch_ref_or_all(ctx, &refname, &Git::refresh_opts())
                .map_err(RetrieveError::Fetch)?;
            self.mark_fetched(&resource.repo, &refname);
        }

        Ok(None)
    }

    /// Resolves the resource's reference and reads the file at its commit.
    fn show_resource(
        &self,
        repo: &Repo<'_>,
        resource: &mut Resource,
    ) -> Result<Vec<u8>, RetrieveError> {
        repo.resolve_reference(&mut resource.reference)
            .map_err(RetrieveError::Show)?;
        repo.show(resource.reference.hash(), &resource.filepath)
            .map_err(RetrieveError::Show)
    }
}

impl Retriever for Git {
    fn retrieve(&self, ctx: &Context, resource: &mut Resource) -> Result<Vec<u8>, RetrieveError> {
        ctx.err_if_done()?;
        let _slot = self.once.acquire(ctx, &resource.repo)?;
        self.retrieve_locked(ctx, resource)
    }
}
