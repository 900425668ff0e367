//! Clone, fetch, checkout, resolve and show operations over cached clones.
//!
//! Every network operation iterates the authentication chain until one
//! entry succeeds; failures accumulate into the exhaustion error. Local
//! reads go straight to libgit2.

use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::{AutotagOption, ObjectType, Oid, Repository, StatusOptions};

use crate::auth::{https_url, ssh_url, Transport};
use crate::cache::contains_traversal;
use crate::context::Context;
use crate::reference::{is_full_hash, rev_parse_candidates, Hash, Reference, HEAD};

use super::retriever::Git;
use super::{attempt_message, AuthAttempts, GitError};

/// Depth requesting the remote's full history.
pub(crate) const FULL_DEPTH: i32 = i32::MAX;

/// How tags ride along with a clone or fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagMode {
    /// The operation's usual behaviour (all tags on clone, following on
    /// fetch).
    #[default]
    Default,
    /// Download every tag.
    All,
    /// Download tags that point into the fetched history.
    Following,
    /// Download no tags.
    None,
}

impl TagMode {
    fn autotag(self, default: AutotagOption) -> AutotagOption {
        match self {
            TagMode::Default => default,
            TagMode::All => AutotagOption::All,
            TagMode::Following => AutotagOption::Auto,
            TagMode::None => AutotagOption::None,
        }
    }
}

/// Options for creating a new working copy.
///
/// Setting `single_branch` is unsafe when the reference could be a tag: the
/// narrowed refspec never consults the tag ref-space.
#[derive(Debug, Clone, Default)]
pub struct CloneOpts {
    /// History depth; 0 fetches everything.
    pub depth: i32,
    /// Fetch only the requested reference instead of every branch.
    pub single_branch: bool,
    /// Leave the working tree unpopulated.
    pub no_checkout: bool,
    /// Tag download behaviour.
    pub tags: TagMode,
    /// The reference the caller intends to use, when known.
    pub reference_name: Option<String>,
}

/// Options for fetch operations.
#[derive(Debug, Clone, Default)]
pub struct FetchOpts {
    /// History depth; 0 keeps the repository's current depth.
    pub depth: i32,
    /// Update references even when not fast-forward.
    pub force: bool,
    /// Tag download behaviour.
    pub tags: TagMode,
}

/// Options for moving the working tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutOpts {
    /// Overwrite local modifications.
    pub force: bool,
}

/// A cached clone plus the engine it belongs to.
pub struct Repo<'g> {
    pub(crate) git: &'g Git,
    pub(crate) inner: Repository,
    pub(crate) name: String,
}

impl std::fmt::Display for Repo<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Rejects repository identifiers that could escape the cache root or
/// smuggle arguments into the fallback git binary.
pub(crate) fn validate_repo_id(repo: &str) -> Result<(), GitError> {
    if repo.is_empty() {
        return Err(GitError::InvalidInput("repo cannot be empty".to_string()));
    }
    if contains_traversal(repo) {
        return Err(GitError::InvalidInput(format!(
            "repo {repo} cannot contain '..'"
        )));
    }
    if repo.bytes().any(|b| b < 0x20) {
        return Err(GitError::InvalidInput(format!(
            "repo {repo} cannot contain control characters"
        )));
    }
    Ok(())
}

fn plus(force: bool) -> &'static str {
    if force {
        "+"
    } else {
        ""
    }
}

/// Refspec candidates for fetching `refname`, in rev-parse order.
pub(crate) fn fetch_candidates(refname: &str, force: bool) -> Vec<String> {
    let p = plus(force);
    if refname == HEAD {
        return vec![format!("{p}HEAD:refs/remotes/origin/HEAD")];
    }
    if is_full_hash(refname) {
        // A plain hash has no ref-space; park it under the remote namespace
        // so the object survives later pruning.
        return vec![format!("{p}{refname}:refs/remotes/origin/{refname}")];
    }
    if refname.starts_with("refs/") {
        return vec![format!("{p}{refname}:{refname}")];
    }
    vec![
        format!("{p}refs/tags/{refname}:refs/tags/{refname}"),
        format!("{p}refs/heads/{refname}:refs/heads/{refname}"),
    ]
}

fn resolve_candidates(refname: &str) -> Vec<String> {
    if refname == HEAD {
        return vec![HEAD.to_string(), "refs/remotes/origin/HEAD".to_string()];
    }
    let mut candidates = rev_parse_candidates(refname);
    candidates.push(format!("refs/remotes/origin/{refname}"));
    candidates
}

fn fetch_options<'cb>(
    depth: i32,
    tags: TagMode,
    default_tags: AutotagOption,
    transport: &Transport,
) -> git2::FetchOptions<'cb> {
    let mut options = git2::FetchOptions::new();
    // Local-path transports cannot negotiate shallow history; depth only
    // applies over URL transports, as with the stock git client.
    if depth > 0 && transport.url.contains("://") {
        options.depth(depth);
    }
    options.download_tags(tags.autotag(default_tags));
    options.remote_callbacks(transport.cred.remote_callbacks());
    options
}

fn checkout_head_force(repo: &Repository) -> Result<(), git2::Error> {
    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_head(Some(&mut checkout))
}

/// One clone attempt against a single transport: init, fetch, set up HEAD.
fn clone_attempt(
    dir: &Path,
    bare: bool,
    transport: &Transport,
    opts: &CloneOpts,
) -> Result<Repository, git2::Error> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)
            .map_err(|e| git2::Error::from_str(&format!("failed to clear clone dir: {e}")))?;
    }
    std::fs::create_dir_all(dir)
        .map_err(|e| git2::Error::from_str(&format!("failed to create clone dir: {e}")))?;

    let repo = if bare {
        Repository::init_bare(dir)?
    } else {
        Repository::init(dir)?
    };

    {
        let mut remote = repo.remote("origin", &transport.url)?;

        let specs = clone_refspecs(opts);
        let spec_strs: Vec<&str> = specs.iter().map(String::as_str).collect();
        let mut options = fetch_options(opts.depth, opts.tags, AutotagOption::All, transport);
        remote.fetch(&spec_strs, Some(&mut options), None)?;

        let default = remote
            .default_branch()
            .ok()
            .and_then(|b| b.as_str().map(str::to_string));
        setup_head(&repo, opts, default)?;
    }

    Ok(repo)
}

fn clone_refspecs(opts: &CloneOpts) -> Vec<String> {
    if opts.single_branch {
        if let Some(name) = &opts.reference_name {
            return fetch_candidates(name, true);
        }
    }
    vec![
        "+refs/heads/*:refs/remotes/origin/*".to_string(),
        "+HEAD:refs/remotes/origin/HEAD".to_string(),
    ]
}

/// Points HEAD somewhere sensible after the initial fetch: the remote's
/// default branch when advertised, else detached at the requested reference.
fn setup_head(
    repo: &Repository,
    opts: &CloneOpts,
    default: Option<String>,
) -> Result<(), git2::Error> {
    if let Some(branch_ref) = default {
        let shorthand = branch_ref
            .strip_prefix("refs/heads/")
            .unwrap_or(&branch_ref)
            .to_string();
        let tracking = format!("refs/remotes/origin/{shorthand}");

        let target = repo
            .find_reference(&tracking)
            .ok()
            .and_then(|r| r.target())
            .or_else(|| repo.find_reference(&branch_ref).ok().and_then(|r| r.target()));

        if let Some(oid) = target {
            repo.reference(&branch_ref, oid, true, "clone")?;
            let _ = repo.reference_symbolic("refs/remotes/origin/HEAD", &tracking, true, "clone");
            repo.set_head(&branch_ref)?;
            return Ok(());
        }
    }

    if let Some(name) = &opts.reference_name {
        for candidate in rev_parse_candidates(name) {
            if let Ok(object) = repo.revparse_single(&candidate) {
                if let Ok(commit) = object.peel(ObjectType::Commit) {
                    repo.set_head_detached(commit.id())?;
                    return Ok(());
                }
            }
        }
    }

    Ok(())
}

impl Git {
    /// Opens the cached clone of `repo`, if present.
    pub fn open_repo(&self, repo: &str) -> Option<Repo<'_>> {
        validate_repo_id(repo).ok()?;
        self.cacher().get(repo).map(|inner| Repo {
            git: self,
            inner,
            name: repo.to_string(),
        })
    }

    /// Creates a new working copy of `repo` in the cache.
    pub fn clone_repo(&self, ctx: &Context, repo: &str, opts: CloneOpts) -> Result<Repo<'_>, GitError> {
        ctx.err_if_done()?;
        validate_repo_id(repo)?;
        log::debug!("cloning repo: {repo} with opts: {opts:?}");

        let dir = self.cacher().repo_dir(repo);
        let bare = self.cacher().bare();

        let result = self.with_auth(ctx, repo, opts.reference_name.as_deref(), |transport| {
            clone_attempt(&dir, bare, transport, &opts)
        });

        let repository = match result {
            Ok(r) => r,
            Err(err) => {
                let _ = std::fs::remove_dir_all(&dir);
                if self.cacher().is_plain() {
                    if let Some(r) = self.clone_repo_cli(repo, &dir) {
                        return Ok(Repo {
                            git: self,
                            inner: r,
                            name: repo.to_string(),
                        });
                    }
                }
                return Err(err);
            }
        };

        if !opts.no_checkout && self.cacher().is_plain() && repository.head().is_ok() {
            checkout_head_force(&repository)?;
        }

        Ok(Repo {
            git: self,
            inner: repository,
            name: repo.to_string(),
        })
    }

    /// Retries a failed clone through the stock git binary.
    fn clone_repo_cli(&self, repo: &str, dir: &Path) -> Option<Repository> {
        for url in [https_url(repo), ssh_url(repo)] {
            if self.cli().clone_shallow(&url, dir).is_ok() {
                if let Some(r) = self.cacher().get(repo) {
                    log::debug!("cloned {repo} via git binary fallback");
                    return Some(r);
                }
            }
            let _ = std::fs::remove_dir_all(dir);
        }
        None
    }

    /// Registers `repo` in the cache without fetching anything: an empty
    /// repository with an `origin` remote attached.
    pub fn init_with_remote(&self, ctx: &Context, repo: &str) -> Result<Repo<'_>, GitError> {
        ctx.err_if_done()?;
        validate_repo_id(repo)?;
        log::debug!("initialising repo: {repo} with origin remote");

        let dir = self.cacher().repo_dir(repo);
        std::fs::create_dir_all(&dir)?;
        let repository = if self.cacher().bare() {
            Repository::init_bare(&dir)?
        } else {
            Repository::init(&dir)?
        };

        let mut attempts = Vec::new();
        for auth in self.auth() {
            let url = auth.transport(repo).url;
            let remote_result = repository
                .remote("origin", &url)
                .map(|_| ())
                .map_err(|e| e.message().to_string());
            match remote_result {
                Ok(()) => {
                    return Ok(Repo {
                        git: self,
                        inner: repository,
                        name: repo.to_string(),
                    })
                }
                Err(msg) => attempts.push((auth.name().to_string(), msg)),
            }
        }
        Err(GitError::AuthExhausted(AuthAttempts(attempts)))
    }

    /// Runs `f` once per authenticator until one attempt succeeds.
    pub(crate) fn with_auth<T>(
        &self,
        ctx: &Context,
        repo: &str,
        refname: Option<&str>,
        mut f: impl FnMut(&Transport) -> Result<T, git2::Error>,
    ) -> Result<T, GitError> {
        let mut attempts = Vec::new();
        for auth in self.auth() {
            ctx.err_if_done()?;
            let transport = auth.transport(repo);
            match f(&transport) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    log::debug!(
                        "auth method {} failed for {repo}: {}",
                        auth.name(),
                        e.message()
                    );
                    attempts.push((auth.name().to_string(), attempt_message(&e, repo, refname)));
                }
            }
        }
        Err(GitError::AuthExhausted(AuthAttempts(attempts)))
    }
}

impl Repo<'_> {
    /// The repository identifier this clone caches.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fetches exactly the given reference from origin.
    ///
    /// Unknown abbreviated hashes cannot be fetched; callers must expand
    /// short hashes upstream when the object is not already present.
    pub fn fetch_ref(&self, ctx: &Context, refname: &str, opts: &FetchOpts) -> Result<(), GitError> {
        log::debug!(
            "fetching ref: {refname} from repo: {} with opts: {opts:?}",
            self.name
        );
        let specs = fetch_candidates(refname, opts.force);
        let result = self
            .git
            .with_auth(ctx, &self.name, Some(refname), |transport| {
                let mut last: Option<git2::Error> = None;
                for spec in &specs {
                    let mut remote = self.inner.remote_anonymous(&transport.url)?;
                    let mut options =
                        fetch_options(opts.depth, opts.tags, AutotagOption::Auto, transport);
                    match remote.fetch(&[spec.as_str()], Some(&mut options), None) {
                        Ok(()) => return Ok(()),
                        Err(e) => last = Some(e),
                    }
                }
                Err(last.unwrap_or_else(|| git2::Error::from_str("no candidate refspecs")))
            });

        if result.is_err() && self.git.cacher().is_plain() {
            let dir = self.git.cacher().repo_dir(&self.name);
            for spec in &specs {
                if self.git.cli().fetch(&dir, spec).is_ok() {
                    log::debug!("fetched {spec} via git binary fallback");
                    return Ok(());
                }
            }
        }
        result
    }

    /// Fetches every branch head from origin.
    pub fn fetch_all(&self, ctx: &Context, opts: &FetchOpts) -> Result<(), GitError> {
        let spec = format!("{}refs/heads/*:refs/remotes/origin/*", plus(opts.force));
        log::debug!(
            "fetching all references from repo: {} with spec: {spec} and opts: {opts:?}",
            self.name
        );
        self.git.with_auth(ctx, &self.name, None, |transport| {
            let mut remote = self.inner.remote_anonymous(&transport.url)?;
            let mut options = fetch_options(opts.depth, opts.tags, AutotagOption::Auto, transport);
            remote.fetch(&[spec.as_str()], Some(&mut options), None)
        })
    }

    /// Fetches the reference, escalating on failure: first through the
    /// configured ref expander, then a full fetch of everything followed by
    /// a local re-check that the reference now exists.
    pub fn fetch_ref_or_all(
        &self,
        ctx: &Context,
        refname: &str,
        opts: &FetchOpts,
    ) -> Result<(), GitError> {
        let first = match self.fetch_ref(ctx, refname, opts) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if let Some(expander) = self.git.expander() {
            if let Some(sha) = expander.expand(&self.name, refname) {
                log::debug!("expanded ref {refname} to {sha} via provider API");
                if self.fetch_ref(ctx, &sha, opts).is_ok() && self.exists(&sha) {
                    return Ok(());
                }
            }
        }

        log::debug!(
            "falling back to full fetch for repo: {} after: {first}",
            self.name
        );
        let all = FetchOpts {
            depth: FULL_DEPTH,
            force: true,
            tags: TagMode::All,
        };
        self.fetch_all(ctx, &all)?;
        if !self.exists(refname) {
            return Err(GitError::RefNotFound(refname.to_string()));
        }
        Ok(())
    }

    /// Moves the working tree to the commit the reference denotes.
    pub fn checkout(&self, refname: &str, opts: CheckoutOpts) -> Result<(), GitError> {
        if !self.git.cacher().is_plain() {
            return Err(GitError::PlainCacheRequired);
        }
        log::debug!(
            "checking out repo: {} to reference: {refname} with opts: {opts:?}",
            self.name
        );
        let hash = self.resolve_hash(refname)?;
        let oid = Oid::from_str(hash.as_str())?;
        let commit = self
            .inner
            .find_commit(oid)
            .map_err(|_| GitError::ObjectNotFound(hash.to_string()))?;

        let mut checkout = CheckoutBuilder::new();
        if opts.force {
            // A forced move is a reset: local modifications and untracked
            // files both go.
            checkout.force().remove_untracked(true);
        } else {
            checkout.safe();
        }
        self.inner
            .checkout_tree(commit.as_object(), Some(&mut checkout))?;
        self.inner.set_head_detached(oid)?;
        Ok(())
    }

    /// Resolves a reference name to a commit hash using local state only.
    pub fn resolve_hash(&self, refname: &str) -> Result<Hash, GitError> {
        for candidate in resolve_candidates(refname) {
            if let Ok(object) = self.inner.revparse_single(&candidate) {
                if let Ok(commit) = object.peel(ObjectType::Commit) {
                    if let Ok(hash) = Hash::new(&commit.id().to_string()) {
                        return Ok(hash);
                    }
                }
            }
        }
        Err(GitError::RefNotFound(refname.to_string()))
    }

    /// Whether the reference resolves locally.
    pub fn exists(&self, refname: &str) -> bool {
        self.resolve_hash(refname).is_ok()
    }

    /// Resolves a symbolic reference in place, recording its hash.
    pub fn resolve_reference(&self, reference: &mut Reference) -> Result<(), GitError> {
        if reference.is_hash() {
            return Ok(());
        }
        let name = if reference.name().is_empty() {
            HEAD.to_string()
        } else {
            reference.name().to_string()
        };
        let hash = self.resolve_hash(&name)?;
        reference
            .set_hash(hash)
            .map_err(|_| GitError::RefNotFound(name.clone()))?;
        Ok(())
    }

    /// The commit the working tree's HEAD points at.
    pub fn head_hash(&self) -> Result<Hash, GitError> {
        let commit = self
            .inner
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|_| GitError::RefNotFound(HEAD.to_string()))?;
        Hash::new(&commit.id().to_string()).map_err(|_| GitError::RefNotFound(HEAD.to_string()))
    }

    /// The short name of the branch HEAD points at.
    ///
    /// An absent or detached HEAD with no recorded remote HEAD is a
    /// [`GitError::RefNotFound`].
    pub fn default_branch(&self) -> Result<String, GitError> {
        if let Ok(head) = self.inner.find_reference(HEAD) {
            if let Some(name) = head
                .symbolic_target()
                .and_then(|t| t.strip_prefix("refs/heads/"))
            {
                return Ok(name.to_string());
            }
        }
        if let Ok(origin_head) = self.inner.find_reference("refs/remotes/origin/HEAD") {
            if let Some(name) = origin_head
                .symbolic_target()
                .and_then(|t| t.strip_prefix("refs/remotes/origin/"))
            {
                return Ok(name.to_string());
            }
        }
        Err(GitError::RefNotFound(HEAD.to_string()))
    }

    /// Whether the name resolves through the tag ref-space.
    pub fn is_tag(&self, name: &str) -> bool {
        self.inner
            .find_reference(&format!("refs/tags/{name}"))
            .is_ok()
    }

    /// Whether the working tree has no modified or untracked files.
    pub fn is_clean(&self) -> Result<bool, GitError> {
        let mut options = StatusOptions::new();
        options.include_untracked(true).recurse_untracked_dirs(true);
        let statuses = self.inner.statuses(Some(&mut options))?;
        Ok(statuses.is_empty())
    }

    /// Whether the working tree holds anything beyond the `.git` entry.
    ///
    /// Distinguishes a populated checkout from a no-checkout clone that
    /// merely has its metadata in place.
    pub fn worktree_populated(&self) -> Result<bool, GitError> {
        let Some(workdir) = self.inner.workdir() else {
            return Ok(false);
        };
        for entry in std::fs::read_dir(workdir)? {
            if entry?.file_name() != ".git" {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Reads a file's bytes at the given commit.
    pub fn show(&self, hash: Hash, filepath: &str) -> Result<Vec<u8>, GitError> {
        let oid = Oid::from_str(hash.as_str())
            .map_err(|_| GitError::ObjectNotFound(hash.to_string()))?;
        let commit = self
            .inner
            .find_commit(oid)
            .map_err(|_| GitError::ObjectNotFound(hash.to_string()))?;
        let tree = commit.tree()?;
        let entry = tree
            .get_path(Path::new(filepath))
            .map_err(|_| GitError::FileNotFound(filepath.to_string()))?;
        let object = entry.to_object(&self.inner)?;
        let blob = object
            .as_blob()
            .ok_or_else(|| GitError::FileNotFound(filepath.to_string()))?;
        Ok(blob.content().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::cache::Cacher;
    use tempfile::TempDir;

    const REPO: &str = "example.com/foo/bar";

    /// Writes `content` to `path` and commits it on HEAD, returning the
    /// commit id.
    fn commit_file(repo: &Repository, path: &str, content: &str, message: &str) -> Oid {
        let workdir = repo.workdir().expect("fixture repo must have a worktree");
        std::fs::write(workdir.join(path), content).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(path)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();

        let sig = git2::Signature::now("tester", "tester@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    /// A plain-cache engine with one cached repository holding two commits
    /// and a tag on the first.
    fn fixture() -> (TempDir, Git, Oid, Oid) {
        let tmp = TempDir::new().unwrap();
        let git = Git::with_cache(None, Cacher::plain(tmp.path()));

        let dir = git.cacher().repo_dir(REPO);
        std::fs::create_dir_all(&dir).unwrap();
        let repo = Repository::init(&dir).unwrap();
        let first = commit_file(&repo, "README.md", "first\n", "initial");
        repo.reference("refs/tags/v1", first, false, "tag").unwrap();
        let second = commit_file(&repo, "README.md", "second\n", "update");

        (tmp, git, first, second)
    }

    #[test]
    fn open_repo_finds_cached_clone() {
        let (_tmp, git, _, _) = fixture();
        assert!(git.open_repo(REPO).is_some());
        assert!(git.open_repo("example.com/foo/missing").is_none());
    }

    #[test]
    fn repo_ids_with_traversal_are_rejected() {
        assert!(matches!(
            validate_repo_id("../../../../tmp/evil"),
            Err(GitError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_repo_id("example.com/foo/../bar"),
            Err(GitError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_repo_id(""),
            Err(GitError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_repo_id("example.com/foo\nbar"),
            Err(GitError::InvalidInput(_))
        ));
        assert!(validate_repo_id("example.com/foo/bar").is_ok());
        assert!(validate_repo_id("/srv/upstream/repo").is_ok());
    }

    #[test]
    fn operations_refuse_traversal_repo_ids() {
        let tmp = TempDir::new().unwrap();
        let git = Git::with_cache(None, Cacher::plain(tmp.path().join("root")));
        let ctx = Context::background();

        // A repository planted outside the cache root must stay unreachable.
        let outside = tmp.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        Repository::init(&outside).unwrap();
        assert!(git.open_repo("../outside").is_none());

        assert!(matches!(
            git.clone_repo(&ctx, "../outside", CloneOpts::default()),
            Err(GitError::InvalidInput(_))
        ));
        assert!(matches!(
            git.init_with_remote(&ctx, "../outside"),
            Err(GitError::InvalidInput(_))
        ));
        assert!(!tmp.path().join("root").exists());
    }

    #[test]
    fn resolve_hash_by_tag_branch_and_sha() {
        let (_tmp, git, first, second) = fixture();
        let repo = git.open_repo(REPO).unwrap();

        assert_eq!(repo.resolve_hash("v1").unwrap().to_string(), first.to_string());
        assert_eq!(
            repo.resolve_hash(HEAD).unwrap().to_string(),
            second.to_string()
        );
        assert_eq!(
            repo.resolve_hash(&first.to_string()).unwrap().to_string(),
            first.to_string()
        );
        assert!(matches!(
            repo.resolve_hash("nosuchref"),
            Err(GitError::RefNotFound(_))
        ));
    }

    #[test]
    fn exists_matches_resolve() {
        let (_tmp, git, _, _) = fixture();
        let repo = git.open_repo(REPO).unwrap();
        assert!(repo.exists("v1"));
        assert!(!repo.exists("nosuchref"));
    }

    #[test]
    fn resolve_reference_records_hash() {
        let (_tmp, git, first, _) = fixture();
        let repo = git.open_repo(REPO).unwrap();

        let mut reference = Reference::symbolic("v1");
        repo.resolve_reference(&mut reference).unwrap();
        assert_eq!(reference.hash().to_string(), first.to_string());
        assert_eq!(reference.name(), "v1");
    }

    #[test]
    fn show_reads_file_at_commit() {
        let (_tmp, git, first, second) = fixture();
        let repo = git.open_repo(REPO).unwrap();

        let old = Hash::new(&first.to_string()).unwrap();
        assert_eq!(repo.show(old, "README.md").unwrap(), b"first\n");

        let new = Hash::new(&second.to_string()).unwrap();
        assert_eq!(repo.show(new, "README.md").unwrap(), b"second\n");
    }

    #[test]
    fn show_distinguishes_missing_file_and_object() {
        let (_tmp, git, first, _) = fixture();
        let repo = git.open_repo(REPO).unwrap();

        let hash = Hash::new(&first.to_string()).unwrap();
        assert!(matches!(
            repo.show(hash, "absent.md"),
            Err(GitError::FileNotFound(_))
        ));

        let unknown = Hash::new("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap();
        assert!(matches!(
            repo.show(unknown, "README.md"),
            Err(GitError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn head_hash_tracks_tip() {
        let (_tmp, git, _, second) = fixture();
        let repo = git.open_repo(REPO).unwrap();
        assert_eq!(repo.head_hash().unwrap().to_string(), second.to_string());
    }

    #[test]
    fn default_branch_reports_head_target() {
        let (_tmp, git, _, _) = fixture();
        let repo = git.open_repo(REPO).unwrap();
        let expected = {
            let head = repo.inner.head().unwrap();
            head.shorthand().unwrap().to_string()
        };
        assert_eq!(repo.default_branch().unwrap(), expected);
    }

    #[test]
    fn is_tag_consults_tag_refspace_only() {
        let (_tmp, git, _, _) = fixture();
        let repo = git.open_repo(REPO).unwrap();
        assert!(repo.is_tag("v1"));
        assert!(!repo.is_tag("nosuchtag"));
        let branch = repo.default_branch().unwrap();
        assert!(!repo.is_tag(&branch));
    }

    #[test]
    fn is_clean_reflects_worktree_state() {
        let (_tmp, git, _, _) = fixture();
        let repo = git.open_repo(REPO).unwrap();
        assert!(repo.is_clean().unwrap());

        let dir = git.cacher().repo_dir(REPO);
        std::fs::write(dir.join("README.md"), "dirty").unwrap();
        assert!(!repo.is_clean().unwrap());

        std::fs::write(dir.join("untracked.txt"), "new").unwrap();
        assert!(!repo.is_clean().unwrap());
    }

    #[test]
    fn worktree_populated_detects_no_checkout_clones() {
        let (_tmp, git, _, _) = fixture();
        let repo = git.open_repo(REPO).unwrap();
        assert!(repo.worktree_populated().unwrap());

        let bare_engine = Git::with_cache(None, Cacher::ephemeral().unwrap());
        let dir = bare_engine.cacher().repo_dir(REPO);
        std::fs::create_dir_all(dir.parent().unwrap()).unwrap();
        Repository::init_bare(&dir).unwrap();
        let bare = bare_engine.open_repo(REPO).unwrap();
        assert!(!bare.worktree_populated().unwrap());
    }

    #[test]
    fn checkout_moves_and_respects_force() {
        let (_tmp, git, first, second) = fixture();
        let repo = git.open_repo(REPO).unwrap();
        let dir = git.cacher().repo_dir(REPO);

        repo.checkout(&first.to_string(), CheckoutOpts { force: true })
            .unwrap();
        assert_eq!(std::fs::read(dir.join("README.md")).unwrap(), b"first\n");

        // A safe checkout refuses to clobber local modifications.
        std::fs::write(dir.join("README.md"), "modified").unwrap();
        assert!(repo
            .checkout(&second.to_string(), CheckoutOpts { force: false })
            .is_err());

        // A forced checkout overwrites them.
        repo.checkout(&second.to_string(), CheckoutOpts { force: true })
            .unwrap();
        assert_eq!(std::fs::read(dir.join("README.md")).unwrap(), b"second\n");
    }

    #[test]
    fn checkout_requires_plain_cache() {
        let engine = Git::with_cache(None, Cacher::ephemeral().unwrap());
        let dir = engine.cacher().repo_dir(REPO);
        std::fs::create_dir_all(dir.parent().unwrap()).unwrap();
        Repository::init_bare(&dir).unwrap();

        let repo = engine.open_repo(REPO).unwrap();
        assert!(matches!(
            repo.checkout("HEAD", CheckoutOpts { force: true }),
            Err(GitError::PlainCacheRequired)
        ));
    }

    #[test]
    fn candidates_for_head() {
        assert_eq!(
            fetch_candidates("HEAD", true),
            vec!["+HEAD:refs/remotes/origin/HEAD".to_string()]
        );
    }

    #[test]
    fn candidates_for_full_hash() {
        let sha = "6a27bac5e5c379649c5b4574845744957cd6c749";
        assert_eq!(
            fetch_candidates(sha, true),
            vec![format!("+{sha}:refs/remotes/origin/{sha}")]
        );
    }

    #[test]
    fn candidates_for_symbolic_name() {
        assert_eq!(
            fetch_candidates("v0.0.1", true),
            vec![
                "+refs/tags/v0.0.1:refs/tags/v0.0.1".to_string(),
                "+refs/heads/v0.0.1:refs/heads/v0.0.1".to_string(),
            ]
        );
    }

    #[test]
    fn candidates_respect_force_flag() {
        let specs = fetch_candidates("main", false);
        assert!(specs.iter().all(|s| !s.starts_with('+')));
    }

    #[test]
    fn qualified_names_pass_through() {
        assert_eq!(
            fetch_candidates("refs/heads/main", true),
            vec!["+refs/heads/main:refs/heads/main".to_string()]
        );
    }

    #[test]
    fn resolve_candidates_for_head_prefer_local() {
        let candidates = resolve_candidates("HEAD");
        assert_eq!(candidates[0], "HEAD");
        assert_eq!(candidates[1], "refs/remotes/origin/HEAD");
    }
}
