//! A retriever decorator that pins repository versions in a module file.
//!
//! The first successful retrieval of a repository records its resolved hash
//! (and symbolic ref, unless it was HEAD). Later reference-less requests are
//! rewritten to the pin; requests that contradict the pin are rejected
//! without touching the module file.

mod modfile;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use modfile::{Import, ModFile};

use crate::auth::AuthOptions;
use crate::cache::Cacher;
use crate::context::Context;
use crate::git::{Git, GitError};
use crate::reference::{Hash, Reference, ReferenceError, HEAD};
use crate::resource::Resource;
use crate::retrieve::{RetrieveError, Retriever};

/// Failures specific to pinning.
#[derive(Debug, Error)]
pub enum PinError {
    /// A second named version of an already-pinned repository was requested.
    #[error("cannot import multiple versions ({new}, {old}) of a single repo {repo}")]
    Conflict {
        new: String,
        old: String,
        repo: String,
    },
    /// The request names the pinned ref but disagrees on the hash.
    #[error("reference name {name} and commit SHA {hash} not match")]
    HashMismatch { name: String, hash: String },
    /// A stored pin could not be turned back into a reference.
    #[error("module ref {reference} and pinned {pinned} invalid: {source}")]
    InvalidPin {
        reference: String,
        pinned: String,
        source: ReferenceError,
    },
    /// The module file is not valid YAML of the expected shape.
    #[error("invalid module file {path}: {source}")]
    InvalidMod {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A [`Retriever`] wrapper persisting version pins to a module file.
pub struct Pinner<R> {
    modfile: ModFile,
    inner: R,
}

impl<R: Retriever> Pinner<R> {
    /// Wraps `inner`, loading pins from the module file at `mod_path`.
    pub fn new(mod_path: impl Into<PathBuf>, inner: R) -> Result<Pinner<R>, PinError> {
        Ok(Pinner {
            modfile: ModFile::load(mod_path)?,
            inner,
        })
    }

    /// The module file backing this pinner.
    pub fn mod_path(&self) -> &Path {
        self.modfile.path()
    }
}

impl Pinner<Git> {
    /// A pinner over a git engine caching into the default plain cache
    /// directory.
    pub fn with_git(
        mod_path: impl Into<PathBuf>,
        options: Option<&AuthOptions>,
    ) -> Result<Pinner<Git>, PinError> {
        let git = Git::with_cache(options, Cacher::default_plain());
        Pinner::new(mod_path, git)
    }
}

impl<R> Pinner<R> {
    /// Applies the stored pin to the incoming reference, or rejects the
    /// request when they contradict each other.
    fn conform_reference(&self, resource: &mut Resource, import: &Import) -> Result<(), PinError> {
        let stored_name = import.reference.clone().unwrap_or_default();
        let name = resource.reference.name().to_string();
        let nameless = name.is_empty() || name == HEAD;

        if !nameless && !stored_name.is_empty() && name != stored_name {
            return Err(PinError::Conflict {
                new: name,
                old: stored_name,
                repo: resource.repo.clone(),
            });
        }

        let pinned = Hash::new(&import.pinned).map_err(|source| PinError::InvalidPin {
            reference: stored_name.clone(),
            pinned: import.pinned.clone(),
            source,
        })?;

        if !nameless && name == stored_name && resource.reference.is_hash()
            && resource.reference.hash() != pinned
        {
            return Err(PinError::HashMismatch {
                name,
                hash: resource.reference.hash().to_string(),
            });
        }

        if nameless || name == stored_name {
            resource.reference =
                Reference::new(&stored_name, pinned).map_err(|source| PinError::InvalidPin {
                    reference: stored_name.clone(),
                    pinned: import.pinned.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}

impl<R: Retriever> Retriever for Pinner<R> {
    fn retrieve(&self, ctx: &Context, resource: &mut Resource) -> Result<Vec<u8>, RetrieveError> {
        let only_hash = resource.reference.is_hash() && resource.reference.name().is_empty();
        let stored = self.modfile.get(&resource.repo);

        if let Some(import) = &stored {
            if !only_hash {
                self.conform_reference(resource, import)?;
            }
        }

        let content = self.inner.retrieve(ctx, resource)?;

        if stored.is_none() && !only_hash {
            if !resource.reference.is_hash() {
                // The inner retriever is expected to resolve the reference.
                return Err(RetrieveError::Git(GitError::RefNotFound(
                    resource.reference.name().to_string(),
                )));
            }
            let name = resource.reference.name();
            self.modfile.set(
                &resource.repo,
                Import {
                    reference: (!name.is_empty() && name != HEAD).then(|| name.to_string()),
                    pinned: resource.reference.hash().to_string(),
                },
            );
            self.modfile.save().map_err(RetrieveError::Pin)?;
        }

        Ok(content)
    }
}
