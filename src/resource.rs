//! The `(repo, filepath, ref)` triple identifying a file version.

use std::fmt;

use regex::Regex;
use thiserror::Error;

use crate::reference::{is_full_hash, Hash, Reference, ReferenceError};

/// Errors produced when parsing resource strings.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The string does not match the resource grammar.
    #[error("{path} doesn't match resource regexp {pattern}")]
    NoMatch { path: String, pattern: String },
    /// The ref portion carried a malformed hash.
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    /// The supplied pattern itself is invalid.
    #[error("invalid resource regexp: {0}")]
    Pattern(#[from] regex::Error),
}

/// A remote git file resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Host-qualified repository identifier, e.g. `github.com/owner/name`.
    pub repo: String,
    /// POSIX-style path of the file within the repository.
    pub filepath: String,
    /// The reference to read the file at.
    pub reference: Reference,
}

impl Resource {
    /// Creates a resource addressing `filepath` in `repo` at `reference`.
    pub fn new(
        repo: impl Into<String>,
        filepath: impl Into<String>,
        reference: Reference,
    ) -> Resource {
        Resource {
            repo: repo.into(),
            filepath: filepath.into(),
            reference,
        }
    }

    /// Parses a resource from `s` using a caller-supplied grammar.
    ///
    /// `repo_idx`, `path_idx` and `ref_idx` select the capture groups holding
    /// the repository, file path and reference. An absent ref yields HEAD; a
    /// 40-hex ref yields a hash reference; anything else is symbolic.
    pub fn parse(
        s: &str,
        pattern: &str,
        repo_idx: usize,
        path_idx: usize,
        ref_idx: usize,
    ) -> Result<Resource, ResourceError> {
        let re = Regex::new(pattern)?;
        let caps = re.captures(s).ok_or_else(|| ResourceError::NoMatch {
            path: s.to_string(),
            pattern: pattern.to_string(),
        })?;

        let group = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or("");

        let refstr = group(ref_idx);
        let reference = if is_full_hash(refstr) {
            Reference::from_hash(Hash::new(refstr)?)?
        } else if !refstr.is_empty() {
            Reference::symbolic(refstr)
        } else {
            Reference::head()
        };

        Ok(Resource {
            repo: group(repo_idx).to_string(),
            filepath: group(path_idx).trim_start_matches('/').to_string(),
            reference,
        })
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.repo, self.filepath, self.reference)
    }
}
