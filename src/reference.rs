//! Git reference and commit-hash value types.
//!
//! A [`Reference`] names a commit either symbolically (HEAD, a branch, a tag,
//! or an unresolved "branch or tag" name) or directly by [`Hash`]. Symbolic
//! references pick up their hash during resolution; a reference with a
//! non-zero hash always renders as that hash.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The symbolic name of a repository's default-branch pointer.
pub const HEAD: &str = "HEAD";

/// Errors produced when constructing hashes and references.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    /// The string is not a 40-character hex commit SHA.
    #[error("invalid commit SHA {0:?}")]
    InvalidHash(String),
    /// A zero hash cannot be assigned to a reference.
    #[error("invalid commit SHA: zero hash")]
    ZeroHash,
}

/// A full 40-character hexadecimal commit identifier.
///
/// The all-zero value ([`Hash::ZERO`]) means "unset" and renders as the
/// empty string.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash([u8; 40]);

impl Hash {
    /// The unset sentinel.
    pub const ZERO: Hash = Hash([0; 40]);

    /// Parses a 40-hex string into a hash.
    pub fn new(s: &str) -> Result<Hash, ReferenceError> {
        if !is_full_hash(s) {
            return Err(ReferenceError::InvalidHash(s.to_string()));
        }
        let mut h = [0u8; 40];
        h.copy_from_slice(s.as_bytes());
        Ok(Hash(h))
    }

    /// Reports whether this is the unset sentinel.
    pub fn is_zero(&self) -> bool {
        *self == Hash::ZERO
    }

    /// Reports whether the hash holds a well-formed 40-hex value.
    pub fn is_valid(&self) -> bool {
        is_full_hash(self.as_str())
    }

    /// The hex string, or `""` for the zero hash.
    pub fn as_str(&self) -> &str {
        if self.is_zero() {
            return "";
        }
        // Only constructed from validated ASCII hex.
        std::str::from_utf8(&self.0).unwrap_or("")
    }
}

impl FromStr for Hash {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::new(s)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.as_str())
    }
}

/// Reports whether `s` is exactly 40 hexadecimal characters.
pub fn is_full_hash(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Reports whether `s` could be a (possibly abbreviated) commit hash.
pub fn is_hash_like(s: &str) -> bool {
    (4..=40).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// What kind of pointer a reference is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// The remote's default-branch pointer.
    Head,
    /// A branch name.
    Branch,
    /// A tag name.
    Tag,
    /// A branch-or-tag name that has not been classified yet.
    Symbolic,
    /// A direct commit hash.
    Hash,
}

/// A pointer to a commit, by name and/or resolved hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    name: String,
    hash: Hash,
    kind: RefKind,
}

impl Reference {
    /// The default-branch pointer.
    pub fn head() -> Reference {
        Reference {
            name: HEAD.to_string(),
            hash: Hash::ZERO,
            kind: RefKind::Head,
        }
    }

    /// A reference to the named branch.
    pub fn branch(name: impl Into<String>) -> Reference {
        Reference {
            name: name.into(),
            hash: Hash::ZERO,
            kind: RefKind::Branch,
        }
    }

    /// A reference to the named tag.
    pub fn tag(name: impl Into<String>) -> Reference {
        Reference {
            name: name.into(),
            hash: Hash::ZERO,
            kind: RefKind::Tag,
        }
    }

    /// A reference to a name that may be either a branch or a tag,
    /// e.g. `v0.0.1`, `main`, `develop`.
    ///
    /// Prefer [`Reference::branch`] or [`Reference::tag`] when the kind is
    /// known.
    pub fn symbolic(name: impl Into<String>) -> Reference {
        Reference {
            name: name.into(),
            hash: Hash::ZERO,
            kind: RefKind::Symbolic,
        }
    }

    /// A direct reference to a commit hash. Rejects the zero hash.
    pub fn from_hash(hash: Hash) -> Result<Reference, ReferenceError> {
        if !hash.is_valid() {
            return Err(ReferenceError::InvalidHash(hash.to_string()));
        }
        Ok(Reference {
            name: String::new(),
            hash,
            kind: RefKind::Hash,
        })
    }

    /// Builds a reference from an optional name and optional hash.
    ///
    /// An empty name with a zero hash yields HEAD; an empty name with a
    /// valid hash yields a hash reference; a name yields a symbolic
    /// reference carrying the hash when one is supplied.
    pub fn new(name: &str, hash: Hash) -> Result<Reference, ReferenceError> {
        if name.is_empty() {
            return if hash.is_zero() {
                Ok(Reference::head())
            } else {
                Reference::from_hash(hash)
            };
        }
        let mut r = Reference::symbolic(name);
        if hash.is_valid() {
            r.set_hash(hash)?;
        }
        Ok(r)
    }

    /// The reference name. Empty for pure hash references.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the reference. Used during resolution of HEAD and symbolic
    /// forms.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The resolved hash, or [`Hash::ZERO`] when unresolved.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Records the resolved hash. Rejects the zero hash.
    pub fn set_hash(&mut self, hash: Hash) -> Result<(), ReferenceError> {
        if hash.is_zero() {
            return Err(ReferenceError::ZeroHash);
        }
        self.hash = hash;
        Ok(())
    }

    /// The reference kind.
    pub fn kind(&self) -> RefKind {
        self.kind
    }

    /// Reports whether the reference is the HEAD pointer.
    pub fn is_head(&self) -> bool {
        self.name == HEAD
    }

    /// Reports whether the reference carries a resolved hash.
    pub fn is_hash(&self) -> bool {
        !self.hash.is_zero()
    }
}

impl fmt::Display for Reference {
    /// The hash when resolved, the name otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_hash() {
            self.hash.fmt(f)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// Candidate ref-space expansions for a symbolic name, in rev-parse order.
///
/// HEAD is special-cased: it only ever matches itself.
pub fn rev_parse_candidates(name: &str) -> Vec<String> {
    if name == HEAD {
        return vec![HEAD.to_string()];
    }
    vec![
        name.to_string(),
        format!("refs/{name}"),
        format!("refs/tags/{name}"),
        format!("refs/heads/{name}"),
        format!("refs/remotes/{name}"),
        format!("refs/remotes/{name}/HEAD"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "1e7c4cecaaa8f76e3c668cebc411f1b03171501f";

    #[test]
    fn hash_round_trips() {
        let h = Hash::new(SHA).unwrap();
        assert_eq!(h.to_string(), SHA);
        assert_eq!(Hash::new(&h.to_string()).unwrap(), h);
    }

    #[test]
    fn hash_accepts_mixed_case() {
        assert!(Hash::new("1E7C4CECAAA8F76E3C668CEBC411F1B03171501F").is_ok());
    }

    #[test]
    fn hash_rejects_wrong_length() {
        assert!(Hash::new(&SHA[..39]).is_err());
        assert!(Hash::new(&format!("{SHA}0")).is_err());
        assert!(Hash::new("").is_err());
    }

    #[test]
    fn hash_rejects_non_hex() {
        assert!(Hash::new("ge7c4cecaaa8f76e3c668cebc411f1b03171501f").is_err());
    }

    #[test]
    fn zero_hash_renders_empty() {
        assert!(Hash::ZERO.is_zero());
        assert_eq!(Hash::ZERO.to_string(), "");
        assert!(!Hash::ZERO.is_valid());
    }

    #[test]
    fn head_reference() {
        let r = Reference::head();
        assert!(r.is_head());
        assert!(!r.is_hash());
        assert_eq!(r.to_string(), "HEAD");
    }

    #[test]
    fn hash_reference_requires_valid_hash() {
        assert!(Reference::from_hash(Hash::ZERO).is_err());
        let r = Reference::from_hash(Hash::new(SHA).unwrap()).unwrap();
        assert!(r.is_hash());
        assert_eq!(r.name(), "");
        assert_eq!(r.to_string(), SHA);
    }

    #[test]
    fn set_hash_rejects_zero() {
        let mut r = Reference::symbolic("main");
        assert_eq!(r.set_hash(Hash::ZERO), Err(ReferenceError::ZeroHash));
    }

    #[test]
    fn resolved_symbolic_renders_hash() {
        let mut r = Reference::symbolic("v0.0.1");
        assert_eq!(r.to_string(), "v0.0.1");
        r.set_hash(Hash::new(SHA).unwrap()).unwrap();
        assert!(r.is_hash());
        assert_eq!(r.to_string(), SHA);
        assert_eq!(r.name(), "v0.0.1");
    }

    #[test]
    fn new_reference_dispatch() {
        assert!(Reference::new("", Hash::ZERO).unwrap().is_head());

        let hash = Hash::new(SHA).unwrap();
        let r = Reference::new("", hash).unwrap();
        assert_eq!(r.kind(), RefKind::Hash);

        let r = Reference::new("main", hash).unwrap();
        assert_eq!(r.kind(), RefKind::Symbolic);
        assert_eq!(r.hash(), hash);

        let r = Reference::new("main", Hash::ZERO).unwrap();
        assert!(!r.is_hash());
    }

    #[test]
    fn hash_like_bounds() {
        assert!(is_hash_like("1e7c4cec"));
        assert!(is_hash_like(SHA));
        assert!(!is_hash_like("abc"));
        assert!(!is_hash_like("main"));
        assert!(!is_hash_like("feature/foo.bar"));
    }

    #[test]
    fn candidates_cover_ref_spaces() {
        let c = rev_parse_candidates("v1");
        assert!(c.contains(&"refs/tags/v1".to_string()));
        assert!(c.contains(&"refs/heads/v1".to_string()));
        assert_eq!(rev_parse_candidates("HEAD"), vec!["HEAD".to_string()]);
    }
}
