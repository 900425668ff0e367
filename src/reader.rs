//! Reading files addressed by either local or remote paths.
//!
//! Remote paths follow `//<host>/<owner>/<repo>/<path>@<ref>` (the leading
//! `//` is optional); everything else is read from the local filesystem.
//! An optional vendor directory serves previously retrieved files and
//! records new ones.

use std::path::PathBuf;

use thiserror::Error;

use crate::context::Context;
use crate::reference::Hash;
use crate::resource::{Resource, ResourceError};
use crate::retrieve::{RetrieveError, Retriever};

/// Prefix explicitly marking a path as remote.
const REMOTE_IMPORT_PREFIX: &str = "//";

/// Grammar of remote file paths, e.g. `github.com/foo/bar/path/to/file@v0.0.1`.
const RESOURCE_PATTERN: &str = r"^((\w+\.)+(\w)+(/[\w-]+){2})((/[\w.-]+)+)(@([\w./-]+))?$";

const REPO_GROUP: usize = 1;
const PATH_GROUP: usize = 5;
const REF_GROUP: usize = 8;

/// Failures while reading a path.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Retrieve(#[from] RetrieveError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reports whether `path` addresses a remote git file.
pub fn is_remote(path: &str) -> bool {
    if path.starts_with(REMOTE_IMPORT_PREFIX) {
        return true;
    }
    parse_resource(path).is_ok()
}

/// Parses a remote path into a [`Resource`].
pub fn parse_resource(path: &str) -> Result<Resource, ResourceError> {
    Resource::parse(
        path.strip_prefix(REMOTE_IMPORT_PREFIX).unwrap_or(path),
        RESOURCE_PATTERN,
        REPO_GROUP,
        PATH_GROUP,
        REF_GROUP,
    )
}

/// Dispatches reads between the local filesystem and a retriever.
pub struct Reader<R> {
    retriever: R,
    vendor_dir: Option<PathBuf>,
}

impl<R: Retriever> Reader<R> {
    pub fn new(retriever: R) -> Reader<R> {
        Reader {
            retriever,
            vendor_dir: None,
        }
    }

    /// Serves retrieved files from `dir` when present, and records new
    /// retrievals there.
    pub fn with_vendor_dir(mut self, dir: impl Into<PathBuf>) -> Reader<R> {
        let dir = dir.into();
        log::info!("vendor files are stored under {}", dir.display());
        self.vendor_dir = Some(dir);
        self
    }

    /// The content of the file at `path`, local or remote.
    pub fn read(&self, ctx: &Context, path: &str) -> Result<Vec<u8>, ReadError> {
        self.read_hash_branch(ctx, path).map(|(content, _, _)| content)
    }

    /// The content plus, for remote paths, the resolved commit hash.
    pub fn read_hash(&self, ctx: &Context, path: &str) -> Result<(Vec<u8>, Hash), ReadError> {
        self.read_hash_branch(ctx, path)
            .map(|(content, hash, _)| (content, hash))
    }

    /// The content plus, for remote paths, the resolved hash and ref name.
    pub fn read_hash_branch(
        &self,
        ctx: &Context,
        path: &str,
    ) -> Result<(Vec<u8>, Hash, String), ReadError> {
        if !is_remote(path) {
            return Ok((std::fs::read(path)?, Hash::ZERO, String::new()));
        }

        let mut resource = parse_resource(path)?;

        if let Some(vendor) = &self.vendor_dir {
            let vendored = vendor.join(path.strip_prefix(REMOTE_IMPORT_PREFIX).unwrap_or(path));
            if let Ok(content) = std::fs::read(&vendored) {
                return Ok((
                    content,
                    resource.reference.hash(),
                    resource.reference.name().to_string(),
                ));
            }
        }

        let content = self.retriever.retrieve(ctx, &mut resource)?;

        if let Some(vendor) = &self.vendor_dir {
            let target = vendor.join(resource.to_string());
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, &content)?;
        }

        Ok((
            content,
            resource.reference.hash(),
            resource.reference.name().to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRetriever;
    use crate::reference::RefKind;
    use tempfile::tempdir;

    #[test]
    fn remote_detection() {
        assert!(is_remote("//github.com/foo/bar/baz.md"));
        assert!(is_remote("github.com/foo/bar/baz.md@v0.0.1"));
        assert!(is_remote("github.com/foo/bar/path/to/file"));
        assert!(!is_remote("local/file.md"));
        assert!(!is_remote("/absolute/local/file.md"));
        assert!(!is_remote("file.md"));
    }

    #[test]
    fn parses_prefix_and_ref_forms() {
        let r = parse_resource("//github.com/foo/bar/baz.md@main").unwrap();
        assert_eq!(r.repo, "github.com/foo/bar");
        assert_eq!(r.filepath, "baz.md");
        assert_eq!(r.reference.name(), "main");

        let r = parse_resource("github.com/foo/bar/baz.md").unwrap();
        assert!(r.reference.is_head());

        let r =
            parse_resource("github.com/foo/bar/baz.md@1e7c4cecaaa8f76e3c668cebc411f1b03171501f")
                .unwrap();
        assert_eq!(r.reference.kind(), RefKind::Hash);
    }

    #[test]
    fn ref_with_slash_parses() {
        let r = parse_resource("github.com/foo/bar/baz.md@feature/foo.bar").unwrap();
        assert_eq!(r.reference.name(), "feature/foo.bar");
    }

    #[test]
    fn reads_local_files() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("note.txt");
        std::fs::write(&file, b"local bytes").unwrap();

        let reader = Reader::new(MockRetriever::new());
        let (content, hash, branch) = reader
            .read_hash_branch(&Context::background(), file.to_str().unwrap())
            .unwrap();
        assert_eq!(content, b"local bytes");
        assert!(hash.is_zero());
        assert_eq!(branch, "");
    }

    #[test]
    fn reads_remote_through_retriever() {
        let reader = Reader::new(MockRetriever::new());
        let (content, hash, branch) = reader
            .read_hash_branch(&Context::background(), "//github.com/foo/bar/baz.md@master")
            .unwrap();
        assert_eq!(content, MockRetriever::branch_content());
        assert_eq!(hash, MockRetriever::branch_hash());
        assert_eq!(branch, "master");
    }

    #[test]
    fn vendor_dir_records_and_serves() {
        let dir = tempdir().unwrap();
        let reader = Reader::new(MockRetriever::new()).with_vendor_dir(dir.path());
        let ctx = Context::background();

        let (content, _, _) = reader
            .read_hash_branch(&ctx, "github.com/foo/bar/baz.md@master")
            .unwrap();
        assert_eq!(content, MockRetriever::branch_content());

        // The retrieval is recorded under its resolved resource string.
        let recorded: Vec<_> = walk(dir.path());
        assert_eq!(recorded.len(), 1, "expected one vendored file: {recorded:?}");

        // A path matching a vendored file is served from disk.
        let vendored = dir.path().join("github.com/foo/bar/baz.md@master");
        if let Some(parent) = vendored.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&vendored, b"vendored bytes").unwrap();
        let (content, _, _) = reader
            .read_hash_branch(&ctx, "github.com/foo/bar/baz.md@master")
            .unwrap();
        assert_eq!(content, b"vendored bytes");
    }

    fn walk(dir: &std::path::Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut stack = vec![dir.to_path_buf()];
        while let Some(d) = stack.pop() {
            for entry in std::fs::read_dir(&d).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    files.push(path);
                }
            }
        }
        files
    }
}
