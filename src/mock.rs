//! A canned retriever for exercising decorators without git.

use crate::context::Context;
use crate::git::GitError;
use crate::reference::{Hash, Reference, HEAD};
use crate::resource::Resource;
use crate::retrieve::{RetrieveError, Retriever};

/// Serves fixed content for HEAD, the `master` branch, the `v1` tag, and
/// any hash reference.
#[derive(Debug, Default)]
pub struct MockRetriever {
    _private: (),
}

impl MockRetriever {
    pub fn new() -> MockRetriever {
        MockRetriever::default()
    }

    pub fn head_content() -> Vec<u8> {
        b"content in HEAD".to_vec()
    }

    pub fn head_hash() -> Hash {
        Hash::new("133416d690dbffc8fe321e12bdd4f21d79e2a479").unwrap()
    }

    pub fn branch_content() -> Vec<u8> {
        b"content of a branch".to_vec()
    }

    pub fn branch_hash() -> Hash {
        Hash::new("233416d690dbffc8fe321e12bdd4f21d79e2a479").unwrap()
    }

    pub fn tag_content() -> Vec<u8> {
        b"content of v1".to_vec()
    }

    pub fn tag_hash() -> Hash {
        Hash::new("333416d690dbffc8fe321e12bdd4f21d79e2a479").unwrap()
    }

    pub fn hash_content() -> Vec<u8> {
        b"content of a commit".to_vec()
    }
}

impl Retriever for MockRetriever {
    fn retrieve(&self, _ctx: &Context, resource: &mut Resource) -> Result<Vec<u8>, RetrieveError> {
        if resource.reference.name() == HEAD
            || (resource.reference.name().is_empty() && !resource.reference.is_hash())
        {
            resource.reference = Reference::new(HEAD, MockRetriever::head_hash())?;
            return Ok(MockRetriever::head_content());
        }
        if resource.reference.is_hash() && resource.reference.name().is_empty() {
            return Ok(MockRetriever::hash_content());
        }
        match resource.reference.name() {
            "master" => {
                resource.reference.set_hash(MockRetriever::branch_hash())?;
                Ok(MockRetriever::branch_content())
            }
            "v1" => {
                resource.reference.set_hash(MockRetriever::tag_hash())?;
                Ok(MockRetriever::tag_content())
            }
            other => Err(RetrieveError::Git(GitError::RefNotFound(other.to_string()))),
        }
    }
}
