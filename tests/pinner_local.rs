//! Pinner over the real engine against locally authored upstreams.

mod common;

use tempfile::TempDir;

use golden_retriever::{Cacher, Context, Git, Pinner, Reference, Resource, Retriever};

use common::{author_upstream, local_auth, repo_id, README};

fn pinner(cache: &TempDir, mod_path: &std::path::Path) -> Pinner<Git> {
    let git = Git::with_cache(Some(&local_auth()), Cacher::plain(cache.path()));
    Pinner::new(mod_path, git).unwrap()
}

#[test]
fn head_retrieval_records_and_replays_the_pin() {
    let upstream = author_upstream();
    let cache = TempDir::new().unwrap();
    let mod_dir = TempDir::new().unwrap();
    let mod_path = mod_dir.path().join("modules.yaml");
    let ctx = Context::background();

    let p = pinner(&cache, &mod_path);
    let mut resource = Resource::new(repo_id(&upstream), README, Reference::head());
    let content = p.retrieve(&ctx, &mut resource).unwrap();
    assert_eq!(String::from_utf8(content).unwrap(), common::MAIN_CONTENT);

    let raw = std::fs::read_to_string(&mod_path).unwrap();
    assert!(raw.contains(&format!("pinned: {}", upstream.main_sha)), "{raw}");
    assert!(!raw.contains("ref:"), "{raw}");

    // Upstream advances; a fresh pinner over a fresh cache still serves the
    // pinned commit.
    std::fs::write(upstream.path.join(README), "moved on").unwrap();
    common::git(&upstream.path, &["add", "."]);
    common::git(&upstream.path, &["commit", "-m", "advance"]);

    let cache2 = TempDir::new().unwrap();
    let p = pinner(&cache2, &mod_path);
    let mut resource = Resource::new(repo_id(&upstream), README, Reference::head());
    let content = p.retrieve(&ctx, &mut resource).unwrap();
    assert_eq!(String::from_utf8(content).unwrap(), common::MAIN_CONTENT);
    assert_eq!(resource.reference.hash().to_string(), upstream.main_sha);
}

#[test]
fn tag_retrieval_records_a_named_pin() {
    let upstream = author_upstream();
    let cache = TempDir::new().unwrap();
    let mod_dir = TempDir::new().unwrap();
    let mod_path = mod_dir.path().join("modules.yaml");
    let ctx = Context::background();

    let p = pinner(&cache, &mod_path);
    let mut resource = Resource::new(repo_id(&upstream), README, Reference::symbolic("v0.0.1"));
    let content = p.retrieve(&ctx, &mut resource).unwrap();
    assert_eq!(String::from_utf8(content).unwrap(), common::V1_CONTENT);

    let raw = std::fs::read_to_string(&mod_path).unwrap();
    assert!(raw.contains("ref: v0.0.1"), "{raw}");
    assert!(raw.contains(&format!("pinned: {}", upstream.v1_sha)), "{raw}");
}

#[test]
fn conflicting_version_is_rejected_end_to_end() {
    let upstream = author_upstream();
    let cache = TempDir::new().unwrap();
    let mod_dir = TempDir::new().unwrap();
    let mod_path = mod_dir.path().join("modules.yaml");
    let ctx = Context::background();

    let p = pinner(&cache, &mod_path);
    let mut resource = Resource::new(repo_id(&upstream), README, Reference::symbolic("v0.0.1"));
    p.retrieve(&ctx, &mut resource).unwrap();
    let before = std::fs::read_to_string(&mod_path).unwrap();

    let mut resource = Resource::new(repo_id(&upstream), README, Reference::symbolic("v0.0.2"));
    let err = p.retrieve(&ctx, &mut resource).unwrap_err();
    assert_eq!(
        err.to_string(),
        format!(
            "cannot import multiple versions (v0.0.2, v0.0.1) of a single repo {}",
            repo_id(&upstream)
        )
    );
    assert_eq!(std::fs::read_to_string(&mod_path).unwrap(), before);
}

#[test]
fn hash_requests_bypass_the_stored_pin() {
    let upstream = author_upstream();
    let cache = TempDir::new().unwrap();
    let mod_dir = TempDir::new().unwrap();
    let mod_path = mod_dir.path().join("modules.yaml");
    let ctx = Context::background();

    let p = pinner(&cache, &mod_path);
    let mut resource = Resource::new(repo_id(&upstream), README, Reference::symbolic("v0.0.2"));
    p.retrieve(&ctx, &mut resource).unwrap();

    // An explicit hash request reads a different version without touching
    // the pin.
    let hash = golden_retriever::Hash::new(&upstream.v1_sha).unwrap();
    let mut resource = Resource::new(
        repo_id(&upstream),
        README,
        Reference::from_hash(hash).unwrap(),
    );
    let content = p.retrieve(&ctx, &mut resource).unwrap();
    assert_eq!(String::from_utf8(content).unwrap(), common::V1_CONTENT);

    let raw = std::fs::read_to_string(&mod_path).unwrap();
    assert!(raw.contains("ref: v0.0.2"), "{raw}");
    assert!(raw.contains(&format!("pinned: {}", upstream.main_sha)), "{raw}");
}
