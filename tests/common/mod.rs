//! Shared fixtures: throwaway upstream repositories authored with the
//! system git binary.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

pub const README: &str = "README.md";
pub const MAIN_CONTENT: &str = "# upstream v0.0.2\nA repo for retrieval testing\n";
pub const V1_CONTENT: &str = "# upstream v0.0.1\nA repo for retrieval testing\n";
pub const INIT_CONTENT: &str = "# upstream\nA repo for retrieval testing\n";
pub const DEV_CONTENT: &str = "# upstream-dev\nA repo for retrieval testing\n";

/// A local upstream repository plus the commit hashes of interest.
pub struct Upstream {
    _dir: TempDir,
    pub path: PathBuf,
    pub init_sha: String,
    pub v1_sha: String,
    pub main_sha: String,
    pub dev_sha: String,
}

pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .env("GIT_AUTHOR_NAME", "tester")
        .env("GIT_AUTHOR_EMAIL", "tester@example.com")
        .env("GIT_COMMITTER_NAME", "tester")
        .env("GIT_COMMITTER_EMAIL", "tester@example.com")
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn commit_file(dir: &Path, file: &str, content: &str, message: &str) -> String {
    std::fs::write(dir.join(file), content).unwrap();
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", message]);
    git(dir, &["rev-parse", "HEAD"])
}

/// Authors a repository with three commits on `main`, tags `v0.0.1` and
/// `v0.0.2`, and a `develop` branch.
pub fn author_upstream() -> Upstream {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("upstream");
    std::fs::create_dir_all(&path).unwrap();

    git(&path, &["init", "-b", "main"]);
    let init_sha = commit_file(&path, README, INIT_CONTENT, "initial");
    let v1_sha = commit_file(&path, README, V1_CONTENT, "v0.0.1");
    git(&path, &["tag", "v0.0.1"]);
    let main_sha = commit_file(&path, README, MAIN_CONTENT, "v0.0.2");
    git(&path, &["tag", "v0.0.2"]);

    git(&path, &["checkout", "-b", "develop"]);
    let dev_sha = commit_file(&path, README, DEV_CONTENT, "dev work");
    git(&path, &["checkout", "main"]);

    Upstream {
        path,
        _dir: dir,
        init_sha,
        v1_sha,
        main_sha,
        dev_sha,
    }
}

/// The repository identifier addressing the upstream through the local-path
/// authenticator.
pub fn repo_id(upstream: &Upstream) -> String {
    upstream.path.to_str().unwrap().to_string()
}

/// Auth options that allow reaching local upstreams.
pub fn local_auth() -> golden_retriever::AuthOptions {
    golden_retriever::AuthOptions {
        allow_local: true,
        ..Default::default()
    }
}
