//! Hardened `git` CLI fallback for plain caches.
//!
//! libgit2 occasionally refuses operations the stock binary handles (odd
//! server-side shallow negotiation, exotic transport setups). When the
//! authenticated library path is exhausted and the cache is plain, the
//! engine retries through the system `git` with prompts, hooks and LFS
//! smudging disabled.

use std::path::Path;
use std::process::{Command, Stdio};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("git {op} failed: {stderr}")]
    Failed { op: &'static str, stderr: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejects values that could be misparsed as flags, traverse paths, or
/// smuggle controls.
fn validate_arg(value: &str, name: &str) -> Result<(), CliError> {
    if value.is_empty() {
        return Err(CliError::InvalidInput(format!("{name} cannot be empty")));
    }
    if value.split(['/', '\\']).any(|part| part == "..") {
        return Err(CliError::InvalidInput(format!(
            "{name} cannot contain '..'"
        )));
    }
    if value.starts_with('-') {
        return Err(CliError::InvalidInput(format!(
            "{name} cannot start with '-'"
        )));
    }
    if value.bytes().any(|b| b < 0x20) {
        return Err(CliError::InvalidInput(format!(
            "{name} cannot contain control characters"
        )));
    }
    Ok(())
}

/// The system `git` binary with security hardening applied.
#[derive(Debug, Default)]
pub struct GitCli {
    _private: (),
}

impl GitCli {
    pub fn new() -> GitCli {
        GitCli::default()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.env("GIT_LFS_SKIP_SMUDGE", "1");
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.args(["-c", "core.hooksPath="]);
        cmd.stdin(Stdio::null());
        cmd
    }

    /// `git clone --depth=1 <url> <dest>`.
    pub fn clone_shallow(&self, url: &str, dest: &Path) -> Result<(), CliError> {
        validate_arg(url, "url")?;

        let dest_existed = dest.exists();
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let output = self
            .command()
            .args(["clone", "--depth=1"])
            .arg(url)
            .arg(dest)
            .output()?;

        if !output.status.success() {
            if !dest_existed {
                let _ = std::fs::remove_dir_all(dest);
            }
            return Err(CliError::Failed {
                op: "clone",
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }

    /// `git fetch origin <refspec> --prune` inside `repo_dir`.
    pub fn fetch(&self, repo_dir: &Path, refspec: &str) -> Result<(), CliError> {
        validate_arg(refspec, "refspec")?;

        let output = self
            .command()
            .arg("-C")
            .arg(repo_dir)
            .args(["fetch", "origin"])
            .arg(refspec)
            .arg("--prune")
            .output()?;

        if !output.status.success() {
            return Err(CliError::Failed {
                op: "fetch",
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}
