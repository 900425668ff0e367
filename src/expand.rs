//! Optional expansion of references through a hosting provider's API.
//!
//! When a direct ref fetch fails, the fallback path may ask a
//! [`RefExpander`] to turn the reference into a full commit hash before
//! resorting to a full fetch. The engine works without one, just slower on
//! that path.

use std::time::Duration;

use crate::reference::is_full_hash;

/// Best-effort expansion of a reference to a full 40-hex commit hash.
pub trait RefExpander: Send + Sync {
    /// Returns the full hash `reference` points at in `repo`, if the
    /// provider can tell. Failures are not errors; `None` means "don't
    /// know".
    fn expand(&self, repo: &str, reference: &str) -> Option<String>;
}

/// Expands references against the GitHub commits API.
#[derive(Debug, Default)]
pub struct GithubExpander {
    _private: (),
}

impl GithubExpander {
    pub fn new() -> GithubExpander {
        GithubExpander::default()
    }
}

impl RefExpander for GithubExpander {
    /// Queries `https://api.github.com/repos/<owner>/<repo>/commits/<ref>`.
    ///
    /// Only `github.com`-hosted repositories are answered. A short timeout
    /// keeps the probe from stalling the fetch path.
    fn expand(&self, repo: &str, reference: &str) -> Option<String> {
        let (host, rest) = repo.split_once('/')?;
        if host != "github.com" {
            return None;
        }

        let url = format!("https://api.github.com/repos/{rest}/commits/{reference}");
        let response = ureq::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .get(&url)
            .set("User-Agent", "golden-retriever")
            .set("Accept", "application/vnd.github+json")
            .call();

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                log::debug!("ref expansion for {repo}@{reference} failed: {e}");
                return None;
            }
        };

        let body: serde_json::Value = response.into_json().ok()?;
        let sha = body.get("sha")?.as_str()?;
        if is_full_hash(sha) {
            Some(sha.to_string())
        } else {
            log::debug!("ref expansion for {repo}@{reference} returned malformed sha {sha:?}");
            None
        }
    }
}
