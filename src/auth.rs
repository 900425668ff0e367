//! Credential providers for reaching remote repositories.
//!
//! Authentication is a fixed-order chain: ssh-agent, per-host ssh key,
//! per-host basic auth, per-host token (as basic auth), anonymous, and,
//! when enabled, plain local paths. Operations iterate the chain until one
//! entry succeeds, accumulating each failure for the exhaustion error.

use std::cell::Cell;
use std::collections::HashMap;
use std::path::PathBuf;

use git2::{Cred, RemoteCallbacks};

/// Username substituted when a bare token is normalized to basic auth.
const TOKEN_USERNAME: &str = "modv2";

/// A username/password (or username/token) pair.
#[derive(Debug, Clone)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

/// An on-disk ssh private key, optionally passphrase-protected.
#[derive(Debug, Clone)]
pub struct SshKey {
    pub private_key: PathBuf,
    pub passphrase: Option<String>,
}

/// The authentication material available to a retriever.
///
/// All maps are keyed by host, e.g. `github.com`.
#[derive(Debug, Clone, Default)]
pub struct AuthOptions {
    /// Host to username/password pairs.
    pub credentials: HashMap<String, Credential>,
    /// Host to personal access tokens.
    pub tokens: HashMap<String, String>,
    /// Host to ssh private keys.
    pub ssh_keys: HashMap<String, SshKey>,
    /// Permit treating the repository identifier as a local filesystem path.
    pub allow_local: bool,
}

/// One entry in the authentication chain.
#[derive(Debug, Clone)]
pub enum Authenticator {
    /// Public-key auth through the running ssh-agent.
    SshAgent,
    /// Per-host ssh private keys.
    SshKeys(HashMap<String, SshKey>),
    /// Per-host username/password pairs.
    Basic(HashMap<String, Credential>),
    /// Per-host tokens, normalized to basic auth.
    Token(HashMap<String, Credential>),
    /// No credentials over HTTPS.
    Anonymous,
    /// The repository identifier used verbatim as a local path.
    Local,
}

/// Where a single attempt sources its credentials.
#[derive(Debug, Clone)]
pub enum CredSource {
    SshAgent,
    SshKeyFile {
        key: PathBuf,
        passphrase: Option<String>,
    },
    UserPass {
        username: String,
        password: String,
    },
    None,
}

/// The credential source and transport URL for one attempt against a repo.
#[derive(Debug, Clone)]
pub struct Transport {
    pub cred: CredSource,
    pub url: String,
}

/// The HTTPS transport URL of a repository identifier.
pub fn https_url(repo: &str) -> String {
    format!("https://{repo}.git")
}

/// The SSH transport URL of a repository identifier.
pub fn ssh_url(repo: &str) -> String {
    format!("ssh://{repo}.git")
}

fn host_of(repo: &str) -> &str {
    repo.split('/').next().unwrap_or(repo)
}

impl Authenticator {
    /// The method name used in exhaustion error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Authenticator::SshAgent => "ssh-agent",
            Authenticator::SshKeys(_) => "ssh key",
            Authenticator::Basic(_) => "basic auth",
            Authenticator::Token(_) => "token",
            Authenticator::Anonymous => "anonymous",
            Authenticator::Local => "local path",
        }
    }

    /// The credentials and transport URL to attempt for `repo`.
    ///
    /// Host-keyed entries with no material for the repo's host fall back to
    /// an anonymous attempt over the method's transport.
    pub fn transport(&self, repo: &str) -> Transport {
        let host = host_of(repo);
        match self {
            Authenticator::SshAgent => Transport {
                cred: CredSource::SshAgent,
                url: ssh_url(repo),
            },
            Authenticator::SshKeys(keys) => Transport {
                cred: keys
                    .get(host)
                    .map(|k| CredSource::SshKeyFile {
                        key: k.private_key.clone(),
                        passphrase: k.passphrase.clone(),
                    })
                    .unwrap_or(CredSource::None),
                url: ssh_url(repo),
            },
            Authenticator::Basic(creds) | Authenticator::Token(creds) => Transport {
                cred: creds
                    .get(host)
                    .map(|c| CredSource::UserPass {
                        username: c.username.clone(),
                        password: c.password.clone(),
                    })
                    .unwrap_or(CredSource::None),
                url: https_url(repo),
            },
            Authenticator::Anonymous => Transport {
                cred: CredSource::None,
                url: https_url(repo),
            },
            Authenticator::Local => Transport {
                cred: CredSource::None,
                url: repo.to_string(),
            },
        }
    }
}

impl CredSource {
    /// Remote callbacks performing a single credential attempt.
    ///
    /// libgit2 re-invokes the credential callback after a rejection; the
    /// attempt guard stops the second invocation so the chain moves on to
    /// its next entry instead of looping.
    pub fn remote_callbacks(&self) -> RemoteCallbacks<'static> {
        let mut callbacks = RemoteCallbacks::new();
        let source = self.clone();
        let attempted = Cell::new(false);
        callbacks.credentials(move |_url, username_from_url, _allowed| {
            if attempted.replace(true) {
                return Err(git2::Error::from_str("authentication rejected"));
            }
            let username = username_from_url.unwrap_or("git");
            match &source {
                CredSource::SshAgent => Cred::ssh_key_from_agent(username),
                CredSource::SshKeyFile { key, passphrase } => {
                    Cred::ssh_key(username, None, key, passphrase.as_deref())
                }
                CredSource::UserPass { username, password } => {
                    Cred::userpass_plaintext(username, password)
                }
                CredSource::None => Cred::default(),
            }
        });
        callbacks
    }
}

/// Builds the authentication chain for the given options.
///
/// The order is fixed: ssh-agent (when an agent socket is present), ssh
/// keys, basic auth, tokens, anonymous, then local paths when allowed.
pub fn build_chain(options: Option<&AuthOptions>) -> Vec<Authenticator> {
    let mut chain = Vec::new();

    if std::env::var_os("SSH_AUTH_SOCK").is_some() {
        chain.push(Authenticator::SshAgent);
    } else {
        log::debug!("no ssh-agent socket found, skipping ssh-agent auth");
    }

    if let Some(options) = options {
        if !options.ssh_keys.is_empty() {
            chain.push(Authenticator::SshKeys(options.ssh_keys.clone()));
        }
        if !options.credentials.is_empty() {
            chain.push(Authenticator::Basic(options.credentials.clone()));
        }
        if !options.tokens.is_empty() {
            let creds = options
                .tokens
                .iter()
                .map(|(host, token)| {
                    (
                        host.clone(),
                        Credential {
                            username: TOKEN_USERNAME.to_string(),
                            password: token.clone(),
                        },
                    )
                })
                .collect();
            chain.push(Authenticator::Token(creds));
        }
    }

    chain.push(Authenticator::Anonymous);

    if options.is_some_and(|o| o.allow_local) {
        chain.push(Authenticator::Local);
    }

    chain
}
