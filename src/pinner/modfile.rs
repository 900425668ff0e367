//! The YAML module file recording pinned repository versions.
//!
//! ```yaml
//! imports:
//!   github.com/foo/bar:
//!     ref: master
//!     pinned: 433416d690dbffc8fe321e12bdd4f21d79e2a479
//! ```
//!
//! `ref` is omitted for pins made against HEAD. In-memory state sits behind
//! a reader/writer lock; saves go through a temp file and an atomic rename.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::PinError;

/// One pinned dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// The symbolic reference the pin was made against, absent for HEAD.
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// The pinned commit hash.
    pub pinned: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    imports: BTreeMap<String, Import>,
}

/// The module file plus its in-memory state.
#[derive(Debug)]
pub struct ModFile {
    path: PathBuf,
    state: RwLock<Document>,
}

impl ModFile {
    /// Loads the module file, or starts empty when it does not exist yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<ModFile, PinError> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_yaml::from_str(&raw).map_err(|source| PinError::InvalidMod {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Document::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(ModFile {
            path,
            state: RwLock::new(state),
        })
    }

    /// The file this state persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The pin recorded for `repo`, if any.
    pub fn get(&self, repo: &str) -> Option<Import> {
        self.state
            .read()
            .expect("mod file lock poisoned")
            .imports
            .get(repo)
            .cloned()
    }

    /// Records a pin for `repo`.
    pub fn set(&self, repo: &str, import: Import) {
        self.state
            .write()
            .expect("mod file lock poisoned")
            .imports
            .insert(repo.to_string(), import);
    }

    /// Persists the current state.
    ///
    /// Parent directories are created on demand; an empty imports map writes
    /// nothing.
    pub fn save(&self) -> Result<(), PinError> {
        // Exclusive for the whole write so concurrent saves cannot
        // interleave on the temp file.
        let state = self.state.write().expect("mod file lock poisoned");
        if state.imports.is_empty() {
            return Ok(());
        }
        let serialized = serde_yaml::to_string(&*state).map_err(|source| PinError::InvalidMod {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serialized)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
