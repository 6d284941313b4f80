//! Configuration and constants

pub mod defaults;

use std::path::{Path, PathBuf};

/// Resolved runtime paths for one mortar invocation
///
/// Everything mortar touches on disk lives under `root`: the registry
/// store, install prefixes, and build scratch space. Recipes may live
/// anywhere and default to `<root>/recipes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Data root
    root: PathBuf,
    /// Recipe directory
    recipes_dir: PathBuf,
}

impl Settings {
    /// Resolve settings from CLI arguments and environment defaults.
    pub fn resolve(root: Option<PathBuf>, recipes: Option<PathBuf>) -> Self {
        let root = root.unwrap_or_else(default_root);
        let recipes_dir = recipes.unwrap_or_else(|| root.join("recipes"));
        Self { root, recipes_dir }
    }

    /// Create settings rooted at an explicit directory.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let recipes_dir = root.join("recipes");
        Self { root, recipes_dir }
    }

    /// Data root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding recipe files.
    pub fn recipes_dir(&self) -> &Path {
        &self.recipes_dir
    }

    /// Directory holding the registry store and lock.
    pub fn registry_dir(&self) -> PathBuf {
        self.root.join("registry")
    }

    /// Directory holding install prefixes.
    pub fn prefixes_dir(&self) -> PathBuf {
        self.root.join("prefixes")
    }

    /// Scratch directory for in-progress builds.
    pub fn build_dir(&self) -> PathBuf {
        self.root.join("build")
    }
}

/// Default data root: `~/.local/share/mortar` or a local fallback.
fn default_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("mortar")
}
