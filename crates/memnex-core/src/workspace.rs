//! Resolution of the memnex data root and the assistant's session-log root.

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Resolve the memnex data directory based on priority:
/// 1. Explicit path (with tilde expansion)
/// 2. MEMNEX_PATH environment variable (with tilde expansion)
/// 3. ~/.memory-nexus
pub fn resolve_data_dir(explicit_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(expand_tilde(path));
    }

    if let Ok(env_path) = std::env::var("MEMNEX_PATH") {
        return Ok(expand_tilde(&env_path));
    }

    if let Some(home) = dirs::home_dir() {
        return Ok(home.join(".memory-nexus"));
    }

    Err(Error::Config(
        "Could not determine data directory: no home directory found".to_string(),
    ))
}

/// Resolve the session-log source root based on priority:
/// 1. Explicit path (with tilde expansion)
/// 2. MEMNEX_SOURCE environment variable (with tilde expansion)
/// 3. ~/.claude/projects
pub fn resolve_source_root(explicit_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(expand_tilde(path));
    }

    if let Ok(env_path) = std::env::var("MEMNEX_SOURCE") {
        return Ok(expand_tilde(&env_path));
    }

    if let Some(home) = dirs::home_dir() {
        return Ok(home.join(".claude").join("projects"));
    }

    Err(Error::Config(
        "Could not determine source root: no home directory found".to_string(),
    ))
}

/// Expand tilde (~) in paths to the user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(path)
}

/// Well-known file locations under the data directory.
pub struct DataLayout {
    pub root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join("memory.db")
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.root.join("sync-checkpoint.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.logs_dir().join("errors.log")
    }

    /// Create the root and logs directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

impl AsRef<Path> for DataLayout {
    fn as_ref(&self) -> &Path {
        &self.root
    }
}
