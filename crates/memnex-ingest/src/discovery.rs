//! Discovery of session files under the assistant's project log root.
//!
//! Layout on disk: `<root>/<encoded-project-dir>/<session-id>.jsonl`.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// One discovered session file with the metadata incremental sync keys on.
#[derive(Debug, Clone)]
pub struct SessionFile {
    pub path: PathBuf,
    pub project_dir: String,
    pub session_id: String,
    pub mtime_unix: i64,
    pub size_bytes: i64,
}

/// The source collaborator the sync pipeline discovers files through.
pub trait SessionSource {
    fn discover(&self) -> Result<Vec<SessionFile>>;
}

/// Filesystem-backed source rooted at the assistant's log directory.
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn probe(path: &Path) -> bool {
        path.is_file() && path.extension().is_some_and(|ext| ext == "jsonl")
    }
}

impl SessionSource for FsSource {
    fn discover(&self) -> Result<Vec<SessionFile>> {
        if !self.root.is_dir() {
            return Err(Error::Source(format!(
                "session log root not found: {}",
                self.root.display()
            )));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !Self::probe(path) {
                continue;
            }

            let Some(project_dir) = path
                .parent()
                .and_then(|parent| parent.file_name())
                .and_then(|name| name.to_str())
            else {
                continue;
            };
            let Some(session_id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let metadata = std::fs::metadata(path)?;
            if metadata.len() == 0 {
                continue;
            }
            let mtime_unix = metadata
                .modified()?
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);

            files.push(SessionFile {
                path: path.to_path_buf(),
                project_dir: project_dir.to_string(),
                session_id: session_id.to_string(),
                mtime_unix,
                size_bytes: metadata.len() as i64,
            });
        }

        // Stable order so runs over the same corpus visit files identically.
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}
