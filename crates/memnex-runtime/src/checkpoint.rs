//! Persistence for sync progress across runs.
//!
//! One checkpoint file, written atomically after every completed session
//! file. A checkpoint that fails to parse is treated as absent and moved
//! aside rather than deleted.

use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncCheckpoint {
    pub run_id: String,
    pub total: usize,
    pub completed: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncCheckpoint {
    pub fn new(total: usize) -> Self {
        let now = Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            total,
            completed: Vec::new(),
            started_at: now,
            updated_at: now,
        }
    }

    pub fn mark_completed(&mut self, file_path: String) {
        self.completed.push(file_path);
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointManager {
    path: PathBuf,
}

impl CheckpointManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Atomic save: write a temp file next to the target, then rename.
    pub fn save(&self, checkpoint: &SyncCheckpoint) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(checkpoint)?;
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Returns the checkpoint iff the file exists and parses. A corrupt
    /// file is renamed aside with a timestamp suffix and reported absent.
    pub fn load(&self) -> Option<SyncCheckpoint> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(checkpoint) => Some(checkpoint),
            Err(_) => {
                let aside = {
                    let mut name = self.path.as_os_str().to_os_string();
                    name.push(format!(".corrupt.{}", Utc::now().format("%Y%m%d%H%M%S")));
                    PathBuf::from(name)
                };
                let _ = std::fs::rename(&self.path, aside);
                None
            }
        }
    }

    /// Remove the checkpoint; idempotent.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
