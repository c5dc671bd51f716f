//! Append-only JSONL error log with size rotation.
//!
//! Every surfaced error lands here with its stable code. Rotation happens
//! before append: at 10 MiB the current file shifts to `.1` and older
//! rotations shift up, keeping five.

use crate::Result;
use chrono::Utc;
use memnex_types::ErrorCode;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;

const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_ROTATIONS: u32 = 5;

#[derive(Debug, Serialize)]
struct LogEntry<'a> {
    timestamp: String,
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a Value>,
}

#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Append one entry; rotates first if the file is at the size cap.
    pub fn append(&self, code: ErrorCode, message: &str, context: Option<&Value>) -> Result<()> {
        self.rotate_if_needed()?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let entry = LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            code: code.as_str(),
            message,
            context,
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn rotate_if_needed(&self) -> Result<()> {
        let Ok(metadata) = std::fs::metadata(&self.path) else {
            return Ok(());
        };
        if metadata.len() < MAX_LOG_BYTES {
            return Ok(());
        }

        // Shift older rotations up; the oldest falls off.
        for index in (1..KEEP_ROTATIONS).rev() {
            let from = self.rotation_path(index);
            if from.exists() {
                std::fs::rename(&from, self.rotation_path(index + 1))?;
            }
        }
        std::fs::rename(&self.path, self.rotation_path(1))?;
        Ok(())
    }

    fn rotation_path(&self, index: u32) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }
}
