use crate::SessionFileBuilder;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temp-directory workspace laid out like the real one: a data dir for
/// the store and a source root holding encoded project directories.
pub struct TestWorld {
    temp: TempDir,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.temp.path().join("memory-nexus")
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join("memory.db")
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir().join("sync-checkpoint.json")
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.data_dir().join("logs").join("errors.log")
    }

    pub fn source_root(&self) -> PathBuf {
        self.temp.path().join("projects")
    }

    /// Place a built session file under the encoded directory for
    /// `project_path`, returning the file's location.
    pub fn add_session(
        &self,
        project_path: &str,
        session_id: &str,
        builder: &SessionFileBuilder,
    ) -> PathBuf {
        let encoded = memnex_core::path::encode(project_path);
        let path = self
            .source_root()
            .join(encoded)
            .join(format!("{}.jsonl", session_id));
        builder.write_to(&path).expect("write session file");
        path
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_places_sessions_under_encoded_dirs() {
        let world = TestWorld::new();
        let builder = SessionFileBuilder::new("sess-1").user("hello");
        let path = world.add_session("/home/dev/alpha", "sess-1", &builder);

        assert!(path.exists());
        assert!(path.to_string_lossy().contains("-home-dev-alpha"));
    }
}
