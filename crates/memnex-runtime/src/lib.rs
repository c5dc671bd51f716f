// Runtime layer: orchestrates ingestion into the store and serves the
// query surface. Single-process, single-writer, cooperative; long
// operations poll the lifecycle latch at natural boundaries.

pub mod checkpoint;
pub mod config;
pub mod context;
pub mod doctor;
mod error;
pub mod lifecycle;
pub mod logging;
pub mod portability;
pub mod purge;
pub mod sync;

pub use checkpoint::{CheckpointManager, SyncCheckpoint};
pub use config::{LogLevel, UserConfig};
pub use context::{ProjectContext, ToolCount};
pub use doctor::{HealthReport, run_health_check};
pub use error::{Error, Result};
pub use logging::ErrorLog;
pub use portability::{ExportFile, ImportReport, export_store, import_store};
pub use purge::PurgeReport;
pub use sync::{SyncErrorKind, SyncOptions, SyncProgress, SyncReport};

use memnex_core::workspace::DataLayout;
use memnex_store::Store;
use std::path::PathBuf;

/// Workspace facade: the data layout plus an open store handle.
pub struct Memnex {
    layout: DataLayout,
    store: Store,
}

impl Memnex {
    /// Open the workspace rooted at `data_dir`, creating directories and the
    /// store as needed. Corruption surfaces as an error here; recovery is
    /// the lifecycle controller's decision (see `lifecycle::recover_store`).
    pub fn open(data_dir: PathBuf) -> Result<Self> {
        let layout = DataLayout::new(data_dir);
        layout.ensure_dirs()?;
        let store = Store::open(&layout.db_path())?;
        Ok(Self { layout, store })
    }

    pub fn from_parts(layout: DataLayout, store: Store) -> Self {
        Self { layout, store }
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn checkpoints(&self) -> CheckpointManager {
        CheckpointManager::new(self.layout.checkpoint_path())
    }

    pub fn error_log(&self) -> ErrorLog {
        ErrorLog::new(self.layout.error_log_path())
    }

    pub fn user_config(&self) -> Result<UserConfig> {
        UserConfig::load_from(&self.layout.config_path())
    }

    pub fn close(self) -> Result<()> {
        self.store.close()?;
        Ok(())
    }
}
