//! Store integrity and environment diagnostics.

use memnex_core::workspace::DataLayout;
use memnex_store::{IntegrityStatus, Store};
use serde::Serialize;
use std::path::Path;

use crate::Result;
use crate::config::UserConfig;

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseHealth {
    pub exists: bool,
    pub readable: bool,
    pub writable: bool,
    /// "ok", "corrupted" or "missing".
    pub integrity: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionsHealth {
    pub config_dir: bool,
    pub logs_dir: bool,
    pub source_dir: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HooksHealth {
    pub installed: bool,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigHealth {
    pub valid: bool,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub database: DatabaseHealth,
    pub permissions: PermissionsHealth,
    pub hooks: HooksHealth,
    pub config: ConfigHealth,
    pub fixed: Vec<String>,
}

impl HealthReport {
    pub fn healthy(&self) -> bool {
        self.database.integrity != "corrupted"
            && self.permissions.config_dir
            && self.permissions.logs_dir
            && self.config.valid
    }
}

/// Run the diagnostics. `fix` only creates missing directories; it never
/// touches data.
pub fn run_health_check(layout: &DataLayout, source_root: &Path, fix: bool) -> Result<HealthReport> {
    let mut fixed = Vec::new();

    if fix {
        for dir in [layout.root.clone(), layout.logs_dir()] {
            if !dir.exists() && std::fs::create_dir_all(&dir).is_ok() {
                fixed.push(format!("created {}", dir.display()));
            }
        }
    }

    let database = check_database(&layout.db_path());
    let permissions = PermissionsHealth {
        config_dir: dir_writable(&layout.root),
        logs_dir: dir_writable(&layout.logs_dir()),
        source_dir: source_root.is_dir(),
    };
    let hooks = check_hooks(layout);
    let (valid, issues) = UserConfig::inspect(&layout.config_path());

    Ok(HealthReport {
        database,
        permissions,
        hooks,
        config: ConfigHealth { valid, issues },
        fixed,
    })
}

fn check_database(db_path: &Path) -> DatabaseHealth {
    let Ok(metadata) = std::fs::metadata(db_path) else {
        return DatabaseHealth {
            exists: false,
            readable: false,
            writable: false,
            integrity: "missing".to_string(),
            size_bytes: 0,
        };
    };

    let readable = std::fs::File::open(db_path).is_ok();
    let writable = !metadata.permissions().readonly();
    let integrity = match Store::open(db_path) {
        Ok(store) => match store.quick_check() {
            Ok(IntegrityStatus::Ok) => "ok",
            _ => "corrupted",
        },
        Err(memnex_store::Error::Corrupted(_)) => "corrupted",
        Err(_) => "corrupted",
    };

    DatabaseHealth {
        exists: true,
        readable,
        writable,
        integrity: integrity.to_string(),
        size_bytes: metadata.len(),
    }
}

fn dir_writable(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    let probe = dir.join(".memnex-write-probe");
    match std::fs::write(&probe, b"probe") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

/// Hook surface is owned by the host assistant; diagnose only by
/// observation, never by editing its settings.
fn check_hooks(layout: &DataLayout) -> HooksHealth {
    let settings_path = dirs::home_dir()
        .map(|home| home.join(".claude").join("settings.json"))
        .filter(|path| path.is_file());

    let installed = settings_path
        .as_ref()
        .and_then(|path| std::fs::read_to_string(path).ok())
        .map(|content| content.contains("memnex"))
        .unwrap_or(false);

    let last_run = std::fs::metadata(layout.error_log_path())
        .and_then(|meta| meta.modified())
        .ok()
        .map(|mtime| chrono::DateTime::<chrono::Utc>::from(mtime).to_rfc3339());

    HooksHealth {
        installed,
        enabled: installed,
        last_run,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_database_reported() {
        let temp = TempDir::new().unwrap();
        let layout = DataLayout::new(temp.path().join("data"));
        layout.ensure_dirs().unwrap();

        let report = run_health_check(&layout, temp.path(), false).unwrap();
        assert!(!report.database.exists);
        assert_eq!(report.database.integrity, "missing");
        assert!(report.permissions.config_dir);
    }

    #[test]
    fn test_healthy_store_reports_ok() {
        let temp = TempDir::new().unwrap();
        let layout = DataLayout::new(temp.path().join("data"));
        layout.ensure_dirs().unwrap();
        drop(Store::open(&layout.db_path()).unwrap());

        let report = run_health_check(&layout, temp.path(), false).unwrap();
        assert!(report.database.exists);
        assert_eq!(report.database.integrity, "ok");
        assert!(report.database.size_bytes > 0);
        assert!(report.healthy());
    }

    #[test]
    fn test_corrupted_file_reported() {
        let temp = TempDir::new().unwrap();
        let layout = DataLayout::new(temp.path().join("data"));
        layout.ensure_dirs().unwrap();
        std::fs::write(layout.db_path(), "garbage that is not sqlite at all").unwrap();

        let report = run_health_check(&layout, temp.path(), false).unwrap();
        assert_eq!(report.database.integrity, "corrupted");
        assert!(!report.healthy());
    }

    #[test]
    fn test_fix_creates_missing_dirs_only() {
        let temp = TempDir::new().unwrap();
        let layout = DataLayout::new(temp.path().join("data"));

        let report = run_health_check(&layout, temp.path(), true).unwrap();
        assert!(!report.fixed.is_empty());
        assert!(layout.logs_dir().is_dir());
    }
}
