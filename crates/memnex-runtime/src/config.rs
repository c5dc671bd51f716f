//! Optional user configuration at `<data>/config.json`.
//!
//! Missing file or missing keys fall back to defaults; unknown keys are
//! ignored on load and reported by doctor.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserConfig {
    pub auto_sync: bool,
    pub sync_on_compaction: bool,
    pub recovery_on_startup: bool,
    /// Operation timeout in milliseconds.
    pub timeout: u64,
    pub log_level: LogLevel,
    pub show_failures: bool,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            auto_sync: false,
            sync_on_compaction: false,
            recovery_on_startup: true,
            timeout: 30_000,
            log_level: LogLevel::Info,
            show_failures: true,
        }
    }
}

impl UserConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: UserConfig = serde_json::from_str(&content)
            .map_err(|err| Error::Config(format!("{}: {}", path.display(), err)))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Non-fatal issues with an on-disk config file, for doctor.
    ///
    /// Unrecognized keys are issues, not errors: load() drops them
    /// silently, so this is the one place a typo becomes visible.
    pub fn inspect(path: &Path) -> (bool, Vec<String>) {
        const KNOWN_KEYS: [&str; 6] = [
            "autoSync",
            "syncOnCompaction",
            "recoveryOnStartup",
            "timeout",
            "logLevel",
            "showFailures",
        ];

        if !path.exists() {
            return (true, Vec::new());
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => return (false, vec![format!("unreadable: {}", err)]),
        };

        let raw: serde_json::Value = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(err) => return (false, vec![format!("invalid JSON: {}", err)]),
        };

        match serde_json::from_value::<UserConfig>(raw.clone()) {
            Ok(config) => {
                let mut issues = Vec::new();
                if let Some(object) = raw.as_object() {
                    for key in object.keys() {
                        if !KNOWN_KEYS.contains(&key.as_str()) {
                            issues.push(format!("unrecognized key '{}'", key));
                        }
                    }
                }
                if config.timeout == 0 {
                    issues.push("timeout of 0 disables every operation".to_string());
                }
                (issues.is_empty(), issues)
            }
            Err(err) => (false, vec![format!("invalid JSON: {}", err)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = UserConfig::load_from(&temp.path().join("config.json")).unwrap();
        assert!(!config.auto_sync);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.timeout, 30_000);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"autoSync": true, "logLevel": "debug"}"#).unwrap();

        let config = UserConfig::load_from(&path).unwrap();
        assert!(config.auto_sync);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert!(config.show_failures);
    }

    #[test]
    fn test_save_and_reload_round_trips() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        let mut config = UserConfig::default();
        config.sync_on_compaction = true;
        config.save_to(&path).unwrap();

        let loaded = UserConfig::load_from(&path).unwrap();
        assert!(loaded.sync_on_compaction);
    }

    #[test]
    fn test_inspect_flags_unknown_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"autoSync": true, "bogusKey": 123, "logLevl": "debug"}"#)
            .unwrap();

        // load() still succeeds; the typos only surface through inspect().
        let config = UserConfig::load_from(&path).unwrap();
        assert!(config.auto_sync);
        assert_eq!(config.log_level, LogLevel::Info);

        let (valid, issues) = UserConfig::inspect(&path);
        assert!(!valid);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().any(|issue| issue.contains("bogusKey")));
        assert!(issues.iter().any(|issue| issue.contains("logLevl")));
    }

    #[test]
    fn test_inspect_accepts_known_keys_only() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"autoSync": false, "syncOnCompaction": true, "recoveryOnStartup": true,
                "timeout": 5000, "logLevel": "warn", "showFailures": false}"#,
        )
        .unwrap();

        let (valid, issues) = UserConfig::inspect(&path);
        assert!(valid, "unexpected issues: {:?}", issues);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{nope").unwrap();
        assert!(matches!(
            UserConfig::load_from(&path),
            Err(Error::Config(_))
        ));

        let (valid, issues) = UserConfig::inspect(&path);
        assert!(!valid);
        assert_eq!(issues.len(), 1);
    }
}
