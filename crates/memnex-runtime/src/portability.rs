//! Backup export and import.
//!
//! The export buffers the whole corpus in memory; corpora are personal
//! scale and the round-trip contract is the constraint, not throughput.

use chrono::Utc;
use memnex_store::Store;
use memnex_store::queries::{extraction, link, message, session, tool_use};
use memnex_types::{ExtractionState, LinkRecord, MessageRecord, SessionRecord, ToolUseRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::{Error, Result};

pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFile {
    pub version: String,
    pub exported_at: String,
    pub sessions: Vec<SessionRecord>,
    pub messages: Vec<MessageRecord>,
    pub tool_uses: Vec<ToolUseRecord>,
    /// Reserved collections kept for format compatibility; the store owns
    /// no entity tables, so these round-trip as-is.
    #[serde(default)]
    pub entities: Vec<Value>,
    pub links: Vec<LinkRecord>,
    #[serde(default)]
    pub session_entities: Vec<Value>,
    #[serde(default)]
    pub entity_links: Vec<Value>,
    pub extraction_states: Vec<ExtractionState>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub sessions: usize,
    pub messages: usize,
    pub tool_uses: usize,
    pub links: usize,
    pub extraction_states: usize,
}

/// Write the full corpus to `path` as one JSON document.
pub fn export_store(store: &Store, path: &Path) -> Result<ExportFile> {
    let conn = store.conn();
    let export = ExportFile {
        version: EXPORT_VERSION.to_string(),
        exported_at: Utc::now().to_rfc3339(),
        sessions: session::all(conn)?,
        messages: message::all(conn)?,
        tool_uses: tool_use::all(conn)?,
        entities: Vec::new(),
        links: link::all(conn)?,
        session_entities: Vec::new(),
        entity_links: Vec::new(),
        extraction_states: extraction::all(conn)?,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, &export)?;
    Ok(export)
}

/// Load an export file into the store. `clear` empties every table first;
/// without it, imported rows upsert over existing ids.
pub fn import_store(store: &mut Store, path: &Path, clear: bool) -> Result<ImportReport> {
    let content = std::fs::read_to_string(path)?;
    let export: ExportFile = serde_json::from_str(&content)?;

    if export.version != EXPORT_VERSION {
        return Err(Error::InvalidArgument(format!(
            "unsupported export version '{}' (expected {})",
            export.version, EXPORT_VERSION
        )));
    }

    let report = store.transaction(|tx| {
        if clear {
            tx.execute_batch(
                r#"
                DELETE FROM links;
                DELETE FROM tool_uses;
                DELETE FROM messages;
                DELETE FROM extraction_state;
                DELETE FROM sessions;
                "#,
            )
            .map_err(Error::from)?;
        }

        for record in &export.sessions {
            session::upsert(tx, record)?;
        }
        message::upsert_batch(tx, &export.messages)?;
        tool_use::upsert_batch(tx, &export.tool_uses)?;
        for record in &export.links {
            link::upsert(tx, record)?;
        }
        for record in &export.extraction_states {
            extraction::upsert(tx, record)?;
        }

        // Imported sessions carry their own cached counts; recompute so the
        // cache matches the rows that actually landed.
        for record in &export.sessions {
            message::refresh_session_count(tx, &record.id)?;
        }

        Ok::<_, Error>(ImportReport {
            sessions: export.sessions.len(),
            messages: export.messages.len(),
            tool_uses: export.tool_uses.len(),
            links: export.links.len(),
            extraction_states: export.extraction_states.len(),
        })
    })?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use memnex_types::{NodeType, Role, ToolStatus};
    use tempfile::TempDir;

    fn ts(text: &str) -> chrono::DateTime<Utc> {
        DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
    }

    fn seed(store: &Store) {
        session::upsert(
            store.conn(),
            &SessionRecord {
                id: "s1".to_string(),
                project_path: "/home/dev/p".to_string(),
                project_dir: "-home-dev-p".to_string(),
                project_name: "p".to_string(),
                start_time: ts("2025-01-01T00:00:00Z"),
                end_time: Some(ts("2025-01-01T01:00:00Z")),
                message_count: 1,
                summary: Some("seeded".to_string()),
                updated_at: ts("2025-01-01T01:00:00Z"),
            },
        )
        .unwrap();
        message::upsert_batch(
            store.conn(),
            &[MessageRecord {
                id: "m1".to_string(),
                session_id: "s1".to_string(),
                role: Role::User,
                content: "round trip me".to_string(),
                timestamp: ts("2025-01-01T00:00:00Z"),
                parent_id: None,
                is_sidechain: false,
            }],
        )
        .unwrap();
        tool_use::upsert_batch(
            store.conn(),
            &[ToolUseRecord {
                id: "t1".to_string(),
                session_id: "s1".to_string(),
                message_id: Some("m1".to_string()),
                name: "bash".to_string(),
                input: serde_json::json!({"command": "ls"}),
                result: Some("ok".to_string()),
                status: ToolStatus::Success,
                timestamp: ts("2025-01-01T00:00:30Z"),
                duration_ms: Some(10),
            }],
        )
        .unwrap();
        link::upsert(
            store.conn(),
            &LinkRecord {
                source_type: NodeType::Session,
                source_id: "s1".to_string(),
                target_type: NodeType::Topic,
                target_id: "backups".to_string(),
                relationship: "discusses".to_string(),
                weight: 1.0,
                created_at: ts("2025-01-01T00:00:00Z"),
            },
        )
        .unwrap();
        extraction::upsert(
            store.conn(),
            &ExtractionState {
                file_path: "/logs/s1.jsonl".to_string(),
                mtime_unix: 7,
                size_bytes: 99,
                last_line: 3,
                last_extracted_at: ts("2025-01-01T01:00:00Z"),
                session_id: Some("s1".to_string()),
                status: memnex_types::ExtractionStatus::Complete,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_round_trip_equality() {
        let temp = TempDir::new().unwrap();
        let export_path = temp.path().join("backup.json");

        let source = Store::open_in_memory().unwrap();
        seed(&source);
        export_store(&source, &export_path).unwrap();

        let mut target = Store::open_in_memory().unwrap();
        let report = import_store(&mut target, &export_path, true).unwrap();
        assert_eq!(report.sessions, 1);
        assert_eq!(report.messages, 1);

        // Equality over every entity table.
        let source_conn = source.conn();
        let target_conn = target.conn();
        assert_eq!(
            serde_json::to_string(&session::all(source_conn).unwrap()).unwrap(),
            serde_json::to_string(&session::all(target_conn).unwrap()).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&message::all(source_conn).unwrap()).unwrap(),
            serde_json::to_string(&message::all(target_conn).unwrap()).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&tool_use::all(source_conn).unwrap()).unwrap(),
            serde_json::to_string(&tool_use::all(target_conn).unwrap()).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&link::all(source_conn).unwrap()).unwrap(),
            serde_json::to_string(&link::all(target_conn).unwrap()).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&extraction::all(source_conn).unwrap()).unwrap(),
            serde_json::to_string(&extraction::all(target_conn).unwrap()).unwrap()
        );

        // Imported messages are searchable through the shadow.
        let outcome = memnex_store::search::search(
            target_conn,
            "round",
            &memnex_store::SearchOptions::with_limit(5),
        )
        .unwrap();
        assert_eq!(outcome.hits.len(), 1);
    }

    #[test]
    fn test_import_with_clear_replaces_existing() {
        let temp = TempDir::new().unwrap();
        let export_path = temp.path().join("backup.json");

        let source = Store::open_in_memory().unwrap();
        seed(&source);
        export_store(&source, &export_path).unwrap();

        let mut target = Store::open_in_memory().unwrap();
        session::upsert(
            target.conn(),
            &SessionRecord {
                id: "stale".to_string(),
                project_path: "/stale".to_string(),
                project_dir: "-stale".to_string(),
                project_name: "stale".to_string(),
                start_time: ts("2020-01-01T00:00:00Z"),
                end_time: None,
                message_count: 0,
                summary: None,
                updated_at: ts("2020-01-01T00:00:00Z"),
            },
        )
        .unwrap();

        import_store(&mut target, &export_path, true).unwrap();
        assert!(session::get(target.conn(), "stale").unwrap().is_none());
        assert!(session::get(target.conn(), "s1").unwrap().is_some());
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"version":"9.9","exportedAt":"now","sessions":[],"messages":[],"toolUses":[],"links":[],"extractionStates":[]}"#,
        )
        .unwrap();

        let mut store = Store::open_in_memory().unwrap();
        assert!(matches!(
            import_store(&mut store, &path, false),
            Err(Error::InvalidArgument(_))
        ));
    }
}
