//! Deletion of sessions past a retention cutoff, cascading through every
//! dependent table inside one transaction.

use chrono::{DateTime, Utc};
use memnex_store::Store;
use memnex_store::queries::session;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Clone, Serialize, Default)]
pub struct PurgeReport {
    pub cutoff: String,
    pub sessions_deleted: usize,
    pub messages_deleted: i64,
    pub tool_uses_deleted: i64,
    pub links_deleted: i64,
    pub dry_run: bool,
}

/// Delete every session whose last activity predates `cutoff`.
///
/// Dry run reports the same counts without deleting anything.
pub fn purge(store: &mut Store, cutoff: DateTime<Utc>, dry_run: bool) -> Result<PurgeReport> {
    let ids = session::ids_older_than(store.conn(), &cutoff)?;
    let (messages, tool_uses, links) = dependent_counts(store.conn(), &ids)?;

    let mut report = PurgeReport {
        cutoff: cutoff.to_rfc3339(),
        sessions_deleted: ids.len(),
        messages_deleted: messages,
        tool_uses_deleted: tool_uses,
        links_deleted: links,
        dry_run,
    };

    if dry_run || ids.is_empty() {
        return Ok(report);
    }

    let deleted = store.transaction(|tx| session::delete_by_ids(tx, &ids))?;
    report.sessions_deleted = deleted;
    Ok(report)
}

fn dependent_counts(
    conn: &rusqlite::Connection,
    session_ids: &[String],
) -> Result<(i64, i64, i64)> {
    if session_ids.is_empty() {
        return Ok((0, 0, 0));
    }

    let mut messages = 0i64;
    let mut tool_uses = 0i64;
    let mut links = 0i64;

    let mut message_stmt =
        conn.prepare_cached("SELECT COUNT(*) FROM messages WHERE session_id = ?1")?;
    let mut tool_stmt =
        conn.prepare_cached("SELECT COUNT(*) FROM tool_uses WHERE session_id = ?1")?;
    let mut link_stmt = conn.prepare_cached(
        "SELECT COUNT(*) FROM links
         WHERE (source_type = 'session' AND source_id = ?1)
            OR (target_type = 'session' AND target_id = ?1)",
    )?;

    for id in session_ids {
        messages += message_stmt
            .query_row([id], |row| row.get::<_, i64>(0))
            .map_err(memnex_store::Error::from)?;
        tool_uses += tool_stmt
            .query_row([id], |row| row.get::<_, i64>(0))
            .map_err(memnex_store::Error::from)?;
        links += link_stmt
            .query_row([id], |row| row.get::<_, i64>(0))
            .map_err(memnex_store::Error::from)?;
    }

    Ok((messages, tool_uses, links))
}

#[cfg(test)]
mod tests {
    use super::*;
    use memnex_store::queries::{extraction, link, message};
    use memnex_types::{
        ExtractionState, ExtractionStatus, LinkRecord, MessageRecord, NodeType, Role,
        SessionRecord,
    };

    fn ts(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
    }

    fn seed_session(store: &Store, id: &str, start: &str) {
        session::upsert(
            store.conn(),
            &SessionRecord {
                id: id.to_string(),
                project_path: "/home/dev/p".to_string(),
                project_dir: "-home-dev-p".to_string(),
                project_name: "p".to_string(),
                start_time: ts(start),
                end_time: None,
                message_count: 1,
                summary: None,
                updated_at: ts(start),
            },
        )
        .unwrap();
        message::upsert_batch(
            store.conn(),
            &[MessageRecord {
                id: format!("{}-m1", id),
                session_id: id.to_string(),
                role: Role::User,
                content: "hello".to_string(),
                timestamp: ts(start),
                parent_id: None,
                is_sidechain: false,
            }],
        )
        .unwrap();
        link::upsert(
            store.conn(),
            &LinkRecord {
                source_type: NodeType::Session,
                source_id: id.to_string(),
                target_type: NodeType::Topic,
                target_id: "cleanup".to_string(),
                relationship: "discusses".to_string(),
                weight: 1.0,
                created_at: ts(start),
            },
        )
        .unwrap();
        extraction::upsert(
            store.conn(),
            &ExtractionState {
                file_path: format!("/logs/{}.jsonl", id),
                mtime_unix: 0,
                size_bytes: 1,
                last_line: 1,
                last_extracted_at: ts(start),
                session_id: Some(id.to_string()),
                status: ExtractionStatus::Complete,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_purge_cascades_everything() {
        let mut store = Store::open_in_memory().unwrap();
        seed_session(&store, "old", "2024-01-01T00:00:00Z");
        seed_session(&store, "new", "2025-06-01T00:00:00Z");

        let report = purge(&mut store, ts("2025-01-01T00:00:00Z"), false).unwrap();
        assert_eq!(report.sessions_deleted, 1);
        assert_eq!(report.messages_deleted, 1);
        assert_eq!(report.links_deleted, 1);

        // Nothing may still reference the purged session.
        let conn = store.conn();
        let orphans: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM messages WHERE session_id = 'old'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);
        let link_orphans: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM links
                 WHERE source_id = 'old' OR target_id = 'old'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(link_orphans, 0);
        let state_orphans: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM extraction_state WHERE session_id = 'old'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(state_orphans, 0);

        // The newer session survives untouched.
        assert!(session::get(conn, "new").unwrap().is_some());
    }

    #[test]
    fn test_dry_run_deletes_nothing() {
        let mut store = Store::open_in_memory().unwrap();
        seed_session(&store, "old", "2024-01-01T00:00:00Z");

        let report = purge(&mut store, ts("2025-01-01T00:00:00Z"), true).unwrap();
        assert!(report.dry_run);
        assert_eq!(report.sessions_deleted, 1);
        assert!(session::get(store.conn(), "old").unwrap().is_some());
    }
}
