use rusqlite::{Connection, Row, params};
use std::str::FromStr;

use super::{fmt_ts, parse_ts};
use crate::Result;
use memnex_types::{MessageRecord, Role};

/// Insert a batch of messages, replacing rows with the same id.
///
/// The conflict path is an UPDATE (not OR REPLACE) so the FTS triggers see
/// every change; REPLACE would delete behind the index's back.
pub fn upsert_batch(conn: &Connection, messages: &[MessageRecord]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        r#"
        INSERT INTO messages (id, session_id, role, content, timestamp, parent_id, is_sidechain)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(id) DO UPDATE SET
            session_id = ?2,
            role = ?3,
            content = ?4,
            timestamp = ?5,
            parent_id = ?6,
            is_sidechain = ?7
        "#,
    )?;

    for message in messages {
        stmt.execute(params![
            &message.id,
            &message.session_id,
            message.role.as_str(),
            &message.content,
            fmt_ts(&message.timestamp),
            &message.parent_id,
            message.is_sidechain,
        ])?;
    }

    Ok(messages.len())
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    let role_text: String = row.get(2)?;
    Ok(MessageRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        role: Role::from_str(&role_text).unwrap_or(Role::System),
        content: row.get(3)?,
        timestamp: parse_ts(&row.get::<_, String>(4)?),
        parent_id: row.get(5)?,
        is_sidechain: row.get(6)?,
    })
}

const MESSAGE_COLUMNS: &str = "id, session_id, role, content, timestamp, parent_id, is_sidechain";

pub fn list_for_session(conn: &Connection, session_id: &str) -> Result<Vec<MessageRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM messages WHERE session_id = ?1 ORDER BY timestamp ASC, id ASC",
        MESSAGE_COLUMNS
    ))?;
    let messages = stmt
        .query_map([session_id], row_to_message)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(messages)
}

pub fn count_for_session(conn: &Connection, session_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE session_id = ?1",
        [session_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Recompute the session's cached message count from the source of truth.
pub fn refresh_session_count(conn: &Connection, session_id: &str) -> Result<()> {
    conn.execute(
        r#"
        UPDATE sessions
        SET message_count = (SELECT COUNT(*) FROM messages WHERE session_id = ?1)
        WHERE id = ?1
        "#,
        [session_id],
    )?;
    Ok(())
}

pub fn all(conn: &Connection) -> Result<Vec<MessageRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM messages ORDER BY id",
        MESSAGE_COLUMNS
    ))?;
    let messages = stmt
        .query_map([], row_to_message)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(messages)
}

pub fn count(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
    Ok(count)
}
