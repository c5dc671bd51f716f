use rusqlite::{Connection, Row, params};
use std::str::FromStr;

use super::{fmt_ts, parse_ts};
use crate::Result;
use memnex_types::{ToolStatus, ToolUseRecord};

pub fn upsert_batch(conn: &Connection, tool_uses: &[ToolUseRecord]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        r#"
        INSERT INTO tool_uses (id, session_id, message_id, name, input, result,
                               status, timestamp, duration_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(id) DO UPDATE SET
            session_id = ?2,
            message_id = ?3,
            name = ?4,
            input = ?5,
            result = COALESCE(?6, result),
            status = ?7,
            timestamp = ?8,
            duration_ms = COALESCE(?9, duration_ms)
        "#,
    )?;

    for tool_use in tool_uses {
        let input_text = serde_json::to_string(&tool_use.input).unwrap_or_else(|_| "{}".to_string());
        stmt.execute(params![
            &tool_use.id,
            &tool_use.session_id,
            &tool_use.message_id,
            &tool_use.name,
            input_text,
            &tool_use.result,
            tool_use.status.as_str(),
            fmt_ts(&tool_use.timestamp),
            tool_use.duration_ms,
        ])?;
    }

    Ok(tool_uses.len())
}

/// Fill in the result of an already persisted tool use.
pub fn update_result(
    conn: &Connection,
    tool_use_id: &str,
    result: &str,
    status: ToolStatus,
    duration_ms: Option<i64>,
) -> Result<()> {
    conn.execute(
        r#"
        UPDATE tool_uses
        SET result = ?2, status = ?3, duration_ms = COALESCE(?4, duration_ms)
        WHERE id = ?1
        "#,
        params![tool_use_id, result, status.as_str(), duration_ms],
    )?;
    Ok(())
}

fn row_to_tool_use(row: &Row<'_>) -> rusqlite::Result<ToolUseRecord> {
    let input_text: String = row.get(4)?;
    let status_text: String = row.get(6)?;
    Ok(ToolUseRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        message_id: row.get(2)?,
        name: row.get(3)?,
        input: serde_json::from_str(&input_text).unwrap_or(serde_json::Value::Null),
        result: row.get(5)?,
        status: ToolStatus::from_str(&status_text).unwrap_or(ToolStatus::Pending),
        timestamp: parse_ts(&row.get::<_, String>(7)?),
        duration_ms: row.get(8)?,
    })
}

const TOOL_USE_COLUMNS: &str =
    "id, session_id, message_id, name, input, result, status, timestamp, duration_ms";

pub fn list_for_session(conn: &Connection, session_id: &str) -> Result<Vec<ToolUseRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tool_uses WHERE session_id = ?1 ORDER BY timestamp ASC, id ASC",
        TOOL_USE_COLUMNS
    ))?;
    let tool_uses = stmt
        .query_map([session_id], row_to_tool_use)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(tool_uses)
}

pub fn all(conn: &Connection) -> Result<Vec<ToolUseRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tool_uses ORDER BY id",
        TOOL_USE_COLUMNS
    ))?;
    let tool_uses = stmt
        .query_map([], row_to_tool_use)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(tool_uses)
}

pub fn count(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM tool_uses", [], |row| row.get(0))?;
    Ok(count)
}
