use rusqlite::{Connection, Row, params};
use std::str::FromStr;

use super::{fmt_ts, parse_ts};
use crate::Result;
use memnex_types::{ExtractionState, ExtractionStatus};

pub fn upsert(conn: &Connection, state: &ExtractionState) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO extraction_state (file_path, mtime_unix, size_bytes, last_line,
                                      last_extracted_at, session_id, status)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(file_path) DO UPDATE SET
            mtime_unix = ?2,
            size_bytes = ?3,
            last_line = ?4,
            last_extracted_at = ?5,
            session_id = COALESCE(?6, session_id),
            status = ?7
        "#,
        params![
            &state.file_path,
            state.mtime_unix,
            state.size_bytes,
            state.last_line,
            fmt_ts(&state.last_extracted_at),
            &state.session_id,
            state.status.as_str(),
        ],
    )?;
    Ok(())
}

fn row_to_state(row: &Row<'_>) -> rusqlite::Result<ExtractionState> {
    let status_text: String = row.get(6)?;
    Ok(ExtractionState {
        file_path: row.get(0)?,
        mtime_unix: row.get(1)?,
        size_bytes: row.get(2)?,
        last_line: row.get(3)?,
        last_extracted_at: parse_ts(&row.get::<_, String>(4)?),
        session_id: row.get(5)?,
        status: ExtractionStatus::from_str(&status_text).unwrap_or(ExtractionStatus::Pending),
    })
}

const STATE_COLUMNS: &str =
    "file_path, mtime_unix, size_bytes, last_line, last_extracted_at, session_id, status";

pub fn get(conn: &Connection, file_path: &str) -> Result<Option<ExtractionState>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM extraction_state WHERE file_path = ?1",
        STATE_COLUMNS
    ))?;
    let mut rows = stmt.query([file_path])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_state(row)?)),
        None => Ok(None),
    }
}

pub fn delete_for_sessions(conn: &Connection, session_ids: &[String]) -> Result<usize> {
    let mut deleted = 0;
    let mut stmt = conn.prepare_cached("DELETE FROM extraction_state WHERE session_id = ?1")?;
    for id in session_ids {
        deleted += stmt.execute([id])?;
    }
    Ok(deleted)
}

pub fn all(conn: &Connection) -> Result<Vec<ExtractionState>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM extraction_state ORDER BY file_path",
        STATE_COLUMNS
    ))?;
    let states = stmt
        .query_map([], row_to_state)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(states)
}

pub fn count(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM extraction_state", [], |row| row.get(0))?;
    Ok(count)
}
