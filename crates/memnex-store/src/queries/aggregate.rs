//! Read-only rollups backing `stats` and `context`.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use super::{fmt_ts, parse_ts};
use crate::Result;

/// Whole-store totals.
#[derive(Debug, Clone)]
pub struct StoreTotals {
    pub sessions: i64,
    pub messages: i64,
    pub tool_uses: i64,
    pub links: i64,
}

/// Per-project rollup for the stats view.
#[derive(Debug, Clone)]
pub struct ProjectStat {
    pub project_name: String,
    pub project_path: String,
    pub session_count: i64,
    pub message_count: i64,
    pub last_activity: Option<DateTime<Utc>>,
}

pub fn totals(conn: &Connection) -> Result<StoreTotals> {
    Ok(StoreTotals {
        sessions: super::session::count(conn)?,
        messages: super::message::count(conn)?,
        tool_uses: super::tool_use::count(conn)?,
        links: super::link::count(conn)?,
    })
}

pub fn project_stats(conn: &Connection, limit: usize) -> Result<Vec<ProjectStat>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT project_name, project_path, COUNT(*) AS sessions,
               SUM(message_count) AS messages,
               MAX(COALESCE(end_time, start_time)) AS last_activity
        FROM sessions
        GROUP BY project_path
        ORDER BY messages DESC, project_name ASC
        LIMIT ?1
        "#,
    )?;

    let stats = stmt
        .query_map([limit as i64], |row| {
            Ok(ProjectStat {
                project_name: row.get(0)?,
                project_path: row.get(1)?,
                session_count: row.get(2)?,
                message_count: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                last_activity: row.get::<_, Option<String>>(4)?.map(|s| parse_ts(&s)),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(stats)
}

/// Ids of sessions whose decoded project name contains `substring`
/// (case-insensitive), optionally bounded to a start-time window.
pub fn session_ids_for_project(
    conn: &Connection,
    substring: &str,
    since: Option<&DateTime<Utc>>,
) -> Result<Vec<String>> {
    let sql = match since {
        Some(_) => {
            "SELECT id FROM sessions
             WHERE instr(lower(project_name), ?1) > 0 AND start_time >= ?2
             ORDER BY start_time DESC"
        }
        None => {
            "SELECT id FROM sessions
             WHERE instr(lower(project_name), ?1) > 0
             ORDER BY start_time DESC"
        }
    };

    let mut stmt = conn.prepare(sql)?;
    let needle = substring.to_lowercase();
    let ids = match since {
        Some(since) => stmt
            .query_map(params![needle, fmt_ts(since)], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?,
        None => stmt
            .query_map(params![needle], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?,
    };
    Ok(ids)
}

/// Identity of the most recently active matching project.
pub fn project_identity(
    conn: &Connection,
    substring: &str,
) -> Result<Option<(String, String)>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT project_name, project_path
        FROM sessions
        WHERE instr(lower(project_name), ?1) > 0
        ORDER BY COALESCE(end_time, start_time) DESC
        LIMIT 1
        "#,
    )?;
    let mut rows = stmt.query([substring.to_lowercase()])?;
    match rows.next()? {
        Some(row) => Ok(Some((row.get(0)?, row.get(1)?))),
        None => Ok(None),
    }
}

/// (total, user, assistant) message counts over a session set.
pub fn message_role_counts(
    conn: &Connection,
    session_ids: &[String],
) -> Result<(i64, i64, i64)> {
    if session_ids.is_empty() {
        return Ok((0, 0, 0));
    }
    let placeholders = placeholder_list(session_ids.len());
    let sql = format!(
        r#"
        SELECT COUNT(*),
               SUM(CASE WHEN role = 'user' THEN 1 ELSE 0 END),
               SUM(CASE WHEN role = 'assistant' THEN 1 ELSE 0 END)
        FROM messages
        WHERE session_id IN ({})
        "#,
        placeholders
    );
    let mut stmt = conn.prepare(&sql)?;
    let counts = stmt.query_row(rusqlite::params_from_iter(session_ids.iter()), |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, Option<i64>>(1)?.unwrap_or(0),
            row.get::<_, Option<i64>>(2)?.unwrap_or(0),
        ))
    })?;
    Ok(counts)
}

/// Tool names by invocation count over a session set.
pub fn top_tools(
    conn: &Connection,
    session_ids: &[String],
    limit: usize,
) -> Result<Vec<(String, i64)>> {
    if session_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = placeholder_list(session_ids.len());
    let sql = format!(
        r#"
        SELECT name, COUNT(*) AS uses
        FROM tool_uses
        WHERE session_id IN ({})
        GROUP BY name
        ORDER BY uses DESC, name ASC
        LIMIT {}
        "#,
        placeholders, limit
    );
    let mut stmt = conn.prepare(&sql)?;
    let tools = stmt
        .query_map(rusqlite::params_from_iter(session_ids.iter()), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(tools)
}

/// Most recent activity instant over a session set.
pub fn last_activity(
    conn: &Connection,
    session_ids: &[String],
) -> Result<Option<DateTime<Utc>>> {
    if session_ids.is_empty() {
        return Ok(None);
    }
    let placeholders = placeholder_list(session_ids.len());
    let sql = format!(
        "SELECT MAX(COALESCE(end_time, start_time)) FROM sessions WHERE id IN ({})",
        placeholders
    );
    let mut stmt = conn.prepare(&sql)?;
    let last: Option<String> =
        stmt.query_row(rusqlite::params_from_iter(session_ids.iter()), |row| {
            row.get(0)
        })?;
    Ok(last.map(|s| parse_ts(&s)))
}

fn placeholder_list(len: usize) -> String {
    (1..=len)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}
