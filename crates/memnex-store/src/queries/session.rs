use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

use super::{fmt_ts, parse_ts};
use crate::Result;
use memnex_types::SessionRecord;

/// Sort order for session listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionSort {
    #[default]
    Recent,
    Oldest,
    Largest,
}

/// Filters for `list`.
#[derive(Debug, Default, Clone)]
pub struct SessionFilter {
    pub project: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub sort: SessionSort,
    pub limit: usize,
}

/// Result of resolving a session id prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixMatch {
    None,
    One(String),
    Many,
}

pub fn upsert(conn: &Connection, session: &SessionRecord) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO sessions (id, project_path, project_dir, project_name,
                              start_time, end_time, message_count, summary, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(id) DO UPDATE SET
            project_path = ?2,
            project_dir = ?3,
            project_name = ?4,
            start_time = ?5,
            end_time = COALESCE(?6, end_time),
            summary = COALESCE(?8, summary),
            updated_at = ?9
        "#,
        params![
            &session.id,
            &session.project_path,
            &session.project_dir,
            &session.project_name,
            fmt_ts(&session.start_time),
            session.end_time.as_ref().map(fmt_ts),
            session.message_count,
            &session.summary,
            fmt_ts(&session.updated_at),
        ],
    )?;

    Ok(())
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        id: row.get(0)?,
        project_path: row.get(1)?,
        project_dir: row.get(2)?,
        project_name: row.get(3)?,
        start_time: parse_ts(&row.get::<_, String>(4)?),
        end_time: row.get::<_, Option<String>>(5)?.map(|s| parse_ts(&s)),
        message_count: row.get(6)?,
        summary: row.get(7)?,
        updated_at: parse_ts(&row.get::<_, String>(8)?),
    })
}

const SESSION_COLUMNS: &str = "id, project_path, project_dir, project_name, \
                               start_time, end_time, message_count, summary, updated_at";

pub fn get(conn: &Connection, session_id: &str) -> Result<Option<SessionRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM sessions WHERE id = ?1",
        SESSION_COLUMNS
    ))?;

    let mut rows = stmt.query([session_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_session(row)?)),
        None => Ok(None),
    }
}

/// Resolve a session id prefix (supports short ids like "7f2abd2d").
pub fn find_by_prefix(conn: &Connection, prefix: &str) -> Result<PrefixMatch> {
    let mut stmt = conn.prepare("SELECT id FROM sessions WHERE id LIKE ?1 LIMIT 2")?;
    let pattern = format!("{}%", like_escape(prefix));
    let mut matches: Vec<String> = stmt
        .query_map([&pattern], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(match matches.len() {
        0 => PrefixMatch::None,
        1 => PrefixMatch::One(matches.remove(0)),
        _ => PrefixMatch::Many,
    })
}

fn like_escape(text: &str) -> String {
    text.replace('%', "").replace('_', "")
}

pub fn list(conn: &Connection, filter: &SessionFilter) -> Result<Vec<SessionRecord>> {
    let mut where_clauses: Vec<String> = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(project) = &filter.project {
        params.push(Box::new(project.to_lowercase()));
        where_clauses.push(format!(
            "instr(lower(project_name), ?{}) > 0",
            params.len()
        ));
    }
    if let Some(since) = &filter.since {
        params.push(Box::new(fmt_ts(since)));
        where_clauses.push(format!("start_time >= ?{}", params.len()));
    }
    if let Some(before) = &filter.before {
        params.push(Box::new(fmt_ts(before)));
        where_clauses.push(format!("start_time < ?{}", params.len()));
    }

    let where_clause = if where_clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", where_clauses.join(" AND "))
    };

    let order = match filter.sort {
        SessionSort::Recent => "start_time DESC",
        SessionSort::Oldest => "start_time ASC",
        SessionSort::Largest => "message_count DESC, start_time DESC",
    };

    params.push(Box::new(filter.limit as i64));
    let sql = format!(
        "SELECT {} FROM sessions {} ORDER BY {} LIMIT ?{}",
        SESSION_COLUMNS,
        where_clause,
        order,
        params.len()
    );

    let mut stmt = conn.prepare(&sql)?;
    let sessions = stmt
        .query_map(rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())), row_to_session)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(sessions)
}

/// Most recent sibling sessions sharing an encoded project directory.
pub fn ids_for_project_dir(
    conn: &Connection,
    project_dir: &str,
    exclude_id: &str,
    limit: usize,
) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        r#"
        SELECT id FROM sessions
        WHERE project_dir = ?1 AND id != ?2
        ORDER BY start_time DESC
        LIMIT ?3
        "#,
    )?;
    let ids = stmt
        .query_map(params![project_dir, exclude_id, limit as i64], |row| {
            row.get(0)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Sessions whose last activity predates `cutoff`.
pub fn ids_older_than(conn: &Connection, cutoff: &DateTime<Utc>) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM sessions WHERE COALESCE(end_time, start_time) < ?1 ORDER BY id",
    )?;
    let ids = stmt
        .query_map([fmt_ts(cutoff)], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Delete sessions and every dependent row.
///
/// Messages and tool uses cascade through foreign keys; links have
/// polymorphic endpoints and extraction state is keyed by file, so both are
/// cleaned explicitly inside the caller's transaction.
pub fn delete_by_ids(conn: &Connection, ids: &[String]) -> Result<usize> {
    let mut deleted = 0;
    let mut stmt = conn.prepare("DELETE FROM sessions WHERE id = ?1")?;
    for id in ids {
        deleted += stmt.execute([id])?;
    }
    super::link::delete_for_sessions(conn, ids)?;
    super::extraction::delete_for_sessions(conn, ids)?;
    Ok(deleted)
}

pub fn all(conn: &Connection) -> Result<Vec<SessionRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM sessions ORDER BY id",
        SESSION_COLUMNS
    ))?;
    let sessions = stmt
        .query_map([], row_to_session)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(sessions)
}

pub fn count(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;
    use chrono::TimeZone;

    fn session(id: &str, name: &str, start: &str, messages: i64) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            project_path: format!("/home/dev/{}", name),
            project_dir: format!("-home-dev-{}", name),
            project_name: name.to_string(),
            start_time: parse_ts(start),
            end_time: None,
            message_count: messages,
            summary: None,
            updated_at: parse_ts(start),
        }
    }

    #[test]
    fn test_upsert_then_get() {
        let store = Store::open_in_memory().unwrap();
        let record = session("s1", "alpha", "2025-01-01T10:00:00Z", 0);
        upsert(store.conn(), &record).unwrap();

        let loaded = get(store.conn(), "s1").unwrap().unwrap();
        assert_eq!(loaded.project_name, "alpha");
        assert_eq!(loaded.project_dir, "-home-dev-alpha");
    }

    #[test]
    fn test_upsert_preserves_end_time_when_absent() {
        let store = Store::open_in_memory().unwrap();
        let mut record = session("s1", "alpha", "2025-01-01T10:00:00Z", 0);
        record.end_time = Some(chrono::Utc.with_ymd_and_hms(2025, 1, 1, 11, 0, 0).unwrap());
        upsert(store.conn(), &record).unwrap();

        record.end_time = None;
        upsert(store.conn(), &record).unwrap();

        let loaded = get(store.conn(), "s1").unwrap().unwrap();
        assert!(loaded.end_time.is_some());
    }

    #[test]
    fn test_find_by_prefix() {
        let store = Store::open_in_memory().unwrap();
        upsert(store.conn(), &session("abc-123", "alpha", "2025-01-01T10:00:00Z", 0)).unwrap();
        upsert(store.conn(), &session("abd-456", "alpha", "2025-01-01T10:00:00Z", 0)).unwrap();

        assert_eq!(
            find_by_prefix(store.conn(), "abc").unwrap(),
            PrefixMatch::One("abc-123".to_string())
        );
        assert_eq!(find_by_prefix(store.conn(), "ab").unwrap(), PrefixMatch::Many);
        assert_eq!(find_by_prefix(store.conn(), "zzz").unwrap(), PrefixMatch::None);
    }

    #[test]
    fn test_list_filters_and_sorts() {
        let store = Store::open_in_memory().unwrap();
        upsert(store.conn(), &session("s1", "alpha", "2025-01-01T10:00:00Z", 5)).unwrap();
        upsert(store.conn(), &session("s2", "beta", "2025-01-02T10:00:00Z", 50)).unwrap();
        upsert(store.conn(), &session("s3", "alphabet", "2025-01-03T10:00:00Z", 2)).unwrap();

        let recent = list(
            store.conn(),
            &SessionFilter {
                limit: 10,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(recent[0].id, "s3");

        let filtered = list(
            store.conn(),
            &SessionFilter {
                project: Some("ALPHA".to_string()),
                limit: 10,
                ..Default::default()
            },
        )
        .unwrap();
        // Substring match: "alpha" and "alphabet" both qualify.
        assert_eq!(filtered.len(), 2);

        let largest = list(
            store.conn(),
            &SessionFilter {
                sort: SessionSort::Largest,
                limit: 1,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(largest[0].id, "s2");
    }

    #[test]
    fn test_list_date_bounds_inclusive_exclusive() {
        let store = Store::open_in_memory().unwrap();
        upsert(store.conn(), &session("s1", "p", "2025-01-01T00:00:00Z", 0)).unwrap();
        upsert(store.conn(), &session("s2", "p", "2025-01-02T00:00:00Z", 0)).unwrap();

        let bounded = list(
            store.conn(),
            &SessionFilter {
                since: Some(parse_ts("2025-01-01T00:00:00Z")),
                before: Some(parse_ts("2025-01-02T00:00:00Z")),
                limit: 10,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(bounded.len(), 1);
        assert_eq!(bounded[0].id, "s1");
    }

    #[test]
    fn test_ids_older_than_uses_last_activity() {
        let store = Store::open_in_memory().unwrap();
        let mut old = session("old", "p", "2024-01-01T00:00:00Z", 0);
        old.end_time = Some(parse_ts("2024-01-02T00:00:00Z"));
        upsert(store.conn(), &old).unwrap();
        upsert(store.conn(), &session("new", "p", "2025-06-01T00:00:00Z", 0)).unwrap();

        let ids = ids_older_than(store.conn(), &parse_ts("2025-01-01T00:00:00Z")).unwrap();
        assert_eq!(ids, vec!["old"]);
    }
}
