//! Ranked full-text search over message content.
//!
//! The FTS5 index is case-insensitive; case-sensitive queries over-fetch
//! and post-filter on the snippet with the mark sentinels stripped.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::str::FromStr;

use crate::queries::{fmt_ts, parse_ts};
use crate::{Error, Result};
use memnex_types::Role;

pub const MARK_OPEN: &str = "<mark>";
pub const MARK_CLOSE: &str = "</mark>";

const SNIPPET_TOKENS: i64 = 32;
const SNIPPET_MAX_CHARS: usize = 200;

#[derive(Debug, Default, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub project: Option<String>,
    pub session_id: Option<String>,
    pub roles: Vec<Role>,
    pub since: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub case_sensitive: bool,
}

impl SearchOptions {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    pub session_id: String,
    pub message_id: String,
    pub role: Role,
    /// Normalized relevance in [0, 1]; larger is better.
    pub score: f64,
    pub timestamp: DateTime<Utc>,
    /// Window around the best match; matched tokens wrapped in mark sentinels.
    pub snippet: String,
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    /// Whether the case-sensitive post-filter removed anything.
    pub case_filtered: bool,
}

pub fn search(conn: &Connection, query: &str, options: &SearchOptions) -> Result<SearchOutcome> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyQuery);
    }
    if options.limit < 1 {
        return Err(Error::InvalidArgument(format!(
            "limit must be at least 1 (got {})",
            options.limit
        )));
    }

    // Over-fetch for the post-filter; it can only shrink the result set.
    let fetch_limit = if options.case_sensitive {
        options.limit * 2
    } else {
        options.limit
    };

    let mut where_clauses = vec!["messages_fts MATCH ?1".to_string()];
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(fts_quote(trimmed))];

    if let Some(project) = &options.project {
        params.push(Box::new(project.to_lowercase()));
        where_clauses.push(format!("instr(lower(s.project_name), ?{}) > 0", params.len()));
    }
    if let Some(session_id) = &options.session_id {
        params.push(Box::new(session_id.clone()));
        where_clauses.push(format!("m.session_id = ?{}", params.len()));
    }
    if !options.roles.is_empty() {
        let mut placeholders = Vec::new();
        for role in &options.roles {
            params.push(Box::new(role.as_str().to_string()));
            placeholders.push(format!("?{}", params.len()));
        }
        where_clauses.push(format!("m.role IN ({})", placeholders.join(", ")));
    }
    if let Some(since) = &options.since {
        params.push(Box::new(fmt_ts(since)));
        where_clauses.push(format!("m.timestamp >= ?{}", params.len()));
    }
    if let Some(before) = &options.before {
        params.push(Box::new(fmt_ts(before)));
        where_clauses.push(format!("m.timestamp < ?{}", params.len()));
    }

    params.push(Box::new(fetch_limit as i64));
    let sql = format!(
        r#"
        SELECT m.id, m.session_id, m.role, m.timestamp,
               bm25(messages_fts) AS rank,
               snippet(messages_fts, 0, '{}', '{}', '…', {}) AS snip
        FROM messages_fts
        JOIN messages m ON m.rowid = messages_fts.rowid
        JOIN sessions s ON s.id = m.session_id
        WHERE {}
        ORDER BY rank ASC, m.timestamp DESC
        LIMIT ?{}
        "#,
        MARK_OPEN,
        MARK_CLOSE,
        SNIPPET_TOKENS,
        where_clauses.join(" AND "),
        params.len()
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut hits: Vec<SearchHit> = stmt
        .query_map(
            rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
            |row| {
                let role_text: String = row.get(2)?;
                let rank: f64 = row.get(4)?;
                let snippet: String = row.get(5)?;
                Ok(SearchHit {
                    message_id: row.get(0)?,
                    session_id: row.get(1)?,
                    role: Role::from_str(&role_text).unwrap_or(Role::System),
                    score: normalize_rank(rank),
                    timestamp: parse_ts(&row.get::<_, String>(3)?),
                    snippet: cap_snippet(&snippet),
                })
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut case_filtered = false;
    if options.case_sensitive {
        let before_len = hits.len();
        hits.retain(|hit| strip_marks(&hit.snippet).contains(trimmed));
        case_filtered = hits.len() != before_len;
        hits.truncate(options.limit);
    }

    Ok(SearchOutcome {
        hits,
        case_filtered,
    })
}

/// Quote each whitespace-separated term as an FTS5 phrase so operator
/// characters in user input cannot change the query shape.
fn fts_quote(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Map bm25 rank (smaller is better, usually negative) into [0, 1].
fn normalize_rank(rank: f64) -> f64 {
    let goodness = (-rank).max(0.0);
    goodness / (1.0 + goodness)
}

/// Remove the mark sentinels for substring checks and plain display.
pub fn strip_marks(snippet: &str) -> String {
    snippet.replace(MARK_OPEN, "").replace(MARK_CLOSE, "")
}

fn cap_snippet(snippet: &str) -> String {
    if snippet.chars().count() <= SNIPPET_MAX_CHARS {
        return snippet.to_string();
    }
    let mut capped: String = snippet.chars().take(SNIPPET_MAX_CHARS).collect();
    capped.push('…');
    capped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;
    use crate::queries::{message, session};
    use memnex_types::{MessageRecord, SessionRecord};

    fn seed(store: &Store, messages: &[(&str, &str, &str, &str)]) {
        session::upsert(
            store.conn(),
            &SessionRecord {
                id: "s1".to_string(),
                project_path: "/home/dev/memnex".to_string(),
                project_dir: "-home-dev-memnex".to_string(),
                project_name: "memnex".to_string(),
                start_time: parse_ts("2025-01-01T00:00:00Z"),
                end_time: None,
                message_count: 0,
                summary: None,
                updated_at: parse_ts("2025-01-01T00:00:00Z"),
            },
        )
        .unwrap();

        let records: Vec<MessageRecord> = messages
            .iter()
            .map(|(id, role, content, ts)| MessageRecord {
                id: id.to_string(),
                session_id: "s1".to_string(),
                role: role.parse().unwrap(),
                content: content.to_string(),
                timestamp: parse_ts(ts),
                parent_id: None,
                is_sidechain: false,
            })
            .collect();
        message::upsert_batch(store.conn(), &records).unwrap();
    }

    #[test]
    fn test_search_ranks_and_marks() {
        let store = Store::open_in_memory().unwrap();
        seed(
            &store,
            &[
                ("m1", "user", "how do I stream a large file", "2025-01-01T00:00:00Z"),
                ("m2", "assistant", "use a buffered reader to stream", "2025-01-01T00:01:00Z"),
                ("m3", "user", "unrelated chatter about lunch", "2025-01-01T00:02:00Z"),
            ],
        );

        let outcome = search(store.conn(), "stream", &SearchOptions::with_limit(10)).unwrap();
        assert_eq!(outcome.hits.len(), 2);
        for hit in &outcome.hits {
            assert!(hit.snippet.contains(MARK_OPEN));
            assert!(hit.score > 0.0 && hit.score <= 1.0);
        }
    }

    #[test]
    fn test_empty_query_rejected() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(
            search(store.conn(), "   ", &SearchOptions::with_limit(10)),
            Err(Error::EmptyQuery)
        ));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(
            search(store.conn(), "hello", &SearchOptions::with_limit(0)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_role_filter() {
        let store = Store::open_in_memory().unwrap();
        seed(
            &store,
            &[
                ("m1", "user", "deploy the service", "2025-01-01T00:00:00Z"),
                ("m2", "assistant", "deploying the service now", "2025-01-01T00:01:00Z"),
            ],
        );

        let options = SearchOptions {
            limit: 10,
            roles: vec![Role::User],
            ..Default::default()
        };
        let outcome = search(store.conn(), "service", &options).unwrap();
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].role, Role::User);
    }

    #[test]
    fn test_date_bounds() {
        let store = Store::open_in_memory().unwrap();
        seed(
            &store,
            &[
                ("m1", "user", "checkpoint resume logic", "2025-01-01T00:00:00Z"),
                ("m2", "user", "checkpoint clearing logic", "2025-02-01T00:00:00Z"),
            ],
        );

        let options = SearchOptions {
            limit: 10,
            since: Some(parse_ts("2025-01-01T00:00:00Z")),
            before: Some(parse_ts("2025-02-01T00:00:00Z")),
            ..Default::default()
        };
        let outcome = search(store.conn(), "checkpoint", &options).unwrap();
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].message_id, "m1");
    }

    #[test]
    fn test_case_sensitive_filters_exact_substring() {
        let store = Store::open_in_memory().unwrap();
        seed(
            &store,
            &[
                ("m1", "user", "run the Test suite", "2025-01-01T00:00:00Z"),
                ("m2", "user", "run the test suite", "2025-01-01T00:01:00Z"),
                ("m3", "user", "run the TEST suite", "2025-01-01T00:02:00Z"),
            ],
        );

        let options = SearchOptions {
            limit: 10,
            case_sensitive: true,
            ..Default::default()
        };
        let outcome = search(store.conn(), "Test", &options).unwrap();
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].message_id, "m1");
        assert!(outcome.case_filtered);
        assert!(strip_marks(&outcome.hits[0].snippet).contains("Test"));
    }

    #[test]
    fn test_operator_characters_do_not_inject() {
        let store = Store::open_in_memory().unwrap();
        seed(
            &store,
            &[("m1", "user", "plain content here", "2025-01-01T00:00:00Z")],
        );
        // Must not be interpreted as FTS5 syntax, and must not error.
        for query in ["AND", "\"quoted\"", "a NOT b", "col:value", "x*"] {
            let result = search(store.conn(), query, &SearchOptions::with_limit(5));
            assert!(result.is_ok(), "query {:?} errored: {:?}", query, result.err());
        }
    }

    #[test]
    fn test_project_filter_substring_case_insensitive() {
        let store = Store::open_in_memory().unwrap();
        seed(
            &store,
            &[("m1", "user", "project filter works", "2025-01-01T00:00:00Z")],
        );

        let matching = SearchOptions {
            limit: 10,
            project: Some("MEM".to_string()),
            ..Default::default()
        };
        assert_eq!(search(store.conn(), "filter", &matching).unwrap().hits.len(), 1);

        let missing = SearchOptions {
            limit: 10,
            project: Some("other".to_string()),
            ..Default::default()
        };
        assert!(search(store.conn(), "filter", &missing).unwrap().hits.is_empty());
    }
}
