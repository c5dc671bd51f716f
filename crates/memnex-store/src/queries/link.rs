use rusqlite::{Connection, params};
use std::str::FromStr;

use super::{fmt_ts, parse_ts};
use crate::{Error, Result};
use memnex_types::{LinkRecord, NodeType};

/// One node reached by a traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedLink {
    pub target_type: NodeType,
    pub target_id: String,
    pub relationship: String,
    pub weight: f64,
    pub hop: u32,
}

/// A related session after session-level aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedSession {
    pub session_id: String,
    pub weight: f64,
    pub hop: u32,
}

pub fn upsert(conn: &Connection, link: &LinkRecord) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO links (source_type, source_id, target_type, target_id,
                           relationship, weight, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(source_type, source_id, target_type, target_id, relationship)
        DO UPDATE SET weight = ?6
        "#,
        params![
            link.source_type.as_str(),
            &link.source_id,
            link.target_type.as_str(),
            &link.target_id,
            &link.relationship,
            link.weight,
            fmt_ts(&link.created_at),
        ],
    )?;
    Ok(())
}

/// Walk the graph outward from `(source_type, source_id)`.
///
/// Single recursive statement: weight decays multiplicatively along the
/// path, each row carries the accumulated `type:id->type:id` path, and the
/// recursive step rejects any extension that revisits a node already on the
/// path. The final projection keeps max weight and min hop per target.
pub fn find_related(
    conn: &Connection,
    source_type: NodeType,
    source_id: &str,
    max_hops: u32,
) -> Result<Vec<RelatedLink>> {
    if !(1..=3).contains(&max_hops) {
        return Err(Error::InvalidArgument(format!(
            "max_hops must be 1, 2 or 3 (got {})",
            max_hops
        )));
    }

    let mut stmt = conn.prepare_cached(
        r#"
        WITH RECURSIVE related(target_type, target_id, relationship, weight, hop, path) AS (
            SELECT l.target_type, l.target_id, l.relationship, l.weight, 1,
                   l.source_type || ':' || l.source_id || '->' || l.target_type || ':' || l.target_id
            FROM links l
            WHERE l.source_type = ?1 AND l.source_id = ?2

            UNION ALL

            SELECT l.target_type, l.target_id, l.relationship, r.weight * l.weight, r.hop + 1,
                   r.path || '->' || l.target_type || ':' || l.target_id
            FROM links l
            JOIN related r ON l.source_type = r.target_type AND l.source_id = r.target_id
            WHERE r.hop < ?3
              AND instr(r.path, l.target_type || ':' || l.target_id) = 0
        )
        SELECT target_type, target_id, relationship, MAX(weight) AS weight, MIN(hop) AS hop
        FROM related
        GROUP BY target_type, target_id
        ORDER BY hop ASC, weight DESC, target_id ASC
        "#,
    )?;

    let links = stmt
        .query_map(
            params![source_type.as_str(), source_id, max_hops],
            |row| {
                let type_text: String = row.get(0)?;
                Ok(RelatedLink {
                    target_type: NodeType::from_str(&type_text).unwrap_or(NodeType::Entity),
                    target_id: row.get(1)?,
                    relationship: row.get(2)?,
                    weight: row.get(3)?,
                    hop: row.get::<_, i64>(4)? as u32,
                })
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(links)
}

/// Session-level view of a traversal: group by target session, keep max
/// weight, drop the source, order weight desc then hop asc, truncate.
pub fn related_sessions(
    conn: &Connection,
    source_type: NodeType,
    source_id: &str,
    max_hops: u32,
    limit: usize,
) -> Result<Vec<RelatedSession>> {
    let related = find_related(conn, source_type, source_id, max_hops)?;

    let mut sessions: Vec<RelatedSession> = related
        .into_iter()
        .filter(|link| link.target_type == NodeType::Session)
        .filter(|link| !(source_type == NodeType::Session && link.target_id == source_id))
        .map(|link| RelatedSession {
            session_id: link.target_id,
            weight: link.weight,
            hop: link.hop,
        })
        .collect();

    sessions.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.hop.cmp(&b.hop))
            .then(a.session_id.cmp(&b.session_id))
    });
    sessions.truncate(limit);

    Ok(sessions)
}

/// Top topics across a set of source sessions, by summed link weight.
pub fn top_topics(conn: &Connection, session_ids: &[String], limit: usize) -> Result<Vec<String>> {
    if session_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = (1..=session_ids.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        r#"
        SELECT target_id
        FROM links
        WHERE source_type = 'session' AND target_type = 'topic' AND source_id IN ({})
        GROUP BY target_id
        ORDER BY SUM(weight) DESC, target_id ASC
        LIMIT {}
        "#,
        placeholders, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let topics = stmt
        .query_map(
            rusqlite::params_from_iter(session_ids.iter()),
            |row| row.get(0),
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(topics)
}

pub fn delete_for_sessions(conn: &Connection, session_ids: &[String]) -> Result<usize> {
    let mut deleted = 0;
    let mut stmt = conn.prepare_cached(
        r#"
        DELETE FROM links
        WHERE (source_type = 'session' AND source_id = ?1)
           OR (target_type = 'session' AND target_id = ?1)
        "#,
    )?;
    for id in session_ids {
        deleted += stmt.execute([id])?;
    }
    Ok(deleted)
}

pub fn all(conn: &Connection) -> Result<Vec<LinkRecord>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT source_type, source_id, target_type, target_id, relationship, weight, created_at
        FROM links
        ORDER BY source_type, source_id, target_type, target_id, relationship
        "#,
    )?;
    let links = stmt
        .query_map([], |row| {
            let source_text: String = row.get(0)?;
            let target_text: String = row.get(2)?;
            Ok(LinkRecord {
                source_type: NodeType::from_str(&source_text).unwrap_or(NodeType::Entity),
                source_id: row.get(1)?,
                target_type: NodeType::from_str(&target_text).unwrap_or(NodeType::Entity),
                target_id: row.get(3)?,
                relationship: row.get(4)?,
                weight: row.get(5)?,
                created_at: parse_ts(&row.get::<_, String>(6)?),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(links)
}

pub fn count(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))?;
    Ok(count)
}
