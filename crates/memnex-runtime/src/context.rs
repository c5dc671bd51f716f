//! Per-project aggregate view.

use chrono::{DateTime, Utc};
use memnex_core::time::day_window_start;
use memnex_store::Store;
use memnex_store::queries::{aggregate, link};
use serde::Serialize;

use crate::Result;

#[derive(Debug, Clone, Serialize)]
pub struct ToolCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectContext {
    pub project_name: String,
    pub project_path: String,
    pub session_count: usize,
    pub total_messages: i64,
    pub user_messages: i64,
    pub assistant_messages: i64,
    pub recent_topics: Vec<String>,
    pub recent_tool_uses: Vec<ToolCount>,
    pub last_activity: Option<DateTime<Utc>>,
}

const TOP_N: usize = 10;

/// Aggregate view of the project matching `substring`.
///
/// Returns `None` iff no session's decoded project name contains the
/// substring (case-insensitive). `days = N` bounds every aggregate to the
/// inclusive-today window.
pub fn project_context(
    store: &Store,
    substring: &str,
    days: Option<u32>,
) -> Result<Option<ProjectContext>> {
    let conn = store.conn();

    let Some((project_name, project_path)) = aggregate::project_identity(conn, substring)? else {
        return Ok(None);
    };

    let since = days.map(|days| day_window_start(days, Utc::now()));
    let session_ids = aggregate::session_ids_for_project(conn, substring, since.as_ref())?;

    let (total, user, assistant) = aggregate::message_role_counts(conn, &session_ids)?;
    let recent_tool_uses = aggregate::top_tools(conn, &session_ids, TOP_N)?
        .into_iter()
        .map(|(name, count)| ToolCount { name, count })
        .collect();
    let recent_topics = link::top_topics(conn, &session_ids, TOP_N)?;
    let last_activity = aggregate::last_activity(conn, &session_ids)?;

    Ok(Some(ProjectContext {
        project_name,
        project_path,
        session_count: session_ids.len(),
        total_messages: total,
        user_messages: user,
        assistant_messages: assistant,
        recent_topics,
        recent_tool_uses,
        last_activity,
    }))
}
