use chrono::Utc;
use memnex_runtime::{Error, Memnex};
use memnex_store::queries::aggregate;

use crate::format::{Formatter, fmt_ago, truncate};

pub fn handle(workspace: &Memnex, top_projects: usize, formatter: Formatter) -> Result<i32, Error> {
    let conn = workspace.store().conn();
    let totals = aggregate::totals(conn)?;
    let projects = aggregate::project_stats(conn, top_projects)?;

    if formatter.is_json() {
        let value = serde_json::json!({
            "sessions": totals.sessions,
            "messages": totals.messages,
            "tool_uses": totals.tool_uses,
            "links": totals.links,
            "projects": projects.iter().map(|p| serde_json::json!({
                "name": p.project_name,
                "path": p.project_path,
                "sessions": p.session_count,
                "messages": p.message_count,
                "last_activity": p.last_activity.map(|ts| ts.to_rfc3339()),
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(0);
    }

    if formatter.is_quiet() {
        println!("{} {} {}", totals.sessions, totals.messages, totals.tool_uses);
        return Ok(0);
    }

    println!(
        "{} sessions, {} messages, {} tool uses, {} links",
        totals.sessions, totals.messages, totals.tool_uses, totals.links
    );

    if !projects.is_empty() {
        println!();
        println!("Top projects by messages:");
        let now = Utc::now();
        for project in &projects {
            let last_active = match &project.last_activity {
                Some(ts) => fmt_ago(ts, now),
                None => "-".to_string(),
            };
            println!(
                "  {:<24} {:>5} sessions  {:>7} msgs  last active {}",
                truncate(&project.project_name, 24),
                project.session_count,
                project.message_count,
                last_active
            );
        }
    }

    Ok(0)
}
