use memnex_runtime::{Error, Memnex};
use memnex_store::queries::session::PrefixMatch;
use memnex_store::queries::{message, session, tool_use};

use crate::format::{Formatter, fmt_opt_time, fmt_time, truncate};

/// Resolve a full session id or unique prefix to the stored id.
pub fn resolve_session_id(workspace: &Memnex, id_or_prefix: &str) -> Result<String, Error> {
    let conn = workspace.store().conn();
    if session::get(conn, id_or_prefix)?.is_some() {
        return Ok(id_or_prefix.to_string());
    }
    match session::find_by_prefix(conn, id_or_prefix)? {
        PrefixMatch::One(id) => Ok(id),
        PrefixMatch::None => Err(Error::SessionNotFound(id_or_prefix.to_string())),
        PrefixMatch::Many => Err(Error::AmbiguousSessionId(id_or_prefix.to_string())),
    }
}

pub fn handle(
    workspace: &Memnex,
    session_id: &str,
    include_tools: bool,
    formatter: Formatter,
) -> Result<i32, Error> {
    let resolved = resolve_session_id(workspace, session_id)?;
    let conn = workspace.store().conn();

    let record = session::get(conn, &resolved)?
        .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
    let messages = message::list_for_session(conn, &resolved)?;
    let tools = if include_tools {
        tool_use::list_for_session(conn, &resolved)?
    } else {
        Vec::new()
    };

    if formatter.is_json() {
        let value = serde_json::json!({
            "session": record,
            "messages": messages,
            "tool_uses": if include_tools { Some(&tools) } else { None },
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(0);
    }

    if formatter.is_quiet() {
        println!("{}", record.id);
        return Ok(0);
    }

    println!("Session {}", record.id);
    println!("Project {} ({})", record.project_name, record.project_path);
    println!(
        "Started {}  ended {}  {} messages",
        fmt_time(&record.start_time),
        fmt_opt_time(&record.end_time),
        record.message_count
    );
    if let Some(summary) = &record.summary {
        println!("Summary: {}", summary);
    }
    println!();

    for message in &messages {
        let marker = if message.is_sidechain { " (sidechain)" } else { "" };
        println!(
            "[{}] {}{}",
            fmt_time(&message.timestamp),
            message.role.as_str(),
            marker
        );
        let body = if formatter.is_verbose() {
            message.content.clone()
        } else {
            truncate(&message.content, 400)
        };
        for line in body.lines() {
            println!("    {}", line);
        }
    }

    if include_tools && !tools.is_empty() {
        println!();
        println!("Tool uses:");
        for tool in &tools {
            println!(
                "  [{}] {} ({}){}",
                fmt_time(&tool.timestamp),
                tool.name,
                tool.status.as_str(),
                tool.duration_ms
                    .map(|ms| format!(" {}ms", ms))
                    .unwrap_or_default()
            );
            if formatter.is_verbose()
                && let Some(result) = &tool.result
            {
                println!("      {}", truncate(result, 200));
            }
        }
    }

    Ok(0)
}
