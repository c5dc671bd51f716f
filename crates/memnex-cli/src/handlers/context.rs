use memnex_runtime::{Error, Memnex, context};

use crate::format::{Formatter, fmt_opt_time};

pub fn handle(
    workspace: &Memnex,
    project: &str,
    days: Option<u32>,
    formatter: Formatter,
) -> Result<i32, Error> {
    let Some(view) = context::project_context(workspace.store(), project, days)? else {
        return Err(Error::ProjectNotFound(project.to_string()));
    };

    if formatter.is_json() {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(0);
    }

    if formatter.is_quiet() {
        println!(
            "{} {} {}",
            view.project_name, view.session_count, view.total_messages
        );
        return Ok(0);
    }

    println!("{} ({})", view.project_name, view.project_path);
    println!(
        "{} sessions, {} messages ({} user / {} assistant), last active {}",
        view.session_count,
        view.total_messages,
        view.user_messages,
        view.assistant_messages,
        fmt_opt_time(&view.last_activity)
    );

    if view.recent_topics.is_empty() {
        println!("Recent topics: no topics extracted yet");
    } else {
        println!("Recent topics:");
        for topic in &view.recent_topics {
            println!("  - {}", topic);
        }
    }

    let detailed = matches!(formatter, Formatter::Detailed | Formatter::Verbose);
    if detailed && !view.recent_tool_uses.is_empty() {
        println!("Recent tool use:");
        for tool in &view.recent_tool_uses {
            println!("  {:<20} {:>5}", tool.name, tool.count);
        }
    }

    Ok(0)
}
