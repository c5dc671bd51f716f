use chrono::Utc;
use memnex_core::time::{day_window_start, parse_date_expr};
use memnex_runtime::{Error, Memnex};
use memnex_store::{SearchOptions, search};

use crate::args::RoleArg;
use crate::format::{Formatter, fmt_time, render_snippet, short_id};

#[allow(clippy::too_many_arguments)]
pub fn handle(
    workspace: &Memnex,
    query: &str,
    limit: usize,
    project: Option<String>,
    session: Option<String>,
    roles: Vec<RoleArg>,
    since: Option<String>,
    before: Option<String>,
    days: Option<u32>,
    case_sensitive: bool,
    formatter: Formatter,
) -> Result<i32, Error> {
    let now = Utc::now();
    let since = match (&since, days) {
        (Some(expr), _) => Some(parse_date_expr(expr, now)?),
        (None, Some(days)) => Some(day_window_start(days, now)),
        (None, None) => None,
    };
    let before = before
        .as_deref()
        .map(|expr| parse_date_expr(expr, now))
        .transpose()?;

    let options = SearchOptions {
        limit,
        project,
        session_id: session,
        roles: roles.into_iter().map(Into::into).collect(),
        since,
        before,
        case_sensitive,
    };

    let outcome = search::search(workspace.store().conn(), query, &options)?;

    if formatter.is_json() {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "query": query,
                "case_filtered": outcome.case_filtered,
                "results": outcome.hits,
            }))?
        );
        return Ok(0);
    }

    if outcome.hits.is_empty() {
        if !formatter.is_quiet() {
            println!("No results for '{}'", query);
        }
        return Ok(0);
    }

    for hit in &outcome.hits {
        match formatter {
            Formatter::Quiet => println!("{}", hit.message_id),
            Formatter::Detailed | Formatter::Verbose => {
                println!(
                    "{:.2}  {}  {:<9}  session {}",
                    hit.score,
                    fmt_time(&hit.timestamp),
                    hit.role.as_str(),
                    hit.session_id
                );
                println!("      message {}", hit.message_id);
                println!("      {}", render_snippet(&hit.snippet));
            }
            _ => {
                println!(
                    "{:.2}  {}  {:<9}  {}  {}",
                    hit.score,
                    fmt_time(&hit.timestamp),
                    hit.role.as_str(),
                    short_id(&hit.session_id),
                    render_snippet(&hit.snippet)
                );
            }
        }
    }

    if case_sensitive && outcome.case_filtered && formatter.is_verbose() {
        eprintln!("(some case-insensitive matches were filtered)");
    }

    Ok(0)
}
