use chrono::Utc;
use memnex_core::time::{day_window_start, parse_date_expr};
use memnex_runtime::{Error, Memnex};
use memnex_store::queries::session::{self, SessionFilter};

use crate::args::SortArg;
use crate::format::{Formatter, fmt_time, short_id, truncate};

#[allow(clippy::too_many_arguments)]
pub fn handle(
    workspace: &Memnex,
    limit: usize,
    project: Option<String>,
    since: Option<String>,
    before: Option<String>,
    days: Option<u32>,
    sort: SortArg,
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

    let filter = SessionFilter {
        project,
        since,
        before,
        sort: sort.into(),
        limit,
    };
    let sessions = session::list(workspace.store().conn(), &filter)?;

    if formatter.is_json() {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(0);
    }

    if sessions.is_empty() {
        if !formatter.is_quiet() {
            println!("No sessions indexed. Run 'memnex sync' first.");
        }
        return Ok(0);
    }

    for record in &sessions {
        match formatter {
            Formatter::Quiet => println!("{}", record.id),
            Formatter::Detailed | Formatter::Verbose => {
                println!("{}  {}", record.id, record.project_path);
                println!(
                    "      started {}  messages {}  summary: {}",
                    fmt_time(&record.start_time),
                    record.message_count,
                    record.summary.as_deref().unwrap_or("-")
                );
            }
            _ => {
                println!(
                    "{}  {}  {:<20}  {:>5} msgs  {}",
                    short_id(&record.id),
                    fmt_time(&record.start_time),
                    truncate(&record.project_name, 20),
                    record.message_count,
                    truncate(record.summary.as_deref().unwrap_or(""), 48)
                );
            }
        }
    }

    Ok(0)
}
