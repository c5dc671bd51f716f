//! Output plumbing shared by the handlers.
//!
//! One formatter abstraction with a variant per output mode; handlers
//! match on it instead of threading individual flags around.

use chrono::{DateTime, Utc};
use is_terminal::IsTerminal;
use memnex_store::search::{MARK_CLOSE, MARK_OPEN, strip_marks};
use owo_colors::OwoColorize;

use crate::args::DetailArg;

/// How a command should render its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatter {
    Brief,
    Detailed,
    Json,
    Quiet,
    Verbose,
}

impl Formatter {
    /// Select the formatter from the global flags plus an optional
    /// per-command detail level. JSON wins, then quiet, then verbose.
    pub fn select(json: bool, verbose: bool, quiet: bool, detail: Option<DetailArg>) -> Self {
        if json {
            Formatter::Json
        } else if quiet {
            Formatter::Quiet
        } else if verbose {
            Formatter::Verbose
        } else if detail == Some(DetailArg::Detailed) {
            Formatter::Detailed
        } else {
            Formatter::Brief
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Formatter::Json)
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self, Formatter::Quiet)
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Formatter::Verbose)
    }
}

pub fn use_color() -> bool {
    std::io::stdout().is_terminal()
}

/// Human timestamp: date plus minute precision, UTC.
pub fn fmt_time(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

pub fn fmt_opt_time(ts: &Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => fmt_time(ts),
        None => "-".to_string(),
    }
}

/// Compact relative rendering: "3m ago", "2h ago", "5d ago".
pub fn fmt_ago(ts: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(*ts);
    if delta.num_seconds() < 0 {
        return fmt_time(ts);
    }
    if delta.num_minutes() < 1 {
        "just now".to_string()
    } else if delta.num_hours() < 1 {
        format!("{}m ago", delta.num_minutes())
    } else if delta.num_days() < 1 {
        format!("{}h ago", delta.num_hours())
    } else if delta.num_days() < 30 {
        format!("{}d ago", delta.num_days())
    } else {
        fmt_time(ts)
    }
}

/// Truncate to `max` characters with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Render a search snippet: highlighted match on terminals, sentinels
/// stripped everywhere else.
pub fn render_snippet(snippet: &str) -> String {
    if !use_color() {
        return strip_marks(snippet);
    }

    let mut out = String::with_capacity(snippet.len());
    let mut rest = snippet;
    while let Some(open) = rest.find(MARK_OPEN) {
        out.push_str(&rest[..open]);
        rest = &rest[open + MARK_OPEN.len()..];
        let close = rest.find(MARK_CLOSE).unwrap_or(rest.len());
        out.push_str(&format!("{}", (&rest[..close]).yellow().bold()));
        rest = rest.get(close + MARK_CLOSE.len()..).unwrap_or("");
    }
    out.push_str(rest);
    out
}

/// Short id prefix for display.
pub fn short_id(id: &str) -> String {
    id.chars().take(12).collect()
}
