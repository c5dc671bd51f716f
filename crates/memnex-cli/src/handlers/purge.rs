use chrono::Utc;
use is_terminal::IsTerminal;
use memnex_core::time::duration_cutoff;
use memnex_runtime::{Error, Memnex, purge};
use std::io::{BufRead, Write};

use crate::format::Formatter;

pub fn handle(
    workspace: &mut Memnex,
    older_than: &str,
    dry_run: bool,
    force: bool,
    formatter: Formatter,
) -> Result<i32, Error> {
    let cutoff = duration_cutoff(older_than, Utc::now()).map_err(Error::Core)?;

    // Preview first so the confirmation can say what it would delete.
    let preview = purge::purge(workspace.store_mut(), cutoff, true)?;

    if !dry_run && !force && preview.sessions_deleted > 0 {
        if !std::io::stdin().is_terminal() {
            return Err(Error::InvalidArgument(
                "refusing to purge without --force in a non-interactive session".to_string(),
            ));
        }
        let mut stderr = std::io::stderr();
        let _ = write!(
            stderr,
            "Delete {} sessions ({} messages) older than {}? [y/N] ",
            preview.sessions_deleted, preview.messages_deleted, older_than
        );
        let _ = stderr.flush();
        let mut answer = String::new();
        std::io::stdin().lock().read_line(&mut answer)?;
        if !matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
            if !formatter.is_quiet() && !formatter.is_json() {
                println!("Purge cancelled");
            }
            return Ok(0);
        }
    }

    let report = purge::purge(workspace.store_mut(), cutoff, dry_run)?;

    if formatter.is_json() {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !formatter.is_quiet() {
        let verb = if dry_run { "Would delete" } else { "Deleted" };
        println!(
            "{} {} sessions, {} messages, {} tool uses, {} links (cutoff {})",
            verb,
            report.sessions_deleted,
            report.messages_deleted,
            report.tool_uses_deleted,
            report.links_deleted,
            report.cutoff
        );
    }

    Ok(0)
}
