use is_terminal::IsTerminal;
use memnex_runtime::{Error, Memnex, portability};
use std::io::{BufRead, Write};
use std::path::Path;

use crate::format::Formatter;

pub fn handle_export(workspace: &Memnex, path: &str, formatter: Formatter) -> Result<i32, Error> {
    let export = portability::export_store(workspace.store(), Path::new(path))?;

    if formatter.is_json() {
        let value = serde_json::json!({
            "path": path,
            "sessions": export.sessions.len(),
            "messages": export.messages.len(),
            "tool_uses": export.tool_uses.len(),
            "links": export.links.len(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else if !formatter.is_quiet() {
        println!(
            "Exported {} sessions, {} messages, {} tool uses to {}",
            export.sessions.len(),
            export.messages.len(),
            export.tool_uses.len(),
            path
        );
    }

    Ok(0)
}

pub fn handle_import(
    workspace: &mut Memnex,
    path: &str,
    clear: bool,
    force: bool,
    formatter: Formatter,
) -> Result<i32, Error> {
    if clear && !force {
        if !std::io::stdin().is_terminal() {
            return Err(Error::InvalidArgument(
                "refusing to import with --clear without --force in a non-interactive session"
                    .to_string(),
            ));
        }
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "Importing with --clear empties the store first. Continue? [y/N] ");
        let _ = stderr.flush();
        let mut answer = String::new();
        std::io::stdin().lock().read_line(&mut answer)?;
        if !matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
            if !formatter.is_quiet() && !formatter.is_json() {
                println!("Import cancelled");
            }
            return Ok(0);
        }
    }

    let report = portability::import_store(workspace.store_mut(), Path::new(path), clear)?;

    if formatter.is_json() {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !formatter.is_quiet() {
        println!(
            "Imported {} sessions, {} messages, {} tool uses, {} links from {}",
            report.sessions, report.messages, report.tool_uses, report.links, path
        );
    }

    Ok(0)
}
