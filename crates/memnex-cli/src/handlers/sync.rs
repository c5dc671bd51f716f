use memnex_core::workspace::DataLayout;
use memnex_ingest::FsSource;
use memnex_runtime::{
    CheckpointManager, Error, ErrorLog, Memnex, SyncOptions, SyncProgress, UserConfig, lifecycle,
    sync,
};
use std::path::Path;

use crate::format::Formatter;

#[allow(clippy::too_many_arguments)]
pub fn handle(
    workspace: Option<Memnex>,
    layout: &DataLayout,
    source_root: &Path,
    force: bool,
    project: Option<String>,
    session: Option<String>,
    dry_run: bool,
    formatter: Formatter,
) -> Result<i32, Error> {
    let source = FsSource::new(source_root);
    let checkpoints = CheckpointManager::new(layout.checkpoint_path());
    let error_log = ErrorLog::new(layout.error_log_path());
    let user_config = UserConfig::load_from(&layout.config_path()).unwrap_or_default();

    let options = SyncOptions {
        force,
        project,
        session,
        dry_run,
        ..Default::default()
    };

    // An immediate abort (choice 1 on the interrupt prompt) bypasses the
    // normal return path; leave a trace of where the run stopped.
    let interrupt_log = error_log.clone();
    let cleanup = lifecycle::register_cleanup(move || {
        let _ = interrupt_log.append(
            memnex_types::ErrorCode::Unknown,
            "sync interrupted before completion; checkpoint preserved",
            None,
        );
    });

    let mut workspace = workspace;
    let store = workspace.as_mut().map(|w| w.store_mut());

    let report = sync::run(
        store,
        &source,
        &checkpoints,
        Some(&error_log),
        &options,
        &mut |progress| print_progress(progress, formatter),
    );
    lifecycle::deregister_cleanup(cleanup);
    let report = report?;

    if formatter.is_json() {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !formatter.is_quiet() {
        let verb = if dry_run { "Would ingest" } else { "Ingested" };
        println!(
            "{} {} messages and {} tool uses from {} sessions ({} skipped, {} errors)",
            verb,
            report.messages_inserted,
            report.tool_uses_inserted,
            report.processed,
            report.skipped,
            report.errors.len()
        );
        if formatter.is_verbose() || (user_config.show_failures && !report.errors.is_empty()) {
            let cap = if formatter.is_verbose() { usize::MAX } else { 5 };
            for error in report.errors.iter().take(cap) {
                match error.line {
                    Some(line) => eprintln!("  {} line {}: {}", error.file, line, error.message),
                    None => eprintln!("  {}: {}", error.file, error.message),
                }
            }
            if report.errors.len() > cap {
                eprintln!("  … and {} more (see the error log)", report.errors.len() - cap);
            }
        }
        if report.aborted {
            println!("Sync interrupted; progress is checkpointed. Run sync again to resume.");
        }
    }

    if report.aborted {
        return Ok(lifecycle::INTERRUPT_EXIT_CODE);
    }
    Ok(0)
}

fn print_progress(progress: &SyncProgress, formatter: Formatter) {
    if formatter.is_json() || formatter.is_quiet() {
        return;
    }
    match progress {
        SyncProgress::Resuming { done, total } => {
            println!("Resuming {}/{}", done, total);
        }
        SyncProgress::Discovering { discovered } => {
            println!("Discovered {} session files", discovered);
        }
        SyncProgress::Extracting {
            current,
            total,
            session_id,
        } => {
            if formatter.is_verbose() {
                println!("  [{}/{}] {}", current, total, session_id);
            }
        }
    }
}
