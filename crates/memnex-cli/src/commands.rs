use memnex_core::workspace::{self, DataLayout};
use memnex_runtime::{Error, ErrorLog, Memnex, lifecycle};
use memnex_types::ErrorEnvelope;
use owo_colors::OwoColorize;
use std::path::PathBuf;

use crate::args::{Cli, Commands};
use crate::format::{Formatter, use_color};
use crate::handlers;

/// Exit code for user-visible failures.
const EXIT_FAILURE: i32 = 1;
/// Exit code for internal unrecoverable failures (store error mid-purge).
const EXIT_INTERNAL: i32 = 2;

pub fn run(cli: Cli) -> i32 {
    let _ = lifecycle::install_signal_handler();

    let formatter = Formatter::select(cli.json, cli.verbose, cli.quiet, None);

    let layout = match workspace::resolve_data_dir(cli.data_dir.as_deref()) {
        Ok(dir) => DataLayout::new(dir),
        Err(err) => return report_error(&Error::Core(err), formatter, None, EXIT_FAILURE),
    };
    let source_root = match workspace::resolve_source_root(cli.source.as_deref()) {
        Ok(root) => root,
        Err(err) => return report_error(&Error::Core(err), formatter, None, EXIT_FAILURE),
    };

    let error_log = ErrorLog::new(layout.error_log_path());
    let is_purge = matches!(cli.command, Commands::Purge { .. });

    match dispatch(cli, &layout, source_root) {
        Ok(code) => code,
        Err(err) => {
            let exit = if is_purge && matches!(err, Error::Store(_)) {
                EXIT_INTERNAL
            } else {
                EXIT_FAILURE
            };
            report_error(&err, formatter, Some(&error_log), exit)
        }
    }
}

fn dispatch(cli: Cli, layout: &DataLayout, source_root: PathBuf) -> Result<i32, Error> {
    let formatter = Formatter::select(cli.json, cli.verbose, cli.quiet, None);

    match cli.command {
        Commands::Sync {
            force,
            project,
            session,
            dry_run,
        } => {
            let workspace = if dry_run { None } else { Some(open_workspace(layout)?) };
            handlers::sync::handle(
                workspace,
                layout,
                &source_root,
                force,
                project,
                session,
                dry_run,
                formatter,
            )
        }

        Commands::Search {
            query,
            limit,
            project,
            session,
            role,
            since,
            before,
            days,
            case_sensitive,
            ignore_case: _,
        } => {
            let workspace = open_workspace(layout)?;
            handlers::search::handle(
                &workspace,
                &query,
                limit,
                project,
                session,
                role,
                since,
                before,
                days,
                case_sensitive,
                formatter,
            )
        }

        Commands::List {
            limit,
            project,
            since,
            before,
            days,
            sort,
        } => {
            let workspace = open_workspace(layout)?;
            handlers::list::handle(&workspace, limit, project, since, before, days, sort, formatter)
        }

        Commands::Stats { projects } => {
            let workspace = open_workspace(layout)?;
            handlers::stats::handle(&workspace, projects, formatter)
        }

        Commands::Show { session_id, tools } => {
            let workspace = open_workspace(layout)?;
            handlers::show::handle(&workspace, &session_id, tools, formatter)
        }

        Commands::Context {
            project,
            days,
            format,
        } => {
            let workspace = open_workspace(layout)?;
            let formatter =
                Formatter::select(cli.json, cli.verbose, cli.quiet, Some(format));
            handlers::context::handle(&workspace, &project, days, formatter)
        }

        Commands::Related {
            id,
            limit,
            hops,
            node_type,
            format,
        } => {
            let workspace = open_workspace(layout)?;
            let formatter =
                Formatter::select(cli.json, cli.verbose, cli.quiet, Some(format));
            handlers::related::handle(&workspace, &id, limit, hops, node_type, formatter)
        }

        Commands::Purge {
            older_than,
            dry_run,
            force,
        } => {
            let mut workspace = open_workspace(layout)?;
            handlers::purge::handle(&mut workspace, &older_than, dry_run, force, formatter)
        }

        Commands::Export { path } => {
            let workspace = open_workspace(layout)?;
            handlers::portability::handle_export(&workspace, &path, formatter)
        }

        Commands::Import { path, clear, force } => {
            let mut workspace = open_workspace(layout)?;
            handlers::portability::handle_import(&mut workspace, &path, clear, force, formatter)
        }

        Commands::Doctor { fix } => handlers::doctor::handle(layout, &source_root, fix, formatter),

        Commands::Completion { shell } => handlers::completion::handle(&shell),
    }
}

/// Open the workspace; on a corrupted store, let the lifecycle controller
/// offer recovery before giving up.
fn open_workspace(layout: &DataLayout) -> Result<Memnex, Error> {
    layout.ensure_dirs().map_err(Error::Core)?;
    match Memnex::open(layout.root.clone()) {
        Ok(workspace) => Ok(workspace),
        Err(Error::Store(memnex_store::Error::Corrupted(detail))) => {
            match lifecycle::recover_store(&layout.db_path())? {
                Some(store) => Ok(Memnex::from_parts(
                    DataLayout::new(layout.root.clone()),
                    store,
                )),
                None => Err(Error::Store(memnex_store::Error::Corrupted(detail))),
            }
        }
        Err(err) => Err(err),
    }
}

fn report_error(
    err: &Error,
    formatter: Formatter,
    error_log: Option<&ErrorLog>,
    exit: i32,
) -> i32 {
    let code = err.code();

    if formatter.is_json() {
        let envelope = ErrorEnvelope::new(code, err.to_string());
        println!("{}", envelope.to_json());
    } else {
        if use_color() {
            eprintln!("{} {}", "Error:".red().bold(), err);
        } else {
            eprintln!("Error: {}", err);
        }
        if formatter.is_verbose() {
            let mut source = std::error::Error::source(err);
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
        }
    }

    if let Some(log) = error_log {
        let _ = log.append(code, &err.to_string(), None);
    }

    exit
}
