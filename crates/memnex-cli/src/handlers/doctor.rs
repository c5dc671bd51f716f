use memnex_core::workspace::DataLayout;
use memnex_runtime::{Error, doctor};
use owo_colors::OwoColorize;
use std::path::Path;

use crate::format::{Formatter, use_color};

pub fn handle(
    layout: &DataLayout,
    source_root: &Path,
    fix: bool,
    formatter: Formatter,
) -> Result<i32, Error> {
    let report = doctor::run_health_check(layout, source_root, fix)?;

    if formatter.is_json() {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(0);
    }

    if formatter.is_quiet() {
        println!("{}", if report.healthy() { "ok" } else { "unhealthy" });
        return Ok(0);
    }

    println!("Database");
    status_line("exists", report.database.exists);
    status_line("readable", report.database.readable);
    status_line("writable", report.database.writable);
    println!(
        "  integrity: {}  size: {} bytes",
        report.database.integrity, report.database.size_bytes
    );

    println!("Permissions");
    status_line("config dir", report.permissions.config_dir);
    status_line("logs dir", report.permissions.logs_dir);
    status_line("source dir", report.permissions.source_dir);

    println!("Hooks");
    status_line("installed", report.hooks.installed);
    status_line("enabled", report.hooks.enabled);
    if let Some(last_run) = &report.hooks.last_run {
        println!("  last run: {}", last_run);
    }

    println!("Config");
    status_line("valid", report.config.valid);
    for issue in &report.config.issues {
        println!("  issue: {}", issue);
    }

    for fixed in &report.fixed {
        println!("fixed: {}", fixed);
    }

    Ok(0)
}

fn status_line(label: &str, ok: bool) {
    if use_color() {
        let mark = if ok {
            format!("{}", "ok".green())
        } else {
            format!("{}", "missing".red())
        };
        println!("  {}: {}", label, mark);
    } else {
        println!("  {}: {}", label, if ok { "ok" } else { "missing" });
    }
}
