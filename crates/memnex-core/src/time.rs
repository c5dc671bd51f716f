//! Time grammars shared by the CLI surface: the purge duration form
//! (`30d`, `6m`, `1y`) and the date expressions accepted by `--since` /
//! `--before`.

use crate::{Error, Result};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^([1-9][0-9]*)([dmy])$").unwrap())
}

/// Parse a purge duration and return the cutoff instant relative to `now`.
///
/// `d` subtracts N x 86,400 seconds; `m` and `y` use calendar arithmetic
/// (clamping to the last day of shorter months).
pub fn duration_cutoff(spec: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let captures = duration_pattern()
        .captures(spec.trim())
        .ok_or_else(|| Error::Parse(format!("invalid duration '{}': expected <N>d, <N>m or <N>y", spec)))?;

    let count: u32 = captures[1]
        .parse()
        .map_err(|_| Error::Parse(format!("duration count out of range in '{}'", spec)))?;

    let cutoff = match captures[2].to_ascii_lowercase().as_str() {
        "d" => now - Duration::seconds(i64::from(count) * 86_400),
        "m" => now
            .checked_sub_months(Months::new(count))
            .ok_or_else(|| Error::Parse(format!("duration '{}' underflows the calendar", spec)))?,
        "y" => now
            .checked_sub_months(Months::new(count.saturating_mul(12)))
            .ok_or_else(|| Error::Parse(format!("duration '{}' underflows the calendar", spec)))?,
        _ => unreachable!("pattern restricts the unit"),
    };

    Ok(cutoff)
}

/// Parse a date expression into a UTC instant.
///
/// Accepted forms: `YYYY-MM-DD`, full RFC 3339, `today`, `yesterday`,
/// `N days ago`. Bare dates resolve to midnight UTC of that day.
pub fn parse_date_expr(expr: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let trimmed = expr.trim();
    let lowered = trimmed.to_ascii_lowercase();

    if lowered == "today" {
        return Ok(start_of_day(now.date_naive()));
    }
    if lowered == "yesterday" {
        return Ok(start_of_day(now.date_naive() - Duration::days(1)));
    }
    if let Some(days) = parse_days_ago(&lowered) {
        return Ok(start_of_day(now.date_naive() - Duration::days(days)));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(start_of_day(date));
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(instant.with_timezone(&Utc));
    }

    Err(Error::Parse(format!(
        "invalid date '{}': expected YYYY-MM-DD, RFC 3339, 'today', 'yesterday' or 'N days ago'",
        expr
    )))
}

fn parse_days_ago(lowered: &str) -> Option<i64> {
    let rest = lowered.strip_suffix(" days ago").or_else(|| lowered.strip_suffix(" day ago"))?;
    rest.trim().parse::<i64>().ok().filter(|n| *n >= 0)
}

/// Inclusive-today window start: midnight of `today - (days - 1)`.
///
/// `days = 1` means "just today".
pub fn day_window_start(days: u32, now: DateTime<Utc>) -> DateTime<Utc> {
    let span = i64::from(days.max(1)) - 1;
    start_of_day(now.date_naive() - Duration::days(span))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(date.year(), date.month(), date.day(), 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}
