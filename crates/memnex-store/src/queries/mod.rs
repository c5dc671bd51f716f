pub mod aggregate;
pub mod extraction;
pub mod link;
pub mod message;
pub mod session;
pub mod tool_use;

use chrono::{DateTime, Utc};

/// Timestamps are stored as RFC 3339 text; parse failures fall back to the
/// epoch rather than poisoning a whole result set.
pub(crate) fn parse_ts(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

pub(crate) fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}
