use chrono::{DateTime, Utc};
use serde_json::Value;

/// Fields shared by every record-level event in a session file.
#[derive(Debug, Clone)]
pub struct EventMeta {
    /// 1-based line number in the source file.
    pub line: u64,
    pub uuid: String,
    pub parent_uuid: Option<String>,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub is_sidechain: bool,
    pub cwd: Option<String>,
}

/// One ordered content block inside a user or assistant turn.
///
/// Image, progress and base64 payloads never reach this type; the parser
/// drops them at deserialization.
#[derive(Debug, Clone)]
pub enum ContentBlock {
    Text { text: String },
    Thinking { text: String },
    ToolUse { id: String, name: String, input: Value },
}

/// A typed event lowered from one session-file line.
///
/// A single line can yield more than one event (a user record carrying both
/// text and tool_result blocks), but every event keeps the line it came from.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    User {
        meta: EventMeta,
        blocks: Vec<ContentBlock>,
    },
    Assistant {
        meta: EventMeta,
        blocks: Vec<ContentBlock>,
    },
    ToolUse {
        meta: EventMeta,
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        meta: EventMeta,
        tool_use_id: String,
        content: String,
        is_error: bool,
        duration_ms: Option<i64>,
    },
    Summary {
        line: u64,
        summary: String,
        leaf_uuid: Option<String>,
    },
    System {
        meta: EventMeta,
        subtype: Option<String>,
        content: Option<String>,
    },
}

impl ParsedEvent {
    /// Line number the event was lowered from.
    pub fn line(&self) -> u64 {
        match self {
            ParsedEvent::User { meta, .. }
            | ParsedEvent::Assistant { meta, .. }
            | ParsedEvent::ToolUse { meta, .. }
            | ParsedEvent::ToolResult { meta, .. }
            | ParsedEvent::System { meta, .. } => meta.line,
            ParsedEvent::Summary { line, .. } => *line,
        }
    }
}

/// Caller-visible diagnostic emitted on the parser's side channel.
///
/// Diagnostics never abort the stream; `Io` is the one terminal case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseDiagnostic {
    Malformed { line: u64, reason: String },
    UnknownKind { line: u64, kind: String },
    Io { reason: String },
}

impl ParseDiagnostic {
    pub fn line(&self) -> Option<u64> {
        match self {
            ParseDiagnostic::Malformed { line, .. } | ParseDiagnostic::UnknownKind { line, .. } => {
                Some(*line)
            }
            ParseDiagnostic::Io { .. } => None,
        }
    }
}
