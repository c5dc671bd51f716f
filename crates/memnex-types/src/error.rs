use serde::Serialize;
use serde_json::{Value, json};

/// Stable error codes surfaced to callers and the JSON envelope.
///
/// The set is closed; new failure modes map onto an existing code or
/// `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    DbConnectionFailed,
    DbCorrupted,
    DbLocked,
    InvalidSessionId,
    SessionNotFound,
    SourceInaccessible,
    DiskFull,
    InvalidJson,
    UnknownFormat,
    InvalidArgument,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DbConnectionFailed => "DB_CONNECTION_FAILED",
            ErrorCode::DbCorrupted => "DB_CORRUPTED",
            ErrorCode::DbLocked => "DB_LOCKED",
            ErrorCode::InvalidSessionId => "INVALID_SESSION_ID",
            ErrorCode::SessionNotFound => "SESSION_NOT_FOUND",
            ErrorCode::SourceInaccessible => "SOURCE_INACCESSIBLE",
            ErrorCode::DiskFull => "DISK_FULL",
            ErrorCode::InvalidJson => "INVALID_JSON",
            ErrorCode::UnknownFormat => "UNKNOWN_FORMAT",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The machine-readable error shape: `{"error": {code, message, context?}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl ErrorEnvelope {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn to_json(&self) -> Value {
        json!({ "error": self })
    }
}
