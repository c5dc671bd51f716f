use memnex_types::ErrorCode;
use std::fmt;

/// Result type for memnex-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the runtime layer
#[derive(Debug)]
pub enum Error {
    /// Storage layer error
    Store(memnex_store::Error),

    /// Ingest layer error
    Ingest(memnex_ingest::Error),

    /// Core utility error
    Core(memnex_core::Error),

    /// IO operation failed
    Io(std::io::Error),

    /// Serialization failed
    Json(serde_json::Error),

    /// Configuration error
    Config(String),

    /// Caller-supplied input is invalid
    InvalidArgument(String),

    /// No session matches the given id or prefix
    SessionNotFound(String),

    /// An id prefix matches more than one session
    AmbiguousSessionId(String),

    /// No sessions match the given project
    ProjectNotFound(String),
}

impl Error {
    /// Stable code for the surfaced form of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Store(err) => err.code(),
            Error::Ingest(memnex_ingest::Error::Source(_)) => ErrorCode::SourceInaccessible,
            Error::Ingest(memnex_ingest::Error::Io(err)) => io_code(err),
            Error::Core(memnex_core::Error::Parse(_)) => ErrorCode::InvalidArgument,
            Error::Core(_) => ErrorCode::Unknown,
            Error::Io(err) => io_code(err),
            Error::Json(_) => ErrorCode::InvalidJson,
            Error::Config(_) => ErrorCode::UnknownFormat,
            Error::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Error::SessionNotFound(_) | Error::ProjectNotFound(_) => ErrorCode::SessionNotFound,
            Error::AmbiguousSessionId(_) => ErrorCode::InvalidSessionId,
        }
    }
}

fn io_code(err: &std::io::Error) -> ErrorCode {
    match err.kind() {
        std::io::ErrorKind::StorageFull => ErrorCode::DiskFull,
        std::io::ErrorKind::NotFound => ErrorCode::SourceInaccessible,
        _ => ErrorCode::Unknown,
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Store(err) => write!(f, "{}", err),
            Error::Ingest(err) => write!(f, "{}", err),
            Error::Core(err) => write!(f, "{}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Json(err) => write!(f, "JSON error: {}", err),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::SessionNotFound(id) => write!(f, "No session found matching '{}'", id),
            Error::AmbiguousSessionId(prefix) => {
                write!(f, "Session id prefix '{}' matches multiple sessions", prefix)
            }
            Error::ProjectNotFound(name) => write!(f, "No sessions found for project '{}'", name),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(err) => Some(err),
            Error::Ingest(err) => Some(err),
            Error::Core(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<memnex_store::Error> for Error {
    fn from(err: memnex_store::Error) -> Self {
        Error::Store(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Store(memnex_store::Error::from(err))
    }
}

impl From<memnex_ingest::Error> for Error {
    fn from(err: memnex_ingest::Error) -> Self {
        Error::Ingest(err)
    }
}

impl From<memnex_core::Error> for Error {
    fn from(err: memnex_core::Error) -> Self {
        Error::Core(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_mapping() {
        assert_eq!(
            Error::SessionNotFound("abc".into()).code(),
            ErrorCode::SessionNotFound
        );
        assert_eq!(
            Error::AmbiguousSessionId("ab".into()).code(),
            ErrorCode::InvalidSessionId
        );
        assert_eq!(
            Error::Ingest(memnex_ingest::Error::Source("gone".into())).code(),
            ErrorCode::SourceInaccessible
        );
        assert_eq!(
            Error::Store(memnex_store::Error::Locked).code(),
            ErrorCode::DbLocked
        );
    }
}
