use memnex_types::ErrorCode;
use std::fmt;

/// Result type for memnex-store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the storage layer
#[derive(Debug)]
pub enum Error {
    /// Could not open or create the database file
    ConnectionFailed(String),

    /// The file exists but failed the integrity probe
    Corrupted(String),

    /// Lock wait exceeded the busy timeout
    Locked,

    /// Database operation failed
    Database(rusqlite::Error),

    /// IO operation failed
    Io(std::io::Error),

    /// Search was given an empty query
    EmptyQuery,

    /// Caller-supplied parameter is out of range
    InvalidArgument(String),
}

impl Error {
    /// Stable code for the surfaced form of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConnectionFailed(_) => ErrorCode::DbConnectionFailed,
            Error::Corrupted(_) => ErrorCode::DbCorrupted,
            Error::Locked => ErrorCode::DbLocked,
            Error::Database(_) | Error::Io(_) => ErrorCode::Unknown,
            Error::EmptyQuery | Error::InvalidArgument(_) => ErrorCode::InvalidArgument,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConnectionFailed(msg) => write!(f, "Could not open database: {}", msg),
            Error::Corrupted(msg) => write!(f, "Database is corrupted: {}", msg),
            Error::Locked => write!(f, "Database is locked by another operation"),
            Error::Database(err) => write!(f, "Database error: {}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::EmptyQuery => write!(f, "Search query must not be empty"),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(err) => Some(err),
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, _) = &err
            && matches!(
                failure.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            )
        {
            return Error::Locked;
        }
        Error::Database(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_mapping() {
        assert_eq!(Error::Locked.code(), ErrorCode::DbLocked);
        assert_eq!(Error::EmptyQuery.code(), ErrorCode::InvalidArgument);
        assert_eq!(
            Error::Corrupted("probe failed".into()).code(),
            ErrorCode::DbCorrupted
        );
    }
}
