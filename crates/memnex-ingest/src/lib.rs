// Session-file ingestion: wire schema, streaming parser, content
// extraction and discovery. Raw logs stay the source of truth; this crate
// only lowers them into the records the store persists.

pub mod discovery;
pub mod extract;
pub mod parser;
pub(crate) mod schema;

pub use discovery::{FsSource, SessionFile, SessionSource};
pub use extract::{Extraction, Extractor, SessionMeta, ToolResultUpdate};
pub use parser::{EventStream, StreamItem};

pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the ingest layer
#[derive(Debug)]
pub enum Error {
    /// IO operation failed
    Io(std::io::Error),

    /// Session-log source missing or unreadable
    Source(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Source(msg) => write!(f, "Source error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Source(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
