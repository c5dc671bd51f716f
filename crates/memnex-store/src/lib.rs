// SQLite store for the memory corpus.
//
// NOTE: Storage Design Rationale
//
// Why materialize (not point at raw logs)?
// - Queries span every session; re-parsing logs per query is O(corpus)
// - Full-text search needs a persistent index over message content
// - Raw logs stay on disk untouched; a wiped store is always rebuildable
//
// Why an FTS5 external-content shadow with triggers?
// - The shadow can never drift from the message table if the engine
//   maintains it; repository code cannot forget a write path
// - Content-only indexing keeps the index small (ids and roles live in
//   the primary table)
//
// Why a recursive CTE for traversal (not application-side BFS)?
// - One statement per query instead of N+1 round trips
// - The query planner sees the whole walk; cycle checks ride along in SQL

mod db;
mod error;
pub mod queries;
mod schema;
pub mod search;

pub use db::{IntegrityStatus, Store};
pub use error::{Error, Result};
pub use search::{SearchHit, SearchOptions, SearchOutcome};
