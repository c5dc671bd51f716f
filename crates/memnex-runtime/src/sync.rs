//! Incremental sync pipeline: discover session files, stream-parse them,
//! persist extracted records, checkpoint after every file.
//!
//! One transaction per session file. Buffering is bounded: past the chunk
//! threshold the extractor is drained mid-file inside the same transaction,
//! so peak memory tracks the chunk size and not the file size.

use chrono::{DateTime, Utc};
use memnex_core::path;
use memnex_ingest::{EventStream, Extractor, SessionFile, SessionSource, StreamItem};
use memnex_store::queries::{extraction, link, message, session, tool_use};
use memnex_store::Store;
use memnex_types::{
    ExtractionState, ExtractionStatus, LinkRecord, NodeType, ParseDiagnostic, SessionRecord,
};
use serde_json::json;
use std::collections::HashSet;

use crate::checkpoint::{CheckpointManager, SyncCheckpoint};
use crate::lifecycle;
use crate::logging::ErrorLog;
use crate::{Error, Result};

/// Soft per-file buffer bound before a mid-file flush.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Sibling sessions linked per project on ingest.
const SAME_PROJECT_LINKS: usize = 5;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub force: bool,
    pub project: Option<String>,
    pub session: Option<String>,
    pub dry_run: bool,
    pub checkpoint_enabled: bool,
    pub include_thinking: bool,
    pub chunk_size: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            force: false,
            project: None,
            session: None,
            dry_run: false,
            checkpoint_enabled: true,
            include_thinking: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SyncProgress {
    Resuming { done: usize, total: usize },
    Discovering { discovered: usize },
    Extracting {
        current: usize,
        total: usize,
        session_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    FileNotFound,
    InvalidJson,
    StoreError,
    Unknown,
}

impl SyncErrorKind {
    /// Classify an underlying error message by recognizable substrings.
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();
        if lowered.contains("no such file")
            || lowered.contains("not found")
            || lowered.contains("os error 2")
        {
            SyncErrorKind::FileNotFound
        } else if lowered.contains("json")
            || lowered.contains("expected")
            || lowered.contains("eof while parsing")
        {
            SyncErrorKind::InvalidJson
        } else if lowered.contains("database") || lowered.contains("sqlite") || lowered.contains("locked") {
            SyncErrorKind::StoreError
        } else {
            SyncErrorKind::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncErrorKind::FileNotFound => "file_not_found",
            SyncErrorKind::InvalidJson => "invalid_json",
            SyncErrorKind::StoreError => "store_error",
            SyncErrorKind::Unknown => "unknown",
        }
    }

    fn code(&self) -> memnex_types::ErrorCode {
        match self {
            SyncErrorKind::FileNotFound => memnex_types::ErrorCode::SourceInaccessible,
            SyncErrorKind::InvalidJson => memnex_types::ErrorCode::InvalidJson,
            SyncErrorKind::StoreError => memnex_types::ErrorCode::DbConnectionFailed,
            SyncErrorKind::Unknown => memnex_types::ErrorCode::Unknown,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SyncError {
    pub file: String,
    pub kind: SyncErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
}

#[derive(Debug, Default, serde::Serialize)]
pub struct SyncReport {
    pub discovered: usize,
    pub processed: usize,
    pub skipped: usize,
    pub messages_inserted: usize,
    pub tool_uses_inserted: usize,
    pub errors: Vec<SyncError>,
    pub aborted: bool,
}

/// Run a sync pass. `store` is `None` only for dry runs, which parse and
/// count without touching persistence or checkpoints.
pub fn run(
    mut store: Option<&mut Store>,
    source: &dyn SessionSource,
    checkpoints: &CheckpointManager,
    error_log: Option<&ErrorLog>,
    options: &SyncOptions,
    on_progress: &mut dyn FnMut(&SyncProgress),
) -> Result<SyncReport> {
    let mut report = SyncReport::default();
    let use_checkpoint = options.checkpoint_enabled && !options.dry_run;

    // Resume probe before discovery so the announcement reflects the
    // interrupted run.
    let mut done: HashSet<String> = HashSet::new();
    let mut checkpoint = if use_checkpoint
        && let Some(previous) = checkpoints.load()
    {
        on_progress(&SyncProgress::Resuming {
            done: previous.completed.len(),
            total: previous.total,
        });
        done.extend(previous.completed.iter().cloned());
        previous
    } else {
        SyncCheckpoint::new(0)
    };

    let mut files = source.discover().map_err(Error::from)?;
    if let Some(project) = &options.project {
        let needle = project.to_lowercase();
        files.retain(|file| {
            let decoded = path::decode(&file.project_dir);
            path::project_name(&decoded).to_lowercase().contains(&needle)
        });
    }
    if let Some(session_filter) = &options.session {
        files.retain(|file| file.session_id.starts_with(session_filter.as_str()));
    }

    report.discovered = files.len();
    checkpoint.total = files.len();
    on_progress(&SyncProgress::Discovering {
        discovered: files.len(),
    });

    let total = files.len();
    for (index, file) in files.iter().enumerate() {
        if lifecycle::should_abort() {
            report.aborted = true;
            break;
        }

        let file_key = file.path.display().to_string();
        if done.contains(&file_key) {
            report.skipped += 1;
            continue;
        }

        let outcome = match store.as_deref_mut() {
            Some(store) => process_file(store, file, options, error_log, &mut report),
            None => dry_run_file(file, error_log, &mut report),
        };

        match outcome {
            Ok(FileOutcome::Skipped) => report.skipped += 1,
            Ok(FileOutcome::Processed { partial }) => {
                report.processed += 1;
                if partial {
                    report.aborted = true;
                }
            }
            Err(err) => {
                let message = err.to_string();
                record_error(
                    &mut report,
                    error_log,
                    SyncError {
                        file: file_key.clone(),
                        kind: SyncErrorKind::classify(&message),
                        message,
                        line: None,
                    },
                );
            }
        }

        if use_checkpoint {
            checkpoint.mark_completed(file_key);
            checkpoints.save(&checkpoint)?;
        }

        on_progress(&SyncProgress::Extracting {
            current: index + 1,
            total,
            session_id: file.session_id.clone(),
        });

        if report.aborted {
            break;
        }
    }

    if let Some(store) = store.as_deref_mut() {
        store.flush_wal()?;
    }

    if use_checkpoint && !report.aborted && checkpoint.completed.len() >= total {
        checkpoints.clear()?;
    }

    Ok(report)
}

enum FileOutcome {
    Skipped,
    Processed { partial: bool },
}

fn process_file(
    store: &mut Store,
    file: &SessionFile,
    options: &SyncOptions,
    error_log: Option<&ErrorLog>,
    report: &mut SyncReport,
) -> Result<FileOutcome> {
    let file_key = file.path.display().to_string();
    let prior = extraction::get(store.conn(), &file_key)?;

    if !options.force
        && let Some(state) = &prior
        && state.status == ExtractionStatus::Complete
        && state.mtime_unix == file.mtime_unix
        && state.size_bytes == file.size_bytes
    {
        return Ok(FileOutcome::Skipped);
    }

    let mut stream = EventStream::from_path(&file.path).map_err(Error::Io)?;
    let mut resumed = false;
    if !options.force
        && let Some(state) = &prior
        && state.status == ExtractionStatus::InProgress
        && state.last_line > 0
    {
        stream.skip_to_line(state.last_line as u64 + 1);
        resumed = true;
    }

    let decoded = path::decode(&file.project_dir);
    let project_name = path::project_name(&decoded);
    let now = Utc::now();
    let fallback_start = DateTime::<Utc>::from_timestamp(file.mtime_unix, 0).unwrap_or(now);

    // A resumed file already owns a session row whose start_time reflects
    // the lines extracted before the interruption.
    let prior_start = if resumed {
        session::get(store.conn(), &file.session_id)?.map(|record| record.start_time)
    } else {
        None
    };

    let mut extractor = Extractor::new(options.include_thinking);
    let mut messages_inserted = 0usize;
    let mut tool_uses_inserted = 0usize;
    let mut line_errors: Vec<SyncError> = Vec::new();
    let mut partial = false;

    let session_id = file.session_id.clone();
    let result: Result<()> = store.transaction(|tx| {
        // Messages reference their session; make sure the row exists before
        // the first flush.
        session::upsert(
            tx,
            &SessionRecord {
                id: session_id.clone(),
                project_path: decoded.clone(),
                project_dir: file.project_dir.clone(),
                project_name: project_name.clone(),
                start_time: prior_start.unwrap_or(fallback_start),
                end_time: None,
                message_count: 0,
                summary: None,
                updated_at: now,
            },
        )?;

        let mut flush =
            |tx: &rusqlite::Transaction<'_>, extractor: &mut Extractor| -> Result<()> {
                let batch = extractor.drain();
                messages_inserted += message::upsert_batch(tx, &batch.messages)?;
                tool_uses_inserted += tool_use::upsert_batch(tx, &batch.tool_uses)?;
                for late in &batch.late_results {
                    tool_use::update_result(
                        tx,
                        &late.tool_use_id,
                        &late.result,
                        late.status,
                        late.duration_ms,
                    )?;
                }
                Ok(())
            };

        for item in &mut stream {
            match item {
                StreamItem::Event(event) => extractor.feed(event),
                StreamItem::Diagnostic(ParseDiagnostic::Malformed { line, reason }) => {
                    line_errors.push(SyncError {
                        file: file_key.clone(),
                        kind: SyncErrorKind::InvalidJson,
                        message: reason,
                        line: Some(line),
                    });
                }
                StreamItem::Diagnostic(ParseDiagnostic::UnknownKind { .. }) => {}
                StreamItem::Diagnostic(ParseDiagnostic::Io { reason }) => {
                    return Err(Error::Io(std::io::Error::other(reason)));
                }
            }

            if extractor.buffered_messages() >= options.chunk_size {
                flush(tx, &mut extractor)?;
                if lifecycle::should_abort() {
                    partial = true;
                    break;
                }
            }
        }
        flush(tx, &mut extractor)?;

        let meta = extractor.meta().clone();
        let candidate_start = meta.first_timestamp.unwrap_or(fallback_start);
        let start_time = match prior_start {
            Some(previous) => previous.min(candidate_start),
            None => candidate_start,
        };
        // The records' cwd is authoritative: the encoded directory name
        // cannot distinguish a dash in a path segment from a separator.
        let (final_path, final_name) = match &meta.cwd {
            Some(cwd) => (cwd.clone(), path::project_name(cwd)),
            None => (decoded.clone(), project_name.clone()),
        };
        session::upsert(
            tx,
            &SessionRecord {
                id: session_id.clone(),
                project_path: final_path,
                project_dir: file.project_dir.clone(),
                project_name: final_name,
                start_time,
                end_time: meta.last_timestamp,
                message_count: 0,
                summary: meta.summary.clone(),
                updated_at: now,
            },
        )?;
        message::refresh_session_count(tx, &session_id)?;

        if !partial {
            seed_links(tx, &session_id, &file.project_dir, meta.summary.as_deref(), now)?;
        }

        extraction::upsert(
            tx,
            &ExtractionState {
                file_path: file_key.clone(),
                mtime_unix: file.mtime_unix,
                size_bytes: file.size_bytes,
                last_line: stream.current_line() as i64,
                last_extracted_at: now,
                session_id: Some(session_id.clone()),
                status: if partial {
                    ExtractionStatus::InProgress
                } else {
                    ExtractionStatus::Complete
                },
            },
        )?;

        Ok(())
    });
    result?;

    for error in line_errors {
        record_error(report, error_log, error);
    }
    report.messages_inserted += messages_inserted;
    report.tool_uses_inserted += tool_uses_inserted;

    Ok(FileOutcome::Processed { partial })
}

fn dry_run_file(
    file: &SessionFile,
    error_log: Option<&ErrorLog>,
    report: &mut SyncReport,
) -> Result<FileOutcome> {
    let mut stream = EventStream::from_path(&file.path).map_err(Error::Io)?;
    let mut extractor = Extractor::new(false);
    let file_key = file.path.display().to_string();

    for item in &mut stream {
        match item {
            StreamItem::Event(event) => extractor.feed(event),
            StreamItem::Diagnostic(ParseDiagnostic::Malformed { line, reason }) => {
                record_error(
                    report,
                    error_log,
                    SyncError {
                        file: file_key.clone(),
                        kind: SyncErrorKind::InvalidJson,
                        message: reason,
                        line: Some(line),
                    },
                );
            }
            StreamItem::Diagnostic(ParseDiagnostic::UnknownKind { .. }) => {}
            StreamItem::Diagnostic(ParseDiagnostic::Io { reason }) => {
                return Err(Error::Io(std::io::Error::other(reason)));
            }
        }
    }

    let batch = extractor.drain();
    report.messages_inserted += batch.messages.len();
    report.tool_uses_inserted += batch.tool_uses.len();
    Ok(FileOutcome::Processed { partial: false })
}

/// Seed the link graph from what ingestion already knows: the session's
/// summary becomes a topic edge, and sibling sessions in the same project
/// become session edges.
fn seed_links(
    conn: &rusqlite::Transaction<'_>,
    session_id: &str,
    project_dir: &str,
    summary: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    if let Some(summary) = summary {
        let topic = topic_id(summary);
        if !topic.is_empty() {
            link::upsert(
                conn,
                &LinkRecord {
                    source_type: NodeType::Session,
                    source_id: session_id.to_string(),
                    target_type: NodeType::Topic,
                    target_id: topic,
                    relationship: "discusses".to_string(),
                    weight: 1.0,
                    created_at: now,
                },
            )?;
        }
    }

    for sibling in session::ids_for_project_dir(conn, project_dir, session_id, SAME_PROJECT_LINKS)? {
        link::upsert(
            conn,
            &LinkRecord {
                source_type: NodeType::Session,
                source_id: session_id.to_string(),
                target_type: NodeType::Session,
                target_id: sibling,
                relationship: "same_project".to_string(),
                weight: 0.5,
                created_at: now,
            },
        )?;
    }

    Ok(())
}

fn topic_id(summary: &str) -> String {
    let normalized: String = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    normalized.chars().take(80).collect::<String>().to_lowercase()
}

pub(crate) fn record_error(report: &mut SyncReport, error_log: Option<&ErrorLog>, error: SyncError) {
    if let Some(log) = error_log {
        let context = match error.line {
            Some(line) => json!({"file": error.file, "line": line}),
            None => json!({"file": error.file, "kind": error.kind.as_str()}),
        };
        let _ = log.append(error.kind.code(), &error.message, Some(&context));
    }
    report.errors.push(error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_substring() {
        assert_eq!(
            SyncErrorKind::classify("No such file or directory (os error 2)"),
            SyncErrorKind::FileNotFound
        );
        assert_eq!(
            SyncErrorKind::classify("EOF while parsing a JSON value"),
            SyncErrorKind::InvalidJson
        );
        assert_eq!(
            SyncErrorKind::classify("SQLite failure: disk image malformed"),
            SyncErrorKind::StoreError
        );
        assert_eq!(
            SyncErrorKind::classify("something else entirely"),
            SyncErrorKind::Unknown
        );
    }

    #[test]
    fn test_topic_id_normalizes() {
        assert_eq!(topic_id("  Fix  the   Parser  "), "fix the parser");
        let long = "word ".repeat(40);
        assert!(topic_id(&long).chars().count() <= 80);
    }
}
