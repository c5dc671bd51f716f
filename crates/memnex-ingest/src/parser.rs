//! Streaming event parser.
//!
//! A session file is read line by line and lowered into typed events; the
//! whole file is never held in memory. Malformed or unrecognized lines turn
//! into diagnostics on the same stream and never abort it.

use chrono::{DateTime, Utc};
use memnex_types::{ContentBlock, EventMeta, ParseDiagnostic, ParsedEvent};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::schema::{
    AssistantContent, RawRecord, TagOnly, UserContent, flatten_result_content, result_duration_ms,
};

/// One item of the parse stream: an event, or a caller-visible diagnostic.
#[derive(Debug)]
pub enum StreamItem {
    Event(ParsedEvent),
    Diagnostic(ParseDiagnostic),
}

/// Lazy, forward-only event stream over one session file.
pub struct EventStream<R: BufRead> {
    reader: R,
    line_no: u64,
    pending: VecDeque<StreamItem>,
    done: bool,
    buf: String,
}

impl EventStream<BufReader<File>> {
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> EventStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            pending: VecDeque::new(),
            done: false,
            buf: String::new(),
        }
    }

    /// Discard lines up to but not including `start_line` without parsing
    /// their payload. Used when resuming a partially extracted file.
    pub fn skip_to_line(&mut self, start_line: u64) {
        while self.line_no + 1 < start_line {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return;
                }
                Ok(_) => self.line_no += 1,
                Err(err) => {
                    self.pending.push_back(StreamItem::Diagnostic(ParseDiagnostic::Io {
                        reason: err.to_string(),
                    }));
                    self.done = true;
                    return;
                }
            }
        }
    }

    /// Line number of the most recently consumed line.
    pub fn current_line(&self) -> u64 {
        self.line_no
    }

    fn lower_line(&mut self) {
        let line = self.buf.trim();
        if line.is_empty() {
            return;
        }

        match serde_json::from_str::<RawRecord>(line) {
            Ok(record) => self.lower_record(record),
            Err(err) => {
                self.pending
                    .push_back(StreamItem::Diagnostic(ParseDiagnostic::Malformed {
                        line: self.line_no,
                        reason: err.to_string(),
                    }));
            }
        }
    }

    fn lower_record(&mut self, record: RawRecord) {
        let line = self.line_no;
        match record {
            RawRecord::User(user) => {
                let meta = EventMeta {
                    line,
                    uuid: user.uuid,
                    parent_uuid: user.parent_uuid,
                    session_id: user.session_id,
                    timestamp: parse_timestamp(&user.timestamp),
                    is_sidechain: user.is_sidechain,
                    cwd: user.cwd,
                };
                let duration_ms = result_duration_ms(user.tool_use_result.as_ref());

                let mut blocks = Vec::new();
                let mut results = Vec::new();
                for content in user.message.content {
                    match content {
                        UserContent::Text { text } => blocks.push(ContentBlock::Text { text }),
                        UserContent::ToolResult {
                            tool_use_id,
                            content,
                            is_error,
                        } => {
                            let flattened = content
                                .as_ref()
                                .map(flatten_result_content)
                                .unwrap_or_default();
                            results.push(ParsedEvent::ToolResult {
                                meta: meta.clone(),
                                tool_use_id,
                                content: flattened,
                                is_error,
                                duration_ms,
                            });
                        }
                        UserContent::Image | UserContent::Unknown => {}
                    }
                }

                if !blocks.is_empty() {
                    self.pending
                        .push_back(StreamItem::Event(ParsedEvent::User { meta, blocks }));
                }
                for result in results {
                    self.pending.push_back(StreamItem::Event(result));
                }
            }

            RawRecord::Assistant(asst) => {
                let meta = EventMeta {
                    line,
                    uuid: asst.uuid,
                    parent_uuid: asst.parent_uuid,
                    session_id: asst.session_id,
                    timestamp: parse_timestamp(&asst.timestamp),
                    is_sidechain: asst.is_sidechain,
                    cwd: asst.cwd,
                };

                let mut blocks = Vec::new();
                for content in asst.message.content {
                    match content {
                        AssistantContent::Text { text } => {
                            blocks.push(ContentBlock::Text { text });
                        }
                        AssistantContent::Thinking { thinking } => {
                            blocks.push(ContentBlock::Thinking { text: thinking });
                        }
                        AssistantContent::ToolUse { id, name, input } => {
                            blocks.push(ContentBlock::ToolUse { id, name, input });
                        }
                        AssistantContent::Unknown => {}
                    }
                }

                if !blocks.is_empty() {
                    self.pending
                        .push_back(StreamItem::Event(ParsedEvent::Assistant { meta, blocks }));
                }
            }

            RawRecord::ToolUse(tool) => {
                let meta = EventMeta {
                    line,
                    uuid: tool.uuid,
                    parent_uuid: tool.parent_uuid,
                    session_id: tool.session_id,
                    timestamp: parse_timestamp(&tool.timestamp),
                    is_sidechain: tool.is_sidechain,
                    cwd: None,
                };
                self.pending.push_back(StreamItem::Event(ParsedEvent::ToolUse {
                    meta,
                    id: tool.id,
                    name: tool.name,
                    input: tool.input,
                }));
            }

            RawRecord::Summary(summary) => {
                self.pending.push_back(StreamItem::Event(ParsedEvent::Summary {
                    line,
                    summary: summary.summary,
                    leaf_uuid: summary.leaf_uuid,
                }));
            }

            RawRecord::System(system) => {
                let meta = EventMeta {
                    line,
                    uuid: system.uuid.unwrap_or_default(),
                    parent_uuid: system.parent_uuid,
                    session_id: system.session_id.unwrap_or_default(),
                    timestamp: system
                        .timestamp
                        .as_deref()
                        .map(parse_timestamp)
                        .unwrap_or_else(epoch),
                    is_sidechain: system.is_sidechain,
                    cwd: None,
                };
                self.pending.push_back(StreamItem::Event(ParsedEvent::System {
                    meta,
                    subtype: system.subtype,
                    content: system.content,
                }));
            }

            // Recognized but carrying nothing the store wants.
            RawRecord::FileHistorySnapshot | RawRecord::Progress => {}

            RawRecord::Unknown => {
                let kind = serde_json::from_str::<TagOnly>(self.buf.trim())
                    .ok()
                    .and_then(|tag| tag.kind)
                    .unwrap_or_else(|| "<missing>".to_string());
                self.pending
                    .push_back(StreamItem::Diagnostic(ParseDiagnostic::UnknownKind {
                        line: self.line_no,
                        kind,
                    }));
            }
        }
    }
}

impl<R: BufRead> Iterator for EventStream<R> {
    type Item = StreamItem;

    fn next(&mut self) -> Option<StreamItem> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            if self.done {
                return None;
            }

            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => {
                    self.done = true;
                }
                Ok(_) => {
                    self.line_no += 1;
                    self.lower_line();
                }
                Err(err) => {
                    self.done = true;
                    self.pending.push_back(StreamItem::Diagnostic(ParseDiagnostic::Io {
                        reason: err.to_string(),
                    }));
                }
            }
        }
    }
}

fn parse_timestamp(ts: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| epoch())
}

// Deterministic fallback so identical inputs always lower identically.
fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream(input: &str) -> Vec<StreamItem> {
        EventStream::new(Cursor::new(input.to_string())).collect()
    }

    fn events(items: &[StreamItem]) -> usize {
        items
            .iter()
            .filter(|item| matches!(item, StreamItem::Event(_)))
            .count()
    }

    #[test]
    fn test_user_line_yields_one_event() {
        let items = stream(
            r#"{"type":"user","uuid":"u1","sessionId":"s1","timestamp":"2025-01-01T00:00:00Z","message":{"role":"user","content":"hello world"}}"#,
        );
        assert_eq!(items.len(), 1);
        match &items[0] {
            StreamItem::Event(ParsedEvent::User { meta, blocks }) => {
                assert_eq!(meta.line, 1);
                assert_eq!(blocks.len(), 1);
            }
            other => panic!("expected user event, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_line_is_skipped_with_diagnostic() {
        let input = concat!(
            r#"{"type":"user","uuid":"u1","sessionId":"s1","timestamp":"2025-01-01T00:00:00Z","message":{"role":"user","content":"first"}}"#,
            "\n{truncated\n",
            r#"{"type":"user","uuid":"u2","sessionId":"s1","timestamp":"2025-01-01T00:01:00Z","message":{"role":"user","content":"second"}}"#,
        );
        let items = stream(input);
        assert_eq!(items.len(), 3);
        assert!(matches!(
            &items[1],
            StreamItem::Diagnostic(ParseDiagnostic::Malformed { line: 2, .. })
        ));
        assert_eq!(events(&items), 2);
    }

    #[test]
    fn test_unknown_tag_reports_kind_and_continues() {
        let input = concat!(
            r#"{"type":"queue-operation","operation":"enqueue","sessionId":"s1"}"#,
            "\n",
            r#"{"type":"summary","summary":"worked on the parser"}"#,
        );
        let items = stream(input);
        assert!(matches!(
            &items[0],
            StreamItem::Diagnostic(ParseDiagnostic::UnknownKind { line: 1, kind }) if kind == "queue-operation"
        ));
        assert!(matches!(
            &items[1],
            StreamItem::Event(ParsedEvent::Summary { summary, .. }) if summary == "worked on the parser"
        ));
    }

    #[test]
    fn test_snapshot_and_progress_cost_nothing() {
        let input = concat!(
            r#"{"type":"file-history-snapshot","messageId":"m1","snapshot":{"files":[]}}"#,
            "\n",
            r#"{"type":"progress","data":{"kind":"bash_progress"}}"#,
        );
        assert!(stream(input).is_empty());
    }

    #[test]
    fn test_tool_result_line_yields_tool_result_event() {
        let input = r#"{"type":"user","uuid":"u1","sessionId":"s1","timestamp":"2025-01-01T00:00:00Z","toolUseResult":{"durationMs":42},"message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t1","content":"done","is_error":false}]}}"#;
        let items = stream(input);
        assert_eq!(items.len(), 1);
        match &items[0] {
            StreamItem::Event(ParsedEvent::ToolResult {
                tool_use_id,
                content,
                is_error,
                duration_ms,
                ..
            }) => {
                assert_eq!(tool_use_id, "t1");
                assert_eq!(content, "done");
                assert!(!is_error);
                assert_eq!(*duration_ms, Some(42));
            }
            other => panic!("expected tool result, got {:?}", other),
        }
    }

    #[test]
    fn test_skip_to_line_discards_prefix() {
        let input = concat!(
            r#"{"type":"user","uuid":"u1","sessionId":"s1","timestamp":"2025-01-01T00:00:00Z","message":{"role":"user","content":"one"}}"#,
            "\n",
            r#"{"type":"user","uuid":"u2","sessionId":"s1","timestamp":"2025-01-01T00:01:00Z","message":{"role":"user","content":"two"}}"#,
            "\n",
            r#"{"type":"user","uuid":"u3","sessionId":"s1","timestamp":"2025-01-01T00:02:00Z","message":{"role":"user","content":"three"}}"#,
        );
        let mut parser = EventStream::new(Cursor::new(input.to_string()));
        parser.skip_to_line(3);
        let items: Vec<StreamItem> = parser.collect();
        assert_eq!(items.len(), 1);
        match &items[0] {
            StreamItem::Event(ParsedEvent::User { meta, .. }) => {
                assert_eq!(meta.uuid, "u3");
                assert_eq!(meta.line, 3);
            }
            other => panic!("expected user event, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        let input = "\n\n";
        assert!(stream(input).is_empty());
    }

    #[test]
    fn test_line_numbers_are_one_based_and_stable() {
        let input = concat!(
            "not json\n",
            r#"{"type":"summary","summary":"s"}"#,
            "\n",
            "also not json\n",
        );
        let items = stream(input);
        let lines: Vec<Option<u64>> = items
            .iter()
            .map(|item| match item {
                StreamItem::Event(event) => Some(event.line()),
                StreamItem::Diagnostic(diag) => diag.line(),
            })
            .collect();
        assert_eq!(lines, vec![Some(1), Some(2), Some(3)]);
    }
}
