//! Reduction of parsed events into the records the store persists.
//!
//! The extractor is fed events incrementally and drained in batches so a
//! large session never pins its full message list in memory. Tool results
//! that land after their tool use was already drained come back as late
//! updates for the caller to apply.

use memnex_types::{ContentBlock, MessageRecord, ParsedEvent, Role, ToolStatus, ToolUseRecord};
use std::collections::{HashMap, HashSet};

/// Session-level facts observed while extracting.
#[derive(Debug, Default, Clone)]
pub struct SessionMeta {
    pub session_id: Option<String>,
    pub cwd: Option<String>,
    pub summary: Option<String>,
    pub first_timestamp: Option<chrono::DateTime<chrono::Utc>>,
    pub last_timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

/// A tool result whose tool use was flushed in an earlier batch.
#[derive(Debug, Clone)]
pub struct ToolResultUpdate {
    pub tool_use_id: String,
    pub result: String,
    pub status: ToolStatus,
    pub duration_ms: Option<i64>,
}

/// One drained batch of extracted records.
#[derive(Debug, Default)]
pub struct Extraction {
    pub messages: Vec<MessageRecord>,
    pub tool_uses: Vec<ToolUseRecord>,
    pub late_results: Vec<ToolResultUpdate>,
}

pub struct Extractor {
    include_thinking: bool,
    messages: Vec<MessageRecord>,
    tool_uses: Vec<ToolUseRecord>,
    // tool_use id -> index into the current tool_uses buffer
    open_tools: HashMap<String, usize>,
    // tool uses already drained in a previous batch
    flushed_tools: HashSet<String>,
    late_results: Vec<ToolResultUpdate>,
    meta: SessionMeta,
}

impl Extractor {
    pub fn new(include_thinking: bool) -> Self {
        Self {
            include_thinking,
            messages: Vec::new(),
            tool_uses: Vec::new(),
            open_tools: HashMap::new(),
            flushed_tools: HashSet::new(),
            late_results: Vec::new(),
            meta: SessionMeta::default(),
        }
    }

    /// Number of messages buffered since the last drain.
    pub fn buffered_messages(&self) -> usize {
        self.messages.len()
    }

    pub fn meta(&self) -> &SessionMeta {
        &self.meta
    }

    pub fn feed(&mut self, event: ParsedEvent) {
        match event {
            ParsedEvent::User { meta, blocks } => {
                self.observe(&meta);
                let content = self.join_text(&blocks);
                self.messages.push(MessageRecord {
                    id: meta.uuid,
                    session_id: meta.session_id,
                    role: Role::User,
                    content,
                    timestamp: meta.timestamp,
                    parent_id: meta.parent_uuid,
                    is_sidechain: meta.is_sidechain,
                });
            }

            ParsedEvent::Assistant { meta, blocks } => {
                self.observe(&meta);
                let content = self.join_text(&blocks);
                for block in &blocks {
                    if let ContentBlock::ToolUse { id, name, input } = block {
                        let index = self.tool_uses.len();
                        self.tool_uses.push(ToolUseRecord {
                            id: id.clone(),
                            session_id: meta.session_id.clone(),
                            message_id: Some(meta.uuid.clone()),
                            name: name.clone(),
                            input: input.clone(),
                            result: None,
                            status: ToolStatus::Pending,
                            timestamp: meta.timestamp,
                            duration_ms: None,
                        });
                        self.open_tools.insert(id.clone(), index);
                    }
                }
                self.messages.push(MessageRecord {
                    id: meta.uuid,
                    session_id: meta.session_id,
                    role: Role::Assistant,
                    content,
                    timestamp: meta.timestamp,
                    parent_id: meta.parent_uuid,
                    is_sidechain: meta.is_sidechain,
                });
            }

            ParsedEvent::ToolUse {
                meta,
                id,
                name,
                input,
            } => {
                self.observe(&meta);
                let index = self.tool_uses.len();
                self.tool_uses.push(ToolUseRecord {
                    id: id.clone(),
                    session_id: meta.session_id,
                    message_id: None,
                    name,
                    input,
                    result: None,
                    status: ToolStatus::Pending,
                    timestamp: meta.timestamp,
                    duration_ms: None,
                });
                self.open_tools.insert(id, index);
            }

            ParsedEvent::ToolResult {
                meta,
                tool_use_id,
                content,
                is_error,
                duration_ms,
            } => {
                self.observe(&meta);
                let status = if is_error {
                    ToolStatus::Error
                } else {
                    ToolStatus::Success
                };
                if let Some(&index) = self.open_tools.get(&tool_use_id) {
                    let record = &mut self.tool_uses[index];
                    record.result = Some(content);
                    record.status = status;
                    record.duration_ms = duration_ms;
                } else if self.flushed_tools.contains(&tool_use_id) {
                    self.late_results.push(ToolResultUpdate {
                        tool_use_id,
                        result: content,
                        status,
                        duration_ms,
                    });
                }
                // Results with no matching tool use are dropped; nothing to
                // attach them to.
            }

            ParsedEvent::Summary { summary, .. } => {
                self.meta.summary = Some(summary);
            }

            ParsedEvent::System { .. } => {}
        }
    }

    /// Drain everything buffered since the last call.
    pub fn drain(&mut self) -> Extraction {
        for id in self.open_tools.drain().map(|(id, _)| id) {
            self.flushed_tools.insert(id);
        }
        Extraction {
            messages: std::mem::take(&mut self.messages),
            tool_uses: std::mem::take(&mut self.tool_uses),
            late_results: std::mem::take(&mut self.late_results),
        }
    }

    fn observe(&mut self, meta: &memnex_types::EventMeta) {
        if self.meta.session_id.is_none() && !meta.session_id.is_empty() {
            self.meta.session_id = Some(meta.session_id.clone());
        }
        if self.meta.cwd.is_none() {
            self.meta.cwd = meta.cwd.clone();
        }
        if self.meta.first_timestamp.is_none() {
            self.meta.first_timestamp = Some(meta.timestamp);
        }
        self.meta.last_timestamp = Some(meta.timestamp);
    }

    fn join_text(&self, blocks: &[ContentBlock]) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for block in blocks {
            match block {
                ContentBlock::Text { text } => parts.push(text),
                ContentBlock::Thinking { text } if self.include_thinking => parts.push(text),
                _ => {}
            }
        }
        normalize_whitespace(&parts.join(" "))
    }
}

/// Collapse runs of whitespace to single spaces and trim the ends.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One-shot extraction; convenience for dry runs and tests.
pub fn extract_all(
    events: impl IntoIterator<Item = ParsedEvent>,
    include_thinking: bool,
) -> (Extraction, SessionMeta) {
    let mut extractor = Extractor::new(include_thinking);
    for event in events {
        extractor.feed(event);
    }
    let batch = extractor.drain();
    let meta = extractor.meta().clone();
    (batch, meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use memnex_types::EventMeta;
    use serde_json::json;

    fn at(ts: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc)
    }

    fn meta(uuid: &str, ts: &str) -> EventMeta {
        EventMeta {
            line: 1,
            uuid: uuid.to_string(),
            parent_uuid: None,
            session_id: "s1".to_string(),
            timestamp: at(ts),
            is_sidechain: false,
            cwd: Some("/home/dev/project".to_string()),
        }
    }

    #[test]
    fn test_user_event_becomes_message() {
        let (batch, session) = extract_all(
            vec![ParsedEvent::User {
                meta: meta("u1", "2025-01-01T00:00:00Z"),
                blocks: vec![
                    ContentBlock::Text {
                        text: "  hello\n\n".to_string(),
                    },
                    ContentBlock::Text {
                        text: "world  ".to_string(),
                    },
                ],
            }],
            false,
        );
        assert_eq!(batch.messages.len(), 1);
        assert_eq!(batch.messages[0].content, "hello world");
        assert_eq!(batch.messages[0].role, Role::User);
        assert_eq!(session.session_id.as_deref(), Some("s1"));
        assert_eq!(session.cwd.as_deref(), Some("/home/dev/project"));
    }

    #[test]
    fn test_thinking_excluded_by_default() {
        let blocks = vec![
            ContentBlock::Thinking {
                text: "pondering".to_string(),
            },
            ContentBlock::Text {
                text: "answer".to_string(),
            },
        ];
        let (without, _) = extract_all(
            vec![ParsedEvent::Assistant {
                meta: meta("a1", "2025-01-01T00:00:00Z"),
                blocks: blocks.clone(),
            }],
            false,
        );
        assert_eq!(without.messages[0].content, "answer");

        let (with, _) = extract_all(
            vec![ParsedEvent::Assistant {
                meta: meta("a1", "2025-01-01T00:00:00Z"),
                blocks,
            }],
            true,
        );
        assert_eq!(with.messages[0].content, "pondering answer");
    }

    #[test]
    fn test_tool_use_links_to_assistant_message() {
        let (batch, _) = extract_all(
            vec![ParsedEvent::Assistant {
                meta: meta("a1", "2025-01-01T00:00:00Z"),
                blocks: vec![
                    ContentBlock::Text {
                        text: "running it".to_string(),
                    },
                    ContentBlock::ToolUse {
                        id: "t1".to_string(),
                        name: "bash".to_string(),
                        input: json!({"command": "ls"}),
                    },
                ],
            }],
            false,
        );
        assert_eq!(batch.tool_uses.len(), 1);
        let tool = &batch.tool_uses[0];
        assert_eq!(tool.message_id.as_deref(), Some("a1"));
        assert_eq!(tool.name, "bash");
        assert_eq!(tool.status, ToolStatus::Pending);
    }

    #[test]
    fn test_tool_result_fills_matching_use() {
        let (batch, _) = extract_all(
            vec![
                ParsedEvent::Assistant {
                    meta: meta("a1", "2025-01-01T00:00:00Z"),
                    blocks: vec![ContentBlock::ToolUse {
                        id: "t1".to_string(),
                        name: "bash".to_string(),
                        input: json!({"command": "ls"}),
                    }],
                },
                ParsedEvent::ToolResult {
                    meta: meta("u2", "2025-01-01T00:00:05Z"),
                    tool_use_id: "t1".to_string(),
                    content: "src lib.rs".to_string(),
                    is_error: false,
                    duration_ms: Some(120),
                },
            ],
            false,
        );
        let tool = &batch.tool_uses[0];
        assert_eq!(tool.status, ToolStatus::Success);
        assert_eq!(tool.result.as_deref(), Some("src lib.rs"));
        assert_eq!(tool.duration_ms, Some(120));
    }

    #[test]
    fn test_unmatched_tool_use_stays_pending() {
        let (batch, _) = extract_all(
            vec![ParsedEvent::Assistant {
                meta: meta("a1", "2025-01-01T00:00:00Z"),
                blocks: vec![ContentBlock::ToolUse {
                    id: "t1".to_string(),
                    name: "bash".to_string(),
                    input: json!({}),
                }],
            }],
            false,
        );
        assert_eq!(batch.tool_uses[0].status, ToolStatus::Pending);
    }

    #[test]
    fn test_result_after_drain_comes_back_late() {
        let mut extractor = Extractor::new(false);
        extractor.feed(ParsedEvent::Assistant {
            meta: meta("a1", "2025-01-01T00:00:00Z"),
            blocks: vec![ContentBlock::ToolUse {
                id: "t1".to_string(),
                name: "bash".to_string(),
                input: json!({}),
            }],
        });
        let first = extractor.drain();
        assert_eq!(first.tool_uses.len(), 1);
        assert!(first.late_results.is_empty());

        extractor.feed(ParsedEvent::ToolResult {
            meta: meta("u2", "2025-01-01T00:00:05Z"),
            tool_use_id: "t1".to_string(),
            content: "ok".to_string(),
            is_error: false,
            duration_ms: None,
        });
        let second = extractor.drain();
        assert!(second.tool_uses.is_empty());
        assert_eq!(second.late_results.len(), 1);
        assert_eq!(second.late_results[0].tool_use_id, "t1");
        assert_eq!(second.late_results[0].status, ToolStatus::Success);
    }

    #[test]
    fn test_summary_sets_meta_only() {
        let (batch, session) = extract_all(
            vec![ParsedEvent::Summary {
                line: 1,
                summary: "refactored the sync pipeline".to_string(),
                leaf_uuid: None,
            }],
            false,
        );
        assert!(batch.messages.is_empty());
        assert_eq!(
            session.summary.as_deref(),
            Some("refactored the sync pipeline")
        );
    }

    #[test]
    fn test_deterministic_output() {
        let events = || {
            vec![
                ParsedEvent::User {
                    meta: meta("u1", "2025-01-01T00:00:00Z"),
                    blocks: vec![ContentBlock::Text {
                        text: "same input".to_string(),
                    }],
                },
                ParsedEvent::Assistant {
                    meta: meta("a1", "2025-01-01T00:00:01Z"),
                    blocks: vec![ContentBlock::Text {
                        text: "same output".to_string(),
                    }],
                },
            ]
        };
        let (first, _) = extract_all(events(), false);
        let (second, _) = extract_all(events(), false);
        let a = serde_json::to_string(&first.messages).unwrap();
        let b = serde_json::to_string(&second.messages).unwrap();
        assert_eq!(a, b);
    }
}
