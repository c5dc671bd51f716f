use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::path::Path;

/// Builds a synthetic session file line by line.
///
/// Timestamps advance one second per appended record so ordering is
/// deterministic without wall-clock involvement.
pub struct SessionFileBuilder {
    session_id: String,
    cwd: Option<String>,
    lines: Vec<String>,
    clock: DateTime<Utc>,
    counter: usize,
}

impl SessionFileBuilder {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            cwd: None,
            lines: Vec::new(),
            clock: DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            counter: 0,
        }
    }

    pub fn with_cwd(mut self, cwd: &str) -> Self {
        self.cwd = Some(cwd.to_string());
        self
    }

    fn next_uuid(&mut self) -> String {
        self.counter += 1;
        format!("{}-u{:05}", self.session_id, self.counter)
    }

    fn next_timestamp(&mut self) -> String {
        self.clock = self.clock + Duration::seconds(1);
        self.clock.to_rfc3339()
    }

    pub fn user(mut self, text: &str) -> Self {
        let uuid = self.next_uuid();
        let timestamp = self.next_timestamp();
        let mut record = json!({
            "type": "user",
            "uuid": uuid,
            "sessionId": self.session_id,
            "timestamp": timestamp,
            "message": {"role": "user", "content": text},
        });
        if let Some(cwd) = &self.cwd {
            record["cwd"] = json!(cwd);
        }
        self.lines.push(record.to_string());
        self
    }

    pub fn assistant(mut self, text: &str) -> Self {
        let uuid = self.next_uuid();
        let timestamp = self.next_timestamp();
        let record = json!({
            "type": "assistant",
            "uuid": uuid,
            "sessionId": self.session_id,
            "timestamp": timestamp,
            "message": {"content": [{"type": "text", "text": text}]},
        });
        self.lines.push(record.to_string());
        self
    }

    pub fn assistant_with_tool(
        mut self,
        text: &str,
        tool_id: &str,
        tool_name: &str,
        input: serde_json::Value,
    ) -> Self {
        let uuid = self.next_uuid();
        let timestamp = self.next_timestamp();
        let record = json!({
            "type": "assistant",
            "uuid": uuid,
            "sessionId": self.session_id,
            "timestamp": timestamp,
            "message": {"content": [
                {"type": "text", "text": text},
                {"type": "tool_use", "id": tool_id, "name": tool_name, "input": input},
            ]},
        });
        self.lines.push(record.to_string());
        self
    }

    pub fn tool_result(mut self, tool_id: &str, output: &str, is_error: bool) -> Self {
        let uuid = self.next_uuid();
        let timestamp = self.next_timestamp();
        let record = json!({
            "type": "user",
            "uuid": uuid,
            "sessionId": self.session_id,
            "timestamp": timestamp,
            "message": {"role": "user", "content": [
                {"type": "tool_result", "tool_use_id": tool_id, "content": output, "is_error": is_error},
            ]},
        });
        self.lines.push(record.to_string());
        self
    }

    pub fn summary(mut self, text: &str) -> Self {
        let record = json!({"type": "summary", "summary": text});
        self.lines.push(record.to_string());
        self
    }

    /// Append a raw line verbatim; the way to plant corruption.
    pub fn raw(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn build(&self) -> String {
        let mut body = self.lines.join("\n");
        body.push('\n');
        body
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.build())?;
        Ok(())
    }
}
