use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Speaker of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Outcome of a tool invocation. `Pending` means no result record was seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
    Pending,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Success => "success",
            ToolStatus::Error => "error",
            ToolStatus::Pending => "pending",
        }
    }
}

impl FromStr for ToolStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ToolStatus::Success),
            "error" => Ok(ToolStatus::Error),
            "pending" => Ok(ToolStatus::Pending),
            other => Err(format!("unknown tool status: {}", other)),
        }
    }
}

/// Per-file extraction lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Pending,
    InProgress,
    Complete,
    Failed,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Pending => "pending",
            ExtractionStatus::InProgress => "in_progress",
            ExtractionStatus::Complete => "complete",
            ExtractionStatus::Failed => "failed",
        }
    }
}

impl FromStr for ExtractionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExtractionStatus::Pending),
            "in_progress" => Ok(ExtractionStatus::InProgress),
            "complete" => Ok(ExtractionStatus::Complete),
            "failed" => Ok(ExtractionStatus::Failed),
            other => Err(format!("unknown extraction status: {}", other)),
        }
    }
}

/// Endpoint kind of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Session,
    Message,
    Topic,
    Entity,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Session => "session",
            NodeType::Message => "message",
            NodeType::Topic => "topic",
            NodeType::Entity => "entity",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session" => Ok(NodeType::Session),
            "message" => Ok(NodeType::Message),
            "topic" => Ok(NodeType::Topic),
            "entity" => Ok(NodeType::Entity),
            other => Err(format!("unknown node type: {}", other)),
        }
    }
}

/// One recorded interaction, backed by one session file on disk.
///
/// `project_dir` is the filesystem-encoded form of `project_path` and is the
/// canonical lookup key; `message_count` is a cached count of owned messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub project_path: String,
    pub project_dir: String,
    pub project_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub message_count: i64,
    pub summary: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A searchable per-turn unit owned by a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub parent_id: Option<String>,
    pub is_sidechain: bool,
}

/// A structured tool invocation captured inside an assistant turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUseRecord {
    pub id: String,
    pub session_id: String,
    pub message_id: Option<String>,
    pub name: String,
    pub input: Value,
    pub result: Option<String>,
    pub status: ToolStatus,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: Option<i64>,
}

/// A directed, weighted relation between two identified items.
///
/// Identity is the five-column key (source, target, relationship); writes
/// upsert on it. Endpoints are validated only at query time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRecord {
    pub source_type: NodeType,
    pub source_id: String,
    pub target_type: NodeType,
    pub target_id: String,
    pub relationship: String,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

/// Incremental-sync bookkeeping, one row per session file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionState {
    pub file_path: String,
    pub mtime_unix: i64,
    pub size_bytes: i64,
    pub last_line: i64,
    pub last_extracted_at: DateTime<Utc>,
    pub session_id: Option<String>,
    pub status: ExtractionStatus,
}
