use crate::Result;
use rusqlite::Connection;

// Schema version (increment when changing table definitions)
pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            project_path TEXT NOT NULL,
            project_dir TEXT NOT NULL,
            project_name TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT,
            message_count INTEGER NOT NULL DEFAULT 0,
            summary TEXT,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            parent_id TEXT,
            is_sidechain INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS tool_uses (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            message_id TEXT,
            name TEXT NOT NULL,
            input TEXT NOT NULL,
            result TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            timestamp TEXT NOT NULL,
            duration_ms INTEGER
        );

        CREATE TABLE IF NOT EXISTS links (
            source_type TEXT NOT NULL,
            source_id TEXT NOT NULL,
            target_type TEXT NOT NULL,
            target_id TEXT NOT NULL,
            relationship TEXT NOT NULL,
            weight REAL NOT NULL DEFAULT 1.0,
            created_at TEXT NOT NULL,
            PRIMARY KEY (source_type, source_id, target_type, target_id, relationship)
        );

        CREATE TABLE IF NOT EXISTS extraction_state (
            file_path TEXT PRIMARY KEY,
            mtime_unix INTEGER NOT NULL,
            size_bytes INTEGER NOT NULL,
            last_line INTEGER NOT NULL DEFAULT 0,
            last_extracted_at TEXT NOT NULL,
            session_id TEXT,
            status TEXT NOT NULL DEFAULT 'pending'
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_project_dir ON sessions(project_dir);
        CREATE INDEX IF NOT EXISTS idx_sessions_start ON sessions(start_time DESC);
        CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id);
        CREATE INDEX IF NOT EXISTS idx_messages_ts ON messages(timestamp DESC);
        CREATE INDEX IF NOT EXISTS idx_tool_uses_session ON tool_uses(session_id);
        CREATE INDEX IF NOT EXISTS idx_links_source ON links(source_type, source_id);
        CREATE INDEX IF NOT EXISTS idx_links_target ON links(target_type, target_id);

        -- FTS5 shadow over message content. External content: the message
        -- table stays the primary copy and the triggers below are the only
        -- writers of the index.
        CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
            content,
            content=messages,
            content_rowid=rowid
        );

        CREATE TRIGGER IF NOT EXISTS messages_ai AFTER INSERT ON messages BEGIN
            INSERT INTO messages_fts(rowid, content)
            VALUES (new.rowid, new.content);
        END;

        CREATE TRIGGER IF NOT EXISTS messages_ad AFTER DELETE ON messages BEGIN
            INSERT INTO messages_fts(messages_fts, rowid, content)
            VALUES ('delete', old.rowid, old.content);
        END;

        CREATE TRIGGER IF NOT EXISTS messages_au AFTER UPDATE ON messages BEGIN
            INSERT INTO messages_fts(messages_fts, rowid, content)
            VALUES ('delete', old.rowid, old.content);
            INSERT INTO messages_fts(rowid, content)
            VALUES (new.rowid, new.content);
        END;
        "#,
    )?;

    conn.execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;

    Ok(())
}
