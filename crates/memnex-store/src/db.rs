use crate::{Error, Result, schema};
use rusqlite::{Connection, OpenFlags, Transaction};
use std::path::Path;

/// Outcome of an integrity probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityStatus {
    Ok,
    Corrupted,
}

impl IntegrityStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, IntegrityStatus::Ok)
    }
}

/// Single-writer handle over the memory database.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the store at `path`.
    ///
    /// Applies the connection policy: WAL journaling, a 5 second lock wait,
    /// enforced foreign keys. Pre-existing files get a structural
    /// quick_check before use; new files skip it.
    pub fn open(path: &Path) -> Result<Self> {
        let existed = path.exists();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|err| Error::ConnectionFailed(format!("{}: {}", path.display(), err)))?;

        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA foreign_keys = ON;
            "#,
        )
        .map_err(|err| classify_open_error(err, path))?;

        let store = Self { conn };

        if existed {
            match store.quick_check() {
                Ok(IntegrityStatus::Ok) => {}
                Ok(IntegrityStatus::Corrupted) => {
                    return Err(Error::Corrupted(path.display().to_string()));
                }
                Err(Error::Database(rusqlite::Error::SqliteFailure(failure, _)))
                    if failure.code == rusqlite::ErrorCode::NotADatabase =>
                {
                    return Err(Error::Corrupted(path.display().to_string()));
                }
                Err(err) => return Err(err),
            }
        }

        schema::init_schema(&store.conn)?;
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self { conn };
        schema::init_schema(&store.conn)?;
        Ok(store)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside a transaction, committing on Ok and rolling back on Err.
    ///
    /// Generic over the caller's error type so higher layers can thread
    /// their own failures through without wrapping.
    pub fn transaction<T, E>(
        &mut self,
        f: impl FnOnce(&Transaction) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        let tx = self.conn.transaction()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                // Drop rolls the transaction back.
                Err(err)
            }
        }
    }

    /// Fast structural probe; milliseconds on a healthy file.
    pub fn quick_check(&self) -> Result<IntegrityStatus> {
        self.run_check("PRAGMA quick_check")
    }

    /// Complete integrity scan.
    pub fn full_check(&self) -> Result<IntegrityStatus> {
        self.run_check("PRAGMA integrity_check")
    }

    fn run_check(&self, pragma: &str) -> Result<IntegrityStatus> {
        let first: String = self.conn.query_row(pragma, [], |row| row.get(0))?;
        if first == "ok" {
            Ok(IntegrityStatus::Ok)
        } else {
            Ok(IntegrityStatus::Corrupted)
        }
    }

    /// Move WAL content into the main database file.
    pub fn flush_wal(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, err)| Error::Database(err))
    }
}

fn classify_open_error(err: rusqlite::Error, path: &Path) -> Error {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err
        && failure.code == rusqlite::ErrorCode::NotADatabase
    {
        return Error::Corrupted(path.display().to_string());
    }
    Error::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_file_and_schema() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("memory.db");
        let store = Store::open(&path).unwrap();
        assert!(path.exists());

        let count: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_reopen_existing_file_passes_probe() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("memory.db");
        drop(Store::open(&path).unwrap());
        let store = Store::open(&path).unwrap();
        assert!(store.quick_check().unwrap().is_ok());
        assert!(store.full_check().unwrap().is_ok());
    }

    #[test]
    fn test_open_garbage_file_reports_corruption() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("memory.db");
        std::fs::write(&path, "this is not a database file, not even close").unwrap();

        match Store::open(&path) {
            Err(Error::Corrupted(_)) => {}
            other => panic!("expected corruption error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let mut store = Store::open_in_memory().unwrap();
        let result: Result<()> = store.transaction(|tx| {
            tx.execute(
                "INSERT INTO sessions (id, project_path, project_dir, project_name, start_time, updated_at)
                 VALUES ('s1', '/p', '-p', 'p', '2025-01-01T00:00:00Z', '2025-01-01T00:00:00Z')",
                [],
            )?;
            Err(Error::InvalidArgument("forced failure".into()))
        });
        assert!(result.is_err());

        let count: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_fts_triggers_mirror_writes() {
        let store = Store::open_in_memory().unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO sessions (id, project_path, project_dir, project_name, start_time, updated_at)
                 VALUES ('s1', '/p', '-p', 'p', '2025-01-01T00:00:00Z', '2025-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO messages (id, session_id, role, content, timestamp)
                 VALUES ('m1', 's1', 'user', 'the sync pipeline hums', '2025-01-01T00:00:00Z')",
                [],
            )
            .unwrap();

        let hits: i64 = store
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM messages_fts WHERE messages_fts MATCH 'pipeline'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 1);

        // Cascade delete must clear the shadow through the delete trigger.
        store
            .conn()
            .execute("DELETE FROM sessions WHERE id = 's1'", [])
            .unwrap();
        let hits: i64 = store
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM messages_fts WHERE messages_fts MATCH 'pipeline'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 0);
    }
}
