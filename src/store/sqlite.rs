//! SQLite-backed conversation store.
//!
//! Each thread is one row keyed by `(namespace, thread_id)`. Saves are a
//! single upsert statement, so a concurrent writer (another task or
//! another process on the same file) sees either the old or the new
//! history, never a mix.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{ConversationDocument, ConversationStore, StoreError, NAMESPACE};
use crate::messages::Message;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SqliteConversationStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteConversationStore {
    /// Open or create the conversation database.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS conversations (
                namespace TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                value TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (namespace, thread_id)
            );",
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock_conn(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StoreError> {
        conn.lock()
            .map_err(|e| StoreError::Task(format!("Lock poisoned: {e}")))
    }

    /// Run a blocking database operation off the async executor.
    async fn with_conn<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = Self::lock_conn(&conn)?;
            op(&guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn load(&self, thread_id: &str) -> Result<Vec<Message>, StoreError> {
        let key = thread_id.to_string();
        let raw: Option<String> = self
            .with_conn(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT value FROM conversations WHERE namespace = ?1 AND thread_id = ?2",
                        params![NAMESPACE, key],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;

        match raw {
            Some(raw) => ConversationDocument::decode(thread_id, &raw),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, thread_id: &str, messages: &[Message]) -> Result<(), StoreError> {
        let raw = ConversationDocument::encode(messages)?;
        let key = thread_id.to_string();
        let now = Utc::now().to_rfc3339();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO conversations (namespace, thread_id, value, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(namespace, thread_id)
                 DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![NAMESPACE, key, raw, now],
            )?;
            Ok(())
        })
        .await?;

        tracing::debug!(thread_id = %thread_id, messages = messages.len(), "Saved conversation");
        Ok(())
    }

    async fn list_threads(&self) -> Result<Vec<String>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT thread_id FROM conversations WHERE namespace = ?1")?;
            let threads = stmt
                .query_map(params![NAMESPACE], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(threads)
        })
        .await
    }
}
