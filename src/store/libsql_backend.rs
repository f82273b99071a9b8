//! libSQL backend: async `ChatStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::llm::ChatMessage;
use crate::store::migrations;
use crate::store::traits::ChatStore;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    pub(crate) async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(&self.conn).await
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[async_trait]
impl ChatStore for LibSqlBackend {
    async fn load_thread(&self, chat_id: &str) -> Result<Option<Vec<ChatMessage>>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT chat_thread FROM chats WHERE id = ?1",
                params![chat_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_thread: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("load_thread: {e}")))?;
        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("load_thread: {e}")))?;
        let thread: Vec<ChatMessage> = serde_json::from_str(&raw)
            .map_err(|e| DatabaseError::Serialization(format!("chat {chat_id}: {e}")))?;
        debug!(chat_id, messages = thread.len(), "Loaded chat thread");
        Ok(Some(thread))
    }

    async fn save_thread(&self, chat_id: &str, thread: &[ChatMessage]) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(thread)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO chats (id, chat_thread, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT (id) DO UPDATE SET
                    chat_thread = excluded.chat_thread,
                    updated_at = excluded.updated_at",
                params![chat_id, json, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_thread: {e}")))?;
        debug!(chat_id, messages = thread.len(), "Saved chat thread");
        Ok(())
    }

    async fn delete_thread(&self, chat_id: &str) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute("DELETE FROM chats WHERE id = ?1", params![chat_id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_thread: {e}")))?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCall;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn sample_thread() -> Vec<ChatMessage> {
        vec![
            ChatMessage::system("prompt"),
            ChatMessage::user("What's new in Rust?"),
            ChatMessage::assistant(
                None,
                vec![ToolCall::new("call_1", "web_search", r#"{"query":"rust"}"#)],
            ),
            ChatMessage::tool_result("call_1", "web_search", "Title: Rust 2024"),
        ]
    }

    #[tokio::test]
    async fn load_missing_thread_is_none() {
        let db = test_db().await;
        assert!(db.load_thread("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_preserves_order() {
        let db = test_db().await;
        let thread = sample_thread();
        db.save_thread("email-1", &thread).await.unwrap();

        let loaded = db.load_thread("email-1").await.unwrap().unwrap();
        assert_eq!(loaded, thread);
    }

    #[tokio::test]
    async fn save_replaces_existing_thread() {
        let db = test_db().await;
        let mut thread = sample_thread();
        db.save_thread("email-1", &thread).await.unwrap();

        thread.push(ChatMessage::user("Please respond with a tool call"));
        db.save_thread("email-1", &thread).await.unwrap();

        let loaded = db.load_thread("email-1").await.unwrap().unwrap();
        assert_eq!(loaded.len(), 5);

        let mut rows = db
            .conn()
            .query("SELECT COUNT(*) FROM chats", ())
            .await
            .unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn threads_are_isolated_by_key() {
        let db = test_db().await;
        db.save_thread("a", &[ChatMessage::user("one")]).await.unwrap();
        db.save_thread("b", &[ChatMessage::user("two")]).await.unwrap();

        assert_eq!(
            db.load_thread("a").await.unwrap().unwrap(),
            vec![ChatMessage::user("one")]
        );
        assert_eq!(
            db.load_thread("b").await.unwrap().unwrap(),
            vec![ChatMessage::user("two")]
        );
    }

    #[tokio::test]
    async fn delete_thread_reports_existence() {
        let db = test_db().await;
        db.save_thread("a", &[ChatMessage::user("one")]).await.unwrap();
        assert!(db.delete_thread("a").await.unwrap());
        assert!(!db.delete_thread("a").await.unwrap());
        assert!(db.load_thread("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_row_is_serialization_error() {
        let db = test_db().await;
        db.conn()
            .execute(
                "INSERT INTO chats (id, chat_thread) VALUES ('bad', 'not json')",
                (),
            )
            .await
            .unwrap();
        assert!(matches!(
            db.load_thread("bad").await,
            Err(DatabaseError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn reads_threads_written_by_legacy_schema() {
        let db = test_db().await;
        let legacy = r#"[{"role":"system","content":"p"},{"role":"user","content":"hi"},{"role":"assistant","content":null,"refusal":null,"tool_calls":[{"id":"call_1","type":"function","function":{"name":"botmailroom_send_email","arguments":"{}"}}]},{"role":"tool","content":"ok","name":"botmailroom_send_email","tool_call_id":"call_1"}]"#;
        db.conn()
            .execute(
                "INSERT INTO chats (id, chat_thread) VALUES ('old', ?1)",
                params![legacy],
            )
            .await
            .unwrap();
        let loaded = db.load_thread("old").await.unwrap().unwrap();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded[2].role(), "assistant");
    }

    #[tokio::test]
    async fn new_local_creates_parent_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("chats.db");
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        db.save_thread("a", &[ChatMessage::user("x")]).await.unwrap();
        assert!(path.exists());
    }
}
