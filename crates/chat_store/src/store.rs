//! Conversation storage trait and SQLite implementation
//!
//! The store holds an append-only forest of messages. Writes are independent
//! row insertions and conversations never merge, so no cross-row transaction
//! is needed; the connection is shared behind a mutex and blocking calls run
//! on the tokio blocking pool.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{debug, warn};

use chat_core::{Message, Role};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};

/// Conversation storage seam
#[async_trait]
pub trait ConversationStorage: Send + Sync {
    /// Insert a new message. `parent_id` is either a previously inserted id
    /// or the root sentinel.
    async fn add_message(&self, id: &str, parent_id: &str, message: Message) -> Result<()>;

    /// Point lookup: the message plus its parent id.
    async fn get_message(&self, id: &str) -> Result<(Message, String)>;

    /// Walk parent pointers from `id` to the root sentinel, collecting each
    /// visited message. Returned leaf-first; see [`crate::resolver`] for the
    /// oldest-first projection a model call expects.
    async fn get_context_chain(&self, id: &str) -> Result<Vec<Message>>;
}

/// SQLite-backed conversation store. Cheap to clone; all clones share one
/// connection.
#[derive(Clone)]
pub struct SqliteConversationStore {
    conn: Arc<Mutex<Connection>>,
    config: Arc<StoreConfig>,
}

impl SqliteConversationStore {
    pub fn open<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, config)
    }

    /// In-memory store, mainly for tests.
    pub fn open_in_memory(config: StoreConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, config)
    }

    fn with_connection(conn: Connection, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        conn.busy_timeout(config.busy_timeout)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                parent_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
        })
    }

    /// Run a blocking storage operation on the blocking pool, bounded by the
    /// configured deadline.
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = tokio::task::spawn_blocking(op);
        match self.config.op_timeout {
            Some(limit) => tokio::time::timeout(limit, handle)
                .await
                .map_err(|_| StoreError::Timeout)??,
            None => handle.await?,
        }
    }
}

#[async_trait]
impl ConversationStorage for SqliteConversationStore {
    async fn add_message(&self, id: &str, parent_id: &str, message: Message) -> Result<()> {
        let conn = self.conn.clone();
        let id = id.to_string();
        let parent_id = parent_id.to_string();

        self.run(move || {
            let conn = conn.lock();
            conn.execute(
                "INSERT INTO messages (id, parent_id, role, content) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, parent_id, message.role.as_str(), message.content],
            )
            .map_err(|err| map_insert_err(&id, err))?;
            debug!(%id, %parent_id, "message inserted");
            Ok(())
        })
        .await
    }

    async fn get_message(&self, id: &str) -> Result<(Message, String)> {
        let conn = self.conn.clone();
        let id = id.to_string();

        self.run(move || {
            let conn = conn.lock();
            query_message(&conn, &id)
        })
        .await
    }

    async fn get_context_chain(&self, id: &str) -> Result<Vec<Message>> {
        let conn = self.conn.clone();
        let config = self.config.clone();
        let id = id.to_string();

        self.run(move || {
            let conn = conn.lock();
            query_chain(&conn, &config, &id)
        })
        .await
    }
}

fn map_insert_err(id: &str, err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::DuplicateId(id.to_string())
        }
        other => StoreError::Sqlite(other),
    }
}

fn query_message(conn: &Connection, id: &str) -> Result<(Message, String)> {
    let mut stmt =
        conn.prepare("SELECT role, content, parent_id FROM messages WHERE id = ?1")?;
    let mut rows = stmt.query([id])?;

    let Some(row) = rows.next()? else {
        return Err(StoreError::NotFound(id.to_string()));
    };
    let role_str: String = row.get(0)?;
    let content: String = row.get(1)?;
    let parent_id: String = row.get(2)?;

    let role = Role::parse(&role_str).ok_or(StoreError::InvalidRole(role_str))?;
    Ok((Message { role, content }, parent_id))
}

/// Traversal is bounded by a depth counter and a visited set so malformed
/// parent pointers cannot loop forever. A missing link ends collection with
/// what has been gathered so far, matching the tolerant append-only model
/// where a parent may legitimately be absent.
fn query_chain(conn: &Connection, config: &StoreConfig, leaf_id: &str) -> Result<Vec<Message>> {
    let mut chain = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut cursor = leaf_id.to_string();

    while cursor != config.root_parent_id {
        if !visited.insert(cursor.clone()) {
            return Err(StoreError::CycleDetected(cursor));
        }
        if chain.len() >= config.max_chain_depth {
            return Err(StoreError::ChainTooDeep { depth: chain.len() });
        }

        match query_message(conn, &cursor) {
            Ok((message, parent_id)) => {
                chain.push(message);
                cursor = parent_id;
            }
            Err(StoreError::NotFound(id)) => {
                warn!(%id, "context chain ended at missing message");
                break;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn memory_store() -> SqliteConversationStore {
        SqliteConversationStore::open_in_memory(StoreConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn add_and_get_round_trip() {
        let store = memory_store();

        store
            .add_message("m2", "m1", Message::assistant("hi"))
            .await
            .unwrap();

        let (message, parent_id) = store.get_message("m2").await.unwrap();
        assert_eq!(message, Message::assistant("hi"));
        assert_eq!(parent_id, "m1");
    }

    #[tokio::test]
    async fn file_backed_store_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conversations.sqlite");

        {
            let store =
                SqliteConversationStore::open(&path, StoreConfig::default()).unwrap();
            store
                .add_message("m1", "chatcmpl-start", Message::user("hello"))
                .await
                .unwrap();
        }

        let store = SqliteConversationStore::open(&path, StoreConfig::default()).unwrap();
        let (message, _) = store.get_message("m1").await.unwrap();
        assert_eq!(message.content, "hello");
    }

    #[tokio::test]
    async fn get_missing_message_is_not_found() {
        let store = memory_store();
        let err = store.get_message("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let store = memory_store();

        store
            .add_message("m1", "chatcmpl-start", Message::user("first"))
            .await
            .unwrap();
        let err = store
            .add_message("m1", "chatcmpl-start", Message::user("second"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::DuplicateId(id) if id == "m1"));
    }

    #[tokio::test]
    async fn context_chain_collects_leaf_to_root() {
        let store = memory_store();
        store
            .add_message("m1", "chatcmpl-start", Message::user("one"))
            .await
            .unwrap();
        store
            .add_message("m2", "m1", Message::assistant("two"))
            .await
            .unwrap();
        store
            .add_message("m3", "m2", Message::user("three"))
            .await
            .unwrap();

        let chain = store.get_context_chain("m3").await.unwrap();
        let contents: Vec<_> = chain.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["three", "two", "one"]);
    }

    #[tokio::test]
    async fn chain_from_root_sentinel_is_empty() {
        let store = memory_store();
        let chain = store.get_context_chain("chatcmpl-start").await.unwrap();
        assert!(chain.is_empty());
    }

    #[tokio::test]
    async fn missing_link_ends_collection() {
        let store = memory_store();
        store
            .add_message("m2", "m1-gone", Message::assistant("tail"))
            .await
            .unwrap();

        let chain = store.get_context_chain("m2").await.unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].content, "tail");
    }

    #[tokio::test]
    async fn cycle_is_detected_not_hung() {
        let store = memory_store();
        store
            .add_message("a", "b", Message::user("a"))
            .await
            .unwrap();
        store
            .add_message("b", "a", Message::assistant("b"))
            .await
            .unwrap();

        let err = store.get_context_chain("a").await.unwrap_err();
        assert!(matches!(err, StoreError::CycleDetected(id) if id == "a"));
    }

    #[tokio::test]
    async fn over_deep_chain_is_rejected() {
        let config = StoreConfig {
            max_chain_depth: 3,
            ..Default::default()
        };
        let store = SqliteConversationStore::open_in_memory(config).unwrap();

        let mut parent = "chatcmpl-start".to_string();
        for i in 0..5 {
            let id = format!("m{i}");
            store
                .add_message(&id, &parent, Message::user(format!("turn {i}")))
                .await
                .unwrap();
            parent = id;
        }

        let err = store.get_context_chain("m4").await.unwrap_err();
        assert!(matches!(err, StoreError::ChainTooDeep { depth: 3 }));
    }

    #[tokio::test]
    async fn corrupted_role_is_surfaced() {
        let store = memory_store();
        {
            let conn = store.conn.lock();
            conn.execute(
                "INSERT INTO messages (id, parent_id, role, content) VALUES ('x', 'chatcmpl-start', 'tool', 'raw')",
                [],
            )
            .unwrap();
        }

        let err = store.get_message("x").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRole(role) if role == "tool"));
    }

    #[tokio::test]
    async fn concurrent_inserts_do_not_interfere() {
        let store = memory_store();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("m{i}");
                store
                    .add_message(&id, "chatcmpl-start", Message::user(format!("turn {i}")))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for i in 0..16 {
            let (message, _) = store.get_message(&format!("m{i}")).await.unwrap();
            assert_eq!(message.content, format!("turn {i}"));
        }
    }

    #[tokio::test]
    async fn deadline_bounds_a_wedged_operation() {
        let config = StoreConfig {
            op_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let store = SqliteConversationStore::open_in_memory(config).unwrap();

        // Hold the connection so the insert cannot make progress.
        let guard = store.conn.lock();
        let err = store
            .add_message("m1", "chatcmpl-start", Message::user("stuck"))
            .await
            .unwrap_err();
        drop(guard);

        assert!(matches!(err, StoreError::Timeout));
    }

    #[test]
    fn invalid_config_rejected_at_open() {
        let config = StoreConfig {
            max_chain_depth: 0,
            ..Default::default()
        };
        let result = SqliteConversationStore::open_in_memory(config);
        assert!(matches!(result, Err(StoreError::Config(_))));
    }
}
