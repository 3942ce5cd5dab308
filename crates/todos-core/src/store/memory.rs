//! In-process store
//!
//! Behaves like the hosted table: assigns ids and timestamps, orders
//! listings newest first, and publishes a `ChangeEvent` for every write so
//! views can be driven without a network.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;

use super::TodoStore;
use crate::error::StoreError;
use crate::models::{sort_newest_first, ChangeEvent, ChangeKind, NewTodo, Todo, TodoId, TodoPatch};

/// Capacity of the change broadcast
const CHANGE_CAPACITY: usize = 64;

struct Table {
    rows: Vec<Todo>,
    next_id: TodoId,
}

/// Store holding records in memory
pub struct MemoryStore {
    table: Mutex<Table>,
    changes: broadcast::Sender<ChangeEvent>,
    /// When set, every call fails as if the service were unavailable
    failing: AtomicBool,
    list_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            table: Mutex::new(Table {
                rows: Vec::new(),
                next_id: 1,
            }),
            changes,
            failing: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Create a store pre-filled with the given bodies (oldest first)
    pub fn with_bodies<I, S>(bodies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        {
            let mut table = store.lock();
            for body in bodies {
                let id = table.next_id;
                table.next_id += 1;
                table.rows.push(Todo {
                    id,
                    body: body.into(),
                    finished: false,
                    created_at: Utc::now(),
                });
            }
        }
        store
    }

    /// Receive a `ChangeEvent` for every successful write
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    /// Make all subsequent calls fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `list` calls served so far, including failed ones
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Snapshot of a single record
    pub fn get(&self, id: TodoId) -> Option<Todo> {
        self.lock().rows.iter().find(|t| t.id == id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Api {
                status: 503,
                message: "Service unavailable".to_string(),
                code: None,
                details: None,
                hint: None,
            });
        }
        Ok(())
    }

    fn publish(&self, kind: ChangeKind, record: &Todo, old: Option<&Todo>) {
        let event = ChangeEvent {
            kind,
            schema: "public".to_string(),
            table: "todos".to_string(),
            commit_timestamp: Some(Utc::now().to_rfc3339()),
            record: serde_json::to_value(record).ok(),
            old_record: old.and_then(|t| serde_json::to_value(t).ok()),
        };
        // No subscribers is fine
        let _ = self.changes.send(event);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Todo>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut rows = self.lock().rows.clone();
        sort_newest_first(&mut rows);
        Ok(rows)
    }

    async fn insert(&self, todo: NewTodo) -> Result<Todo, StoreError> {
        self.check_available()?;

        let created = {
            let mut table = self.lock();
            let created = Todo {
                id: table.next_id,
                body: todo.body,
                finished: false,
                created_at: Utc::now(),
            };
            table.next_id += 1;
            table.rows.push(created.clone());
            created
        };

        debug!("memory insert id={}", created.id);
        self.publish(ChangeKind::Insert, &created, None);
        Ok(created)
    }

    async fn update(&self, id: TodoId, patch: TodoPatch) -> Result<Todo, StoreError> {
        self.check_available()?;

        let (old, updated) = {
            let mut table = self.lock();
            let row = table
                .rows
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or(StoreError::NotFound(id))?;
            let old = row.clone();
            row.finished = patch.finished;
            (old, row.clone())
        };

        debug!("memory update id={} finished={}", id, updated.finished);
        self.publish(ChangeKind::Update, &updated, Some(&old));
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_assigns_ids_and_defaults() {
        let store = MemoryStore::new();
        let a = store.insert(NewTodo::new("a")).await.unwrap();
        let b = store.insert(NewTodo::new("b")).await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert!(!b.finished);
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = MemoryStore::with_bodies(["one", "two", "three"]);
        let ids: Vec<_> = store.list().await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let store = MemoryStore::new();
        let err = store
            .update(9, TodoPatch { finished: true })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(9)));
    }

    #[tokio::test]
    async fn test_writes_publish_changes() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe_changes();

        let todo = store.insert(NewTodo::new("x")).await.unwrap();
        store
            .update(todo.id, TodoPatch { finished: true })
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, ChangeKind::Insert);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, ChangeKind::Update);
        assert_eq!(
            second.old_record.unwrap()["finished"],
            serde_json::json!(false)
        );
    }

    #[tokio::test]
    async fn test_failing_store_rejects_everything() {
        let store = MemoryStore::with_bodies(["keep"]);
        store.set_failing(true);

        assert!(store.list().await.is_err());
        assert!(store.insert(NewTodo::new("no")).await.is_err());
        assert!(store.update(1, TodoPatch { finished: true }).await.is_err());

        store.set_failing(false);
        let rows = store.list().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].finished);
        assert_eq!(store.list_calls(), 2);
    }
}
