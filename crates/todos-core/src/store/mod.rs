//! Remote store access
//!
//! `TodoStore` is the seam between the view and the hosted table:
//! - `RestStore`: the real service, spoken to over its REST interface
//! - `MemoryStore`: in-process table used by tests and offline mode
//!
//! ## Usage
//!
//! ```ignore
//! let store = RestStore::from_config(&config)?;
//! let todos = store.list().await?;
//! let created = store.insert(NewTodo::new("Buy milk")).await?;
//! store.update(created.id, TodoPatch { finished: true }).await?;
//! ```

mod memory;
mod rest;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{NewTodo, Todo, TodoId, TodoPatch};

pub use memory::MemoryStore;
pub use rest::RestStore;

/// Operations the view needs from the store
#[async_trait]
pub trait TodoStore: Send + Sync {
    /// All records, ordered by id descending
    async fn list(&self) -> Result<Vec<Todo>, StoreError>;

    /// Insert one record; the store assigns id, created_at and finished
    async fn insert(&self, todo: NewTodo) -> Result<Todo, StoreError>;

    /// Update the record with this id
    async fn update(&self, id: TodoId, patch: TodoPatch) -> Result<Todo, StoreError>;
}
