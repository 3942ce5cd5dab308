//! The todo list view
//!
//! `TodoView` owns the cached list and the pending input text, and turns
//! user actions and change notifications into store calls and refetches.
//! The displayed list is always the last successful fetch; mutations never
//! touch it directly. Every mutation and every change notification is
//! followed by exactly one full-list refetch.
//!
//! Refetches are handed back to the caller as `Refetch` values, and store
//! writes as `PendingMutation` values, so both can run concurrently with
//! input handling:
//!
//! ```ignore
//! let mut view = TodoView::new(store);
//! let fetched = view.mount().run().await;
//! view.apply(fetched);
//!
//! // Spawnable: the view is not borrowed while the write runs
//! let settled = view.begin_toggle(&todo).run().await;
//! let mutation = view.finish(settled);
//! view.apply(mutation.refetch.run().await);
//! ```

use std::sync::Arc;

use chrono::{Local, TimeZone};
use tracing::{debug, info, warn};

use crate::cache::{Completion, QueryCache, Ticket};
use crate::error::StoreError;
use crate::models::{
    sort_newest_first, ChangeEvent, NewTodo, Todo, TodoId, TodoPatch, TodoRow,
};
use crate::store::TodoStore;

/// Cache key of the todo list
pub const TODOS_LIST_KEY: &str = "todosList";

/// A list fetch that has been requested but not yet run
pub struct Refetch {
    ticket: Ticket,
    store: Arc<dyn TodoStore>,
}

impl Refetch {
    /// Read the full list from the store
    pub async fn run(self) -> Fetched {
        let result = self.store.list().await;
        Fetched {
            ticket: self.ticket,
            result,
        }
    }
}

/// Result of a `Refetch`, to be handed back to `TodoView::apply`
#[derive(Debug)]
pub struct Fetched {
    pub ticket: Ticket,
    pub result: Result<Vec<Todo>, StoreError>,
}

/// Kind of store write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Insert,
    Update,
}

impl MutationKind {
    fn verb(self) -> &'static str {
        match self {
            MutationKind::Insert => "insert",
            MutationKind::Update => "update",
        }
    }
}

enum StoreWrite {
    Insert(NewTodo),
    Update(TodoId, TodoPatch),
}

/// A store write that has been requested but not yet run
pub struct PendingMutation {
    write: StoreWrite,
    store: Arc<dyn TodoStore>,
}

impl PendingMutation {
    pub fn kind(&self) -> MutationKind {
        match self.write {
            StoreWrite::Insert(_) => MutationKind::Insert,
            StoreWrite::Update(..) => MutationKind::Update,
        }
    }

    /// Send the write to the store
    pub async fn run(self) -> Settled {
        let kind = self.kind();
        let outcome = match self.write {
            StoreWrite::Insert(todo) => self.store.insert(todo).await,
            StoreWrite::Update(id, patch) => self.store.update(id, patch).await,
        };
        Settled { kind, outcome }
    }
}

/// Result of a `PendingMutation`, to be handed back to `TodoView::finish`
#[derive(Debug)]
pub struct Settled {
    pub kind: MutationKind,
    pub outcome: Result<Todo, StoreError>,
}

/// Outcome of a mutation plus the refetch it requires
pub struct Mutation<T> {
    pub outcome: Result<T, StoreError>,
    pub refetch: Refetch,
}

/// State of the todo list screen
pub struct TodoView {
    store: Arc<dyn TodoStore>,
    cache: QueryCache<Vec<Todo>>,
    input: String,
    last_error: Option<String>,
}

impl TodoView {
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        Self {
            store,
            cache: QueryCache::new(TODOS_LIST_KEY),
            input: String::new(),
            last_error: None,
        }
    }

    /// Initial list fetch
    pub fn mount(&mut self) -> Refetch {
        debug!("Mounting view, fetching {}", self.cache.key());
        let ticket = self.cache.begin_fetch();
        self.refetch(ticket)
    }

    /// Drop the cached list's freshness and request a refetch
    pub fn invalidate(&mut self) -> Refetch {
        let ticket = self.cache.invalidate();
        self.refetch(ticket)
    }

    /// React to a change notification: any change means refetch everything
    pub fn on_change(&mut self, change: &ChangeEvent) -> Refetch {
        info!(
            "Change received: {} on {}.{}",
            change.kind, change.schema, change.table
        );
        self.invalidate()
    }

    /// Store the result of a refetch
    pub fn apply(&mut self, fetched: Fetched) -> Completion {
        let Fetched { ticket, result } = fetched;
        let result = result.map(|mut todos| {
            sort_newest_first(&mut todos);
            todos
        });

        let failure = result.as_ref().err().map(StoreError::user_message);

        let completion = self.cache.complete(ticket, result);
        if let (Completion::Failed, Some(message)) = (completion, failure) {
            warn!("Fetching {} failed: {}", self.cache.key(), message);
            self.last_error = Some(format!("Failed to load todos: {}", message));
        }
        debug!("Fetch #{} completed: {:?}", ticket.seq(), completion);
        completion
    }

    /// Fetch now and wait for the result
    pub async fn refresh(&mut self) -> Completion {
        let fetched = self.invalidate().run().await;
        self.apply(fetched)
    }

    /// Request flipping a record's completion flag
    pub fn begin_toggle(&self, todo: &Todo) -> PendingMutation {
        let patch = TodoPatch::toggle(todo);
        debug!("Toggling {} to finished={}", todo.id, patch.finished);
        self.pending(StoreWrite::Update(todo.id, patch))
    }

    /// Request inserting the input text as a new record, clearing the input
    pub fn begin_submit(&mut self) -> PendingMutation {
        let body = std::mem::take(&mut self.input);
        self.begin_insert(body)
    }

    /// Request inserting a record with the given body
    pub fn begin_insert(&self, body: String) -> PendingMutation {
        debug!("Inserting todo body={:?}", body);
        self.pending(StoreWrite::Insert(NewTodo { body }))
    }

    /// Record the outcome of a store write and request the refetch that
    /// follows every mutation, successful or not
    pub fn finish(&mut self, settled: Settled) -> Mutation<Todo> {
        let Settled { kind, outcome } = settled;
        if let Err(ref e) = outcome {
            warn!("Todo {} failed: {}", kind.verb(), e);
            self.last_error = Some(format!(
                "Failed to {} todo: {}",
                kind.verb(),
                e.user_message()
            ));
        }
        Mutation {
            outcome,
            refetch: self.invalidate(),
        }
    }

    /// Flip a record's completion flag and wait for the store
    pub async fn toggle(&mut self, todo: &Todo) -> Mutation<Todo> {
        let settled = self.begin_toggle(todo).run().await;
        self.finish(settled)
    }

    /// Flip the completion flag of a displayed record by id
    pub async fn toggle_id(&mut self, id: TodoId) -> Mutation<Todo> {
        match self.find(id).cloned() {
            Some(todo) => self.toggle(&todo).await,
            None => self.finish(Settled {
                kind: MutationKind::Update,
                outcome: Err(StoreError::NotFound(id)),
            }),
        }
    }

    /// Submit the input text as a new record and wait for the store
    pub async fn submit(&mut self) -> Mutation<Todo> {
        let settled = self.begin_submit().run().await;
        self.finish(settled)
    }

    /// Insert a record with the given body and wait for the store
    pub async fn insert(&mut self, body: String) -> Mutation<Todo> {
        let settled = self.begin_insert(body).run().await;
        self.finish(settled)
    }

    fn pending(&self, write: StoreWrite) -> PendingMutation {
        PendingMutation {
            write,
            store: Arc::clone(&self.store),
        }
    }

    fn refetch(&self, ticket: Ticket) -> Refetch {
        Refetch {
            ticket,
            store: Arc::clone(&self.store),
        }
    }

    /// Displayed records, newest first; empty until the first success
    pub fn todos(&self) -> &[Todo] {
        self.cache.data().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any fetch has succeeded yet
    pub fn is_loaded(&self) -> bool {
        self.cache.data().is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.cache.is_loading()
    }

    pub fn find(&self, id: TodoId) -> Option<&Todo> {
        self.todos().iter().find(|t| t.id == id)
    }

    /// Render rows with dates in local time
    pub fn rows(&self) -> Vec<TodoRow> {
        self.rows_in(&Local)
    }

    /// Render rows with dates in the given timezone
    pub fn rows_in<Tz: TimeZone>(&self, tz: &Tz) -> Vec<TodoRow>
    where
        Tz::Offset: std::fmt::Display,
    {
        self.todos().iter().map(|t| TodoRow::new(t, tz)).collect()
    }

    /// Text of the add-todo input
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    /// Most recent failure, until cleared
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }
}
