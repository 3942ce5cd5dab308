//! Todos Core Library
//!
//! Core functionality for a live todo list backed by a hosted table:
//! listing, adding and toggling todos, and keeping every open view in step
//! through realtime change notifications.
//!
//! # Architecture
//!
//! - **Store**: the remote table is the source of truth; views never edit
//!   their copy of the list, they refetch it
//! - **Cache**: one keyed slot per query, applied in fetch order
//! - **Realtime**: any change on the channel invalidates the list
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let store = Arc::new(RestStore::from_config(&config)?);
//! let mut view = TodoView::new(store);
//!
//! let fetched = view.mount().run().await;
//! view.apply(fetched);
//! for row in view.rows() { ... }
//! ```
//!
//! # Modules
//!
//! - `view`: list state and user actions (main entry point)
//! - `store`: remote table access
//! - `cache`: keyed query cache
//! - `realtime`: change notification subscription
//! - `models`: records, change events and row projection
//! - `config`: application configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod realtime;
pub mod store;
pub mod view;

pub use cache::{Completion, QueryCache, Ticket};
pub use config::Config;
pub use error::StoreError;
pub use models::{ChangeEvent, ChangeKind, NewTodo, Todo, TodoId, TodoPatch, TodoRow, TodoState};
pub use realtime::{RealtimeConfig, RealtimeEvent, Subscription, SubscriptionStatus};
pub use store::{MemoryStore, RestStore, TodoStore};
pub use view::{Fetched, Mutation, MutationKind, PendingMutation, Refetch, Settled, TodoView};
