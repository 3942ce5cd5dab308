//! Command handlers

pub mod add;
pub mod config;
pub mod list;
pub mod toggle;
pub mod watch;

use std::sync::Arc;

use anyhow::{bail, Result};

use todos_core::{Completion, TodoStore, TodoView};

/// Create a view and wait for its first fetch
pub(crate) async fn load_view(store: Arc<dyn TodoStore>) -> Result<TodoView> {
    let mut view = TodoView::new(store);
    let fetched = view.mount().run().await;
    if view.apply(fetched) == Completion::Failed {
        bail!(
            "{}",
            view.last_error().unwrap_or("Failed to load todos")
        );
    }
    Ok(view)
}

/// Run a pending refetch and report a failure without aborting
pub(crate) async fn settle(
    view: &mut TodoView,
    refetch: todos_core::Refetch,
    output: &crate::output::Output,
) {
    if view.apply(refetch.run().await) == Completion::Failed {
        if let Some(msg) = view.last_error() {
            output.warning(msg);
        }
        view.clear_error();
    }
}
