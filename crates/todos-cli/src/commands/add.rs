//! Add command handler

use std::sync::Arc;

use anyhow::{Context, Result};

use todos_core::{TodoStore, TodoView};

use crate::output::Output;

/// Insert a todo, then print the refreshed list
pub async fn add(store: Arc<dyn TodoStore>, body: String, output: &Output) -> Result<()> {
    let mut view = TodoView::new(store);
    let mutation = view.insert(body).await;
    let todo = mutation.outcome.context("Failed to add todo")?;

    if output.is_quiet() {
        output.print_todo(&todo);
        return Ok(());
    }

    output.success(&format!("Added todo #{}", todo.id));
    super::settle(&mut view, mutation.refetch, output).await;
    output.print_rows(&view.rows());
    Ok(())
}
