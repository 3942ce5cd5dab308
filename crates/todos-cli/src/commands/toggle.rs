//! Toggle command handler

use std::sync::Arc;

use anyhow::{Context, Result};

use todos_core::{TodoId, TodoState, TodoStore};

use crate::output::Output;

/// Flip the completion flag of a todo
pub async fn toggle(store: Arc<dyn TodoStore>, id: TodoId, output: &Output) -> Result<()> {
    let mut view = super::load_view(store).await?;
    let mutation = view.toggle_id(id).await;
    let todo = mutation
        .outcome
        .with_context(|| format!("Failed to toggle todo #{}", id))?;

    if output.is_quiet() {
        output.print_todo(&todo);
        return Ok(());
    }

    let verb = match todo.state() {
        TodoState::Done => "done",
        TodoState::Pending => "not completed",
    };
    output.success(&format!("Marked #{} {}", todo.id, verb));
    super::settle(&mut view, mutation.refetch, output).await;
    output.print_rows(&view.rows());
    Ok(())
}
