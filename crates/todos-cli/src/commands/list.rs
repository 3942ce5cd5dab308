//! List command handler

use std::sync::Arc;

use anyhow::Result;

use todos_core::TodoStore;

use crate::output::Output;

/// Print all todos, newest first
pub async fn list(store: Arc<dyn TodoStore>, output: &Output) -> Result<()> {
    let view = super::load_view(store).await?;
    output.print_rows(&view.rows());
    Ok(())
}
