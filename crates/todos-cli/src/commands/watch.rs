//! Watch command handler

use std::future::Future;

use anyhow::Result;
use tracing::info;

use todos_core::{RealtimeEvent, SubscriptionStatus};

use crate::backend::{Backend, ChangeFeed};
use crate::output::Output;

/// Print the list, then reprint it after every change until Ctrl-C
pub async fn watch(backend: &Backend, output: &Output) -> Result<()> {
    let mut view = super::load_view(backend.store()).await?;
    output.print_rows(&view.rows());

    let mut feed = backend.subscribe();
    if backend.is_offline() {
        output.message("Watching the offline store (no other writers). Ctrl-C to stop.");
    } else {
        output.message("Watching for changes. Ctrl-C to stop.");
    }

    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let result = watch_loop(&mut view, &mut feed, output, ctrl_c).await;
    feed.close().await;
    info!("Watch ended");
    result
}

/// Follow the feed until `shutdown` resolves or the feed ends
///
/// `shutdown` is polled across iterations, so a signal that arrives while a
/// refetch is running stops the loop on the next pass.
async fn watch_loop(
    view: &mut todos_core::TodoView,
    feed: &mut ChangeFeed,
    output: &Output,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                output.message("Stopping.");
                return Ok(());
            }
            event = feed.next_event() => {
                let Some(event) = event else {
                    output.warning("Change feed closed");
                    return Ok(());
                };
                match event {
                    RealtimeEvent::Change(change) => {
                        output.print_change(&change);
                        let refetch = view.on_change(&change);
                        super::settle(view, refetch, output).await;
                        output.print_rows(&view.rows());
                    }
                    RealtimeEvent::StatusChanged(status) => {
                        output.message(status_text(status));
                    }
                    RealtimeEvent::Error(msg) => {
                        output.warning(&format!("Realtime error: {}", msg));
                    }
                }
            }
        }
    }
}

fn status_text(status: SubscriptionStatus) -> &'static str {
    match status {
        SubscriptionStatus::Disconnected => "Disconnected, retrying...",
        SubscriptionStatus::Connecting => "Connecting...",
        SubscriptionStatus::Subscribed => "Subscribed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    use todos_core::{Config, NewTodo};

    use crate::output::OutputFormat;

    #[tokio::test]
    async fn test_stop_signal_during_refetch_is_not_lost() {
        let backend = Backend::open(&Config::default(), true).unwrap();
        let mut view = crate::commands::load_view(backend.store()).await.unwrap();
        let mut feed = backend.subscribe();
        let output = Output::new(OutputFormat::Quiet);

        // A stop request already pending next to a queued change still ends
        // the loop
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        backend.store().insert(NewTodo::new("late")).await.unwrap();
        let _ = stop_tx.send(());
        let shutdown = async {
            let _ = stop_rx.await;
        };

        let stopped = tokio::time::timeout(
            Duration::from_secs(2),
            watch_loop(&mut view, &mut feed, &output, shutdown),
        )
        .await;
        assert!(matches!(stopped, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_changes_reprinted_until_stopped() {
        let backend = Backend::open(&Config::default(), true).unwrap();
        let mut view = crate::commands::load_view(backend.store()).await.unwrap();
        let before = view.todos().len();
        let mut feed = backend.subscribe();
        let output = Output::new(OutputFormat::Quiet);

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let store = backend.store();
        let writer = tokio::spawn(async move {
            store.insert(NewTodo::new("from elsewhere")).await.unwrap();
            // Give the loop time to refetch before stopping it
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = stop_tx.send(());
        });
        let shutdown = async {
            let _ = stop_rx.await;
        };

        tokio::time::timeout(
            Duration::from_secs(2),
            watch_loop(&mut view, &mut feed, &output, shutdown),
        )
        .await
        .unwrap()
        .unwrap();
        writer.await.unwrap();

        assert_eq!(view.todos().len(), before + 1);
        assert_eq!(view.todos()[0].body, "from elsewhere");
    }

    #[test]
    fn test_status_text() {
        assert_eq!(status_text(SubscriptionStatus::Subscribed), "Subscribed");
        assert_eq!(
            status_text(SubscriptionStatus::Disconnected),
            "Disconnected, retrying..."
        );
    }
}
