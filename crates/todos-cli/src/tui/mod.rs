//! Todos TUI
//!
//! Terminal interface for the shared todo list.
//!
//! ## Layout
//!
//! - Top: "Todos" heading and realtime indicator
//! - Middle: todo rows (date, body, toggle control)
//! - Bottom: "Add a todo" field with its Add control, status bar
//!
//! ## Keys
//!
//! - j/k or ↑/↓: Move selection up/down
//! - Enter or Space: Mark done / not completed
//! - a or i: Focus the add field (Enter adds, Esc leaves)
//! - r: Refresh
//! - ?: Help
//! - q: Quit
//!
//! The list on screen is always the last fetch from the store. Store writes
//! and refetches run as background tasks whose results come back to the
//! event loop over channels, so a slow request never stalls drawing or key
//! handling. Every action and every realtime change is followed by a
//! refetch.

mod app;
mod ui;

use std::fs::File;
use std::io::stdout;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tracing::info;

use todos_core::{
    Config, Fetched, MutationKind, PendingMutation, RealtimeEvent, Refetch, Settled, TodoState,
    TodoView,
};

use app::{App, InputMode, RealtimeIndicator};

use crate::backend::{Backend as TodoBackend, ChangeFeed};

/// Run the TUI application
pub async fn run(config: Config, offline: bool) -> Result<()> {
    // Initialize TUI logging (file-based, only if TODOS_LOG is set)
    init_tui_logging(&config);

    // Fail on missing credentials before touching the terminal
    let backend = TodoBackend::open(&config, offline)?;

    let mut view = TodoView::new(backend.store());
    let (tasks, results) = background();
    tasks.refetch(view.mount());

    // One subscription for the whole session
    let mut feed = backend.subscribe();
    let indicator = match feed.status() {
        Some(status) => RealtimeIndicator::from(status),
        None => RealtimeIndicator::Local,
    };
    let mut app = App::new(view, indicator);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let result = match Terminal::new(CrosstermBackend::new(stdout())) {
        Ok(mut terminal) => run_app(&mut terminal, &mut app, &mut feed, tasks, results).await,
        Err(e) => Err(e.into()),
    };

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    feed.close().await;
    info!("TUI closed");

    result
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    feed: &mut ChangeFeed,
    tasks: Tasks,
    mut results: Results,
) -> Result<()> {
    let mut feed_open = true;

    loop {
        // Check for status message timeout
        app.check_status_timeout();

        // Draw UI
        terminal.draw(|frame| ui::draw(frame, app))?;

        tokio::select! {
            biased;

            // Refetch results
            Some(fetched) = results.fetched.recv() => {
                app.view.apply(fetched);
                app.clamp_selection();
            }

            // Store write results
            Some(settled) = results.settled.recv() => {
                on_settled(app, &tasks, settled);
            }

            // Realtime events
            event = async {
                if feed_open {
                    feed.next_event().await
                } else {
                    // Never resolves once the feed has ended
                    std::future::pending::<Option<RealtimeEvent>>().await
                }
            } => {
                match event {
                    Some(RealtimeEvent::Change(change)) => {
                        tasks.refetch(app.view.on_change(&change));
                    }
                    Some(RealtimeEvent::StatusChanged(status)) => {
                        app.set_realtime_status(status);
                    }
                    Some(RealtimeEvent::Error(msg)) => {
                        app.set_status(format!("Realtime error: {}", msg));
                        app.realtime = RealtimeIndicator::Error;
                    }
                    None => {
                        feed_open = false;
                    }
                }
            }

            // Poll for terminal events
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                if event::poll(Duration::from_millis(0))? {
                    if let Event::Key(key) = event::read()? {
                        // Only handle key press events (not release)
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }

                        // If an error is showing, any key dismisses it
                        if app.has_error() {
                            app.clear_error();
                            continue;
                        }

                        // If help is showing, any key dismisses it
                        if app.show_help {
                            app.show_help = false;
                            continue;
                        }

                        match app.input_mode {
                            InputMode::Normal => {
                                handle_normal_mode(app, &tasks, key.code, key.modifiers);
                            }
                            InputMode::Editing => {
                                handle_editing_mode(app, &tasks, key.code);
                            }
                        }
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Senders for work that runs off the event loop
struct Tasks {
    fetched: mpsc::UnboundedSender<Fetched>,
    settled: mpsc::UnboundedSender<Settled>,
}

/// Results of background work, drained by the event loop
struct Results {
    fetched: mpsc::UnboundedReceiver<Fetched>,
    settled: mpsc::UnboundedReceiver<Settled>,
}

fn background() -> (Tasks, Results) {
    let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
    let (settle_tx, settle_rx) = mpsc::unbounded_channel();
    (
        Tasks {
            fetched: fetch_tx,
            settled: settle_tx,
        },
        Results {
            fetched: fetch_rx,
            settled: settle_rx,
        },
    )
}

impl Tasks {
    /// Run a list fetch in the background, delivering its result to the loop
    fn refetch(&self, refetch: Refetch) {
        let tx = self.fetched.clone();
        tokio::spawn(async move {
            let _ = tx.send(refetch.run().await);
        });
    }

    /// Run a store write in the background, delivering its outcome to the loop
    fn write(&self, app: &mut App, pending: PendingMutation) {
        app.pending_writes += 1;
        let tx = self.settled.clone();
        tokio::spawn(async move {
            let _ = tx.send(pending.run().await);
        });
    }
}

/// A store write came back: record it and refetch
fn on_settled(app: &mut App, tasks: &Tasks, settled: Settled) {
    app.pending_writes = app.pending_writes.saturating_sub(1);
    let kind = settled.kind;
    let mutation = app.view.finish(settled);
    tasks.refetch(mutation.refetch);

    let Ok(todo) = mutation.outcome else {
        return;
    };
    match kind {
        MutationKind::Insert => {
            app.set_status("Added");
            app.move_to_first();
        }
        MutationKind::Update => {
            let msg = match todo.state() {
                TodoState::Done => "Marked done",
                TodoState::Pending => "Marked not completed",
            };
            app.set_status(msg);
        }
    }
}

/// Handle key events in normal mode
fn handle_normal_mode(app: &mut App, tasks: &Tasks, code: KeyCode, modifiers: KeyModifiers) {
    // Clear status message on navigation keys
    if matches!(
        code,
        KeyCode::Char('j') | KeyCode::Char('k') | KeyCode::Up | KeyCode::Down
    ) {
        app.status_message = None;
    }

    match code {
        KeyCode::Char('q') => {
            app.should_quit = true;
        }
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
        }

        KeyCode::Char('k') | KeyCode::Up => app.move_up(),
        KeyCode::Char('j') | KeyCode::Down => app.move_down(),
        KeyCode::Char('g') | KeyCode::Home => app.move_to_first(),
        KeyCode::Char('G') | KeyCode::End => app.move_to_last(),

        KeyCode::Enter | KeyCode::Char(' ') => {
            let Some(todo) = app.current_todo() else {
                return;
            };
            let pending = app.view.begin_toggle(todo);
            tasks.write(app, pending);
        }

        KeyCode::Char('a') | KeyCode::Char('i') => app.enter_input_mode(),

        KeyCode::Char('r') => {
            tasks.refetch(app.view.invalidate());
            app.set_status("Refreshing...");
        }

        KeyCode::Char('?') => app.toggle_help(),

        _ => {}
    }
}

/// Handle key events while typing a new todo
fn handle_editing_mode(app: &mut App, tasks: &Tasks, code: KeyCode) {
    match code {
        KeyCode::Enter => {
            let pending = app.view.begin_submit();
            app.reset_cursor();
            tasks.write(app, pending);
        }
        KeyCode::Esc => app.exit_input_mode(),
        KeyCode::Backspace => app.delete_char(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Char(c) => app.insert_char(c),
        _ => {}
    }
}

/// Initialize file-based logging for TUI mode
///
/// Only logs if TODOS_LOG environment variable is set.
/// Logs go to the configured log file or {data_dir}/debug.log.
fn init_tui_logging(config: &Config) {
    let Ok(log_level) = std::env::var(crate::LOG_ENV) else {
        return;
    };

    let log_path = match config.log_path() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Warning: {}", e);
            return;
        }
    };

    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            return;
        }
    };

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(crate::log_filter(&log_level))
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();

    info!("TUI logging initialized to {:?}", log_path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use todos_core::{
        Completion, MemoryStore, NewTodo, StoreError, Todo, TodoId, TodoPatch, TodoStore,
    };

    async fn mounted(store: Arc<dyn TodoStore>) -> App {
        let mut view = TodoView::new(store);
        let fetched = view.mount().run().await;
        view.apply(fetched);
        App::new(view, RealtimeIndicator::Local)
    }

    async fn setup(bodies: &[&str]) -> (Arc<MemoryStore>, App, Tasks, Results) {
        let store = Arc::new(MemoryStore::with_bodies(bodies.iter().copied()));
        let app = mounted(store.clone()).await;
        let (tasks, results) = background();
        (store, app, tasks, results)
    }

    /// Reads succeed, writes never answer
    struct StalledWrites(MemoryStore);

    #[async_trait]
    impl TodoStore for StalledWrites {
        async fn list(&self) -> Result<Vec<Todo>, StoreError> {
            self.0.list().await
        }

        async fn insert(&self, _todo: NewTodo) -> Result<Todo, StoreError> {
            std::future::pending().await
        }

        async fn update(&self, _id: TodoId, _patch: TodoPatch) -> Result<Todo, StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_typing_and_enter_adds_todo() {
        let (store, mut app, tasks, mut results) = setup(&["older"]).await;

        handle_normal_mode(&mut app, &tasks, KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(app.input_mode, InputMode::Editing);

        for c in "Buy milk".chars() {
            handle_editing_mode(&mut app, &tasks, KeyCode::Char(c));
        }
        handle_editing_mode(&mut app, &tasks, KeyCode::Enter);
        assert!(app.view.input().is_empty());
        assert_eq!(app.input_cursor, 0);
        assert!(app.is_saving());

        let settled = results.settled.recv().await.unwrap();
        on_settled(&mut app, &tasks, settled);
        assert!(!app.is_saving());
        assert_eq!(app.status_message.as_deref(), Some("Added"));

        let fetched = results.fetched.recv().await.unwrap();
        assert_eq!(app.view.apply(fetched), Completion::Applied);
        assert_eq!(app.view.todos()[0].body, "Buy milk");
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_enter_toggles_selected_todo() {
        let (store, mut app, tasks, mut results) = setup(&["a", "b"]).await;

        handle_normal_mode(&mut app, &tasks, KeyCode::Char('j'), KeyModifiers::NONE);
        handle_normal_mode(&mut app, &tasks, KeyCode::Enter, KeyModifiers::NONE);

        let settled = results.settled.recv().await.unwrap();
        on_settled(&mut app, &tasks, settled);
        assert_eq!(app.status_message.as_deref(), Some("Marked done"));
        assert!(store.get(1).unwrap().finished);

        let fetched = results.fetched.recv().await.unwrap();
        app.view.apply(fetched);
        assert!(app.view.todos()[1].finished);
    }

    #[tokio::test]
    async fn test_failed_toggle_shows_error_and_keeps_list() {
        let (store, mut app, tasks, mut results) = setup(&["a"]).await;
        store.set_failing(true);

        handle_normal_mode(&mut app, &tasks, KeyCode::Enter, KeyModifiers::NONE);
        let settled = results.settled.recv().await.unwrap();
        on_settled(&mut app, &tasks, settled);
        assert!(app.has_error());

        let fetched = results.fetched.recv().await.unwrap();
        app.view.apply(fetched);
        assert_eq!(app.view.todos().len(), 1);
        assert!(!app.view.todos()[0].finished);
    }

    #[tokio::test]
    async fn test_keys_handled_while_store_write_hangs() {
        let store = Arc::new(StalledWrites(MemoryStore::with_bodies(["a", "b"])));
        let mut app = mounted(store).await;
        let (tasks, mut results) = background();

        let handled = tokio::time::timeout(Duration::from_secs(2), async {
            handle_normal_mode(&mut app, &tasks, KeyCode::Enter, KeyModifiers::NONE);
            handle_normal_mode(&mut app, &tasks, KeyCode::Char('a'), KeyModifiers::NONE);
            handle_editing_mode(&mut app, &tasks, KeyCode::Char('x'));
            handle_editing_mode(&mut app, &tasks, KeyCode::Enter);
            handle_editing_mode(&mut app, &tasks, KeyCode::Esc);
            handle_normal_mode(&mut app, &tasks, KeyCode::Char('r'), KeyModifiers::NONE);
            handle_normal_mode(&mut app, &tasks, KeyCode::Char('q'), KeyModifiers::NONE);
        })
        .await;

        assert!(handled.is_ok(), "key handling waited on the store");
        assert!(app.should_quit);
        assert_eq!(app.pending_writes, 2);
        assert!(results.settled.try_recv().is_err());

        // Refetches still arrive while the writes hang
        let fetched = results.fetched.recv().await.unwrap();
        app.view.apply(fetched);
        assert_eq!(app.view.todos().len(), 2);
    }

    #[tokio::test]
    async fn test_quit_keys() {
        let (_store, mut app, tasks, _results) = setup(&[]).await;
        handle_normal_mode(&mut app, &tasks, KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(app.should_quit);
    }
}
