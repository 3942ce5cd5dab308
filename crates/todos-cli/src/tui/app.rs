//! Application state and logic

use std::time::{Duration, Instant};

use ratatui::text::Span;
use todos_core::{SubscriptionStatus, Todo, TodoView};

/// How long a status message stays visible
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Input mode for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Normal navigation mode
    Normal,
    /// Typing into the "Add a todo" field
    Editing,
}

/// Realtime status indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeIndicator {
    /// Joined the channel, changes arrive live
    Subscribed,
    /// Connecting or joining
    Connecting,
    /// Disconnected, will retry
    Disconnected,
    /// In-memory store, no realtime service
    Local,
    /// Last attempt failed
    Error,
}

impl From<SubscriptionStatus> for RealtimeIndicator {
    fn from(status: SubscriptionStatus) -> Self {
        match status {
            SubscriptionStatus::Subscribed => RealtimeIndicator::Subscribed,
            SubscriptionStatus::Connecting => RealtimeIndicator::Connecting,
            SubscriptionStatus::Disconnected => RealtimeIndicator::Disconnected,
        }
    }
}

/// Application state
pub struct App {
    /// Whether the app should exit
    pub should_quit: bool,
    /// Current input mode
    pub input_mode: InputMode,
    /// List state, input text and last error
    pub view: TodoView,
    /// Index of the selected row
    pub selected: usize,
    /// Cursor position in the input, in characters
    pub input_cursor: usize,
    /// Status message to display temporarily
    pub status_message: Option<String>,
    /// When the status message was set (for auto-dismiss)
    pub status_message_time: Option<Instant>,
    /// Whether help overlay is visible
    pub show_help: bool,
    /// Realtime status indicator
    pub realtime: RealtimeIndicator,
    /// Store writes sent but not yet answered
    pub pending_writes: usize,
}

impl App {
    pub fn new(view: TodoView, realtime: RealtimeIndicator) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            view,
            selected: 0,
            input_cursor: 0,
            status_message: None,
            status_message_time: None,
            show_help: false,
            realtime,
            pending_writes: 0,
        }
    }

    /// Follow a subscription status change
    ///
    /// A failed attempt stays visible through the reconnect cycle until the
    /// channel is joined again.
    pub fn set_realtime_status(&mut self, status: SubscriptionStatus) {
        if self.realtime == RealtimeIndicator::Error && status != SubscriptionStatus::Subscribed {
            return;
        }
        self.realtime = RealtimeIndicator::from(status);
    }

    pub fn is_saving(&self) -> bool {
        self.pending_writes > 0
    }

    /// Set a status message (will auto-dismiss after 3 seconds)
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_message_time = Some(Instant::now());
    }

    /// Check and clear expired status message
    pub fn check_status_timeout(&mut self) {
        if let Some(time) = self.status_message_time {
            if time.elapsed() > STATUS_TIMEOUT {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
    }

    pub fn has_error(&self) -> bool {
        self.view.last_error().is_some()
    }

    pub fn clear_error(&mut self) {
        self.view.clear_error();
    }

    /// Toggle help overlay
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Get the currently selected todo
    pub fn current_todo(&self) -> Option<&Todo> {
        self.view.todos().get(self.selected)
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.view.todos().len() {
            self.selected += 1;
        }
    }

    pub fn move_to_first(&mut self) {
        self.selected = 0;
    }

    pub fn move_to_last(&mut self) {
        self.selected = self.view.todos().len().saturating_sub(1);
    }

    /// Keep the selection on a row after the list changed
    pub fn clamp_selection(&mut self) {
        let len = self.view.todos().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    /// Focus the "Add a todo" field
    pub fn enter_input_mode(&mut self) {
        self.input_mode = InputMode::Editing;
        self.input_cursor = self.view.input().chars().count();
    }

    /// Leave the input field, keeping its text
    pub fn exit_input_mode(&mut self) {
        self.input_mode = InputMode::Normal;
    }

    /// Cursor position after the input was cleared by a submit
    pub fn reset_cursor(&mut self) {
        self.input_cursor = 0;
    }

    /// Insert character at cursor position
    pub fn insert_char(&mut self, c: char) {
        let at = self.cursor_byte_index();
        self.view.input_mut().insert(at, c);
        self.input_cursor += 1;
    }

    /// Delete character before cursor
    pub fn delete_char(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            let at = self.cursor_byte_index();
            self.view.input_mut().remove(at);
        }
    }

    /// Move cursor left
    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    /// Move cursor right
    pub fn cursor_right(&mut self) {
        if self.input_cursor < self.view.input().chars().count() {
            self.input_cursor += 1;
        }
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.view.input().chars().count();
    }

    /// Display width of the input text left of the cursor
    pub fn cursor_width(&self) -> usize {
        let input = self.view.input();
        Span::raw(&input[..self.cursor_byte_index()]).width()
    }

    fn cursor_byte_index(&self) -> usize {
        let input = self.view.input();
        input
            .char_indices()
            .nth(self.input_cursor)
            .map(|(i, _)| i)
            .unwrap_or(input.len())
    }
}
