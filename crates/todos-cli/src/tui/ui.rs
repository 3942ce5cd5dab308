//! UI rendering

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use todos_core::models::ActionColor;
use todos_core::TodoRow;

use super::app::{App, InputMode, RealtimeIndicator};

const ADD_LABEL: &str = "[ Add ]";
const INPUT_PLACEHOLDER: &str = "Add a todo";

/// Main UI rendering function
pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_heading(frame, chunks[0]);
    draw_list(frame, app, chunks[1]);
    draw_input(frame, app, chunks[2]);
    draw_status_bar(frame, app, chunks[3]);

    // Draw realtime indicator in top-right corner
    draw_realtime_indicator(frame, app);

    if app.show_help {
        draw_help_overlay(frame);
    }
}

fn draw_heading(frame: &mut Frame, area: Rect) {
    let heading = Paragraph::new(Span::styled(
        " Todos",
        Style::default().add_modifier(Modifier::BOLD),
    ));
    frame.render_widget(heading, area);
}

/// Draw the todo rows
fn draw_list(frame: &mut Frame, app: &App, area: Rect) {
    let is_active = app.input_mode == InputMode::Normal;
    let border_style = if is_active {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);

    let rows = app.view.rows();
    if rows.is_empty() {
        let hint = if !app.view.is_loaded() && app.view.is_loading() {
            "Loading..."
        } else {
            "No todos yet. Press a to add one."
        };
        let paragraph = Paragraph::new(Span::styled(
            hint,
            Style::default().add_modifier(Modifier::DIM),
        ))
        .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let inner_width = area.width.saturating_sub(4) as usize;
    let items: Vec<ListItem> = rows.iter().map(|row| row_item(row, inner_width)).collect();

    let highlight_style = if is_active {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    };

    let list = List::new(items)
        .block(block)
        .highlight_style(highlight_style)
        .highlight_symbol("› ");

    let mut state = ListState::default();
    state.select(Some(app.selected));

    frame.render_stateful_widget(list, area, &mut state);
}

/// One row: date, body and the toggle control pushed to the right edge
fn row_item(row: &TodoRow, width: usize) -> ListItem<'static> {
    let date = format!("{:<11}", row.date);
    let action = format!("[{}]", row.action_label());

    let used = date.chars().count() + action.chars().count() + 1;
    let body_width = width.saturating_sub(used);
    let body = fit(&row.body, body_width);
    let padding = body_width.saturating_sub(body.chars().count());

    let body_style = if row.is_struck() {
        Style::default()
            .add_modifier(Modifier::CROSSED_OUT)
            .add_modifier(Modifier::DIM)
    } else {
        Style::default()
    };

    ListItem::new(Line::from(vec![
        Span::styled(date, Style::default().add_modifier(Modifier::DIM)),
        Span::styled(body, body_style),
        Span::raw(" ".repeat(padding + 1)),
        Span::styled(
            action,
            Style::default().fg(action_color(row.state.action_color())),
        ),
    ]))
}

/// First line of `s`, cut to `width` characters with an ellipsis
fn fit(s: &str, width: usize) -> String {
    let line = s.lines().next().unwrap_or("");
    if line.chars().count() <= width {
        line.to_string()
    } else if width == 0 {
        String::new()
    } else {
        let kept: String = line.chars().take(width - 1).collect();
        format!("{}…", kept)
    }
}

fn action_color(color: ActionColor) -> Color {
    match color {
        ActionColor::Red => Color::Red,
        ActionColor::Green => Color::Green,
        ActionColor::Blue => Color::Blue,
    }
}

/// Draw the "Add a todo" field with its Add control
fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(ADD_LABEL.len() as u16 + 2),
        ])
        .split(area);

    let editing = app.input_mode == InputMode::Editing;
    let border_style = if editing {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);

    let input = app.view.input();
    let inner_width = chunks[0].width.saturating_sub(2);
    let scroll = if editing {
        input_scroll(app.cursor_width(), inner_width)
    } else {
        0
    };
    let content = if input.is_empty() && !editing {
        Span::styled(INPUT_PLACEHOLDER, Style::default().add_modifier(Modifier::DIM))
    } else {
        Span::raw(input)
    };
    frame.render_widget(
        Paragraph::new(content).block(block).scroll((0, scroll)),
        chunks[0],
    );

    let add = Paragraph::new(Span::styled(
        ADD_LABEL,
        Style::default()
            .fg(action_color(ActionColor::Blue))
            .add_modifier(Modifier::BOLD),
    ))
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(add, chunks[1]);

    if editing && inner_width > 0 {
        let column = (app.cursor_width() as u16)
            .saturating_sub(scroll)
            .min(inner_width - 1);
        frame.set_cursor_position((chunks[0].x + 1 + column, chunks[0].y + 1));
    }
}

/// Columns to scroll the input so a cursor `cursor` columns into the text
/// stays inside a field `width` columns wide
fn input_scroll(cursor: usize, width: u16) -> u16 {
    let last = (width as usize).saturating_sub(1);
    cursor.saturating_sub(last).min(u16::MAX as usize) as u16
}

/// Draw the status bar at the bottom
fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let paragraph = if let Some(err) = app.view.last_error() {
        Paragraph::new(format!("✗ {}", err)).style(Style::default().fg(Color::Red))
    } else {
        let content = if let Some(msg) = &app.status_message {
            msg.clone()
        } else if app.is_saving() {
            "Saving...".to_string()
        } else {
            match app.input_mode {
                InputMode::Normal => {
                    "enter:toggle  a:add  r:refresh  j/k:move  ?:help  q:quit".to_string()
                }
                InputMode::Editing => "enter:add  esc:done".to_string(),
            }
        };
        Paragraph::new(content).style(Style::default().add_modifier(Modifier::DIM))
    };

    frame.render_widget(paragraph, area);
}

/// Draw realtime indicator in top-right corner
fn draw_realtime_indicator(frame: &mut Frame, app: &App) {
    let area = frame.area();
    if area.width < 5 {
        return;
    }

    let (icon, style) = match app.realtime {
        RealtimeIndicator::Subscribed => ("✓", Style::default().fg(Color::Green)),
        RealtimeIndicator::Connecting => ("↻", Style::default().fg(Color::Yellow)),
        RealtimeIndicator::Disconnected => ("⚡", Style::default().fg(Color::DarkGray)),
        RealtimeIndicator::Local => ("○", Style::default().add_modifier(Modifier::DIM)),
        RealtimeIndicator::Error => ("✗", Style::default().fg(Color::Red)),
    };

    let indicator = Paragraph::new(Span::styled(icon, style));
    let indicator_area = Rect::new(area.width - 2, 0, 1, 1);
    frame.render_widget(indicator, indicator_area);
}

/// Draw help overlay
fn draw_help_overlay(frame: &mut Frame) {
    let area = frame.area();

    let popup_width = 44.min(area.width.saturating_sub(4));
    let popup_height = 17.min(area.height.saturating_sub(4));
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(ratatui::widgets::Clear, popup_area);

    let help_text = vec![
        Line::from(vec![Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from(""),
        Line::from("  j/k, ↑/↓    Move up/down"),
        Line::from("  g/G         First/last todo"),
        Line::from("  Enter, Spc  Mark done / not completed"),
        Line::from("  a, i        Add a todo"),
        Line::from("  r           Refresh"),
        Line::from("  q           Quit"),
        Line::from(""),
        Line::from("While adding:"),
        Line::from("  Enter       Add"),
        Line::from("  Esc         Back to the list"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().add_modifier(Modifier::BOLD));

    let paragraph = Paragraph::new(help_text).block(block);
    frame.render_widget(paragraph, popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, buffer::Buffer, Terminal};
    use std::sync::Arc;
    use todos_core::{MemoryStore, TodoPatch, TodoState, TodoStore, TodoView};

    fn row(state: TodoState, body: &str) -> TodoRow {
        TodoRow {
            id: 1,
            date: "3/7/2024".to_string(),
            body: body.to_string(),
            state,
        }
    }

    #[test]
    fn test_fit() {
        assert_eq!(fit("short", 10), "short");
        assert_eq!(fit("a longer body", 6), "a lon…");
        assert_eq!(fit("first\nsecond", 20), "first");
        assert_eq!(fit("anything", 0), "");
    }

    #[test]
    fn test_row_item_controls() {
        let pending = row_item(&row(TodoState::Pending, "Buy milk"), 60);
        assert_eq!(pending.width(), 60);

        let done = row_item(&row(TodoState::Done, "Buy milk"), 60);
        assert_eq!(done.width(), 60);
    }

    #[test]
    fn test_input_scroll_keeps_cursor_in_field() {
        assert_eq!(input_scroll(0, 10), 0);
        assert_eq!(input_scroll(9, 10), 0);
        assert_eq!(input_scroll(10, 10), 1);
        assert_eq!(input_scroll(25, 10), 16);
        assert_eq!(input_scroll(5, 0), 5);
    }

    /// Top-left cell of the first occurrence of `text`
    fn find_cell(buffer: &Buffer, text: &str) -> Option<(u16, u16)> {
        let symbols: Vec<String> = text.chars().map(|c| c.to_string()).collect();
        let len = symbols.len() as u16;
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width.saturating_sub(len.saturating_sub(1)) {
                let matches = symbols
                    .iter()
                    .enumerate()
                    .all(|(i, s)| buffer[(x + i as u16, y)].symbol() == s);
                if matches {
                    return Some((x, y));
                }
            }
        }
        None
    }

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|line| line.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn test_draw_renders_rows_and_controls() {
        let store = Arc::new(MemoryStore::with_bodies(["Walk dog", "Buy milk"]));
        store.update(1, TodoPatch { finished: true }).await.unwrap();

        let mut view = TodoView::new(store);
        let fetched = view.mount().run().await;
        view.apply(fetched);
        let app = App::new(view, RealtimeIndicator::Local);

        let mut terminal = Terminal::new(TestBackend::new(70, 12)).unwrap();
        terminal.draw(|frame| draw(frame, &app)).unwrap();
        let text = buffer_text(&terminal);

        assert!(text.contains("Todos"));
        assert!(text.contains("Buy milk"));
        assert!(text.contains("[Mark done]"));
        assert!(text.contains("[Mark not completed]"));
        assert!(text.contains("Add a todo"));
        assert!(text.contains(ADD_LABEL));

        // Newest first
        let milk = text.find("Buy milk").unwrap();
        let dog = text.find("Walk dog").unwrap();
        assert!(milk < dog);

        let buffer = terminal.backend().buffer();

        // Done rows are struck through, pending rows are not
        let (x, y) = find_cell(buffer, "Walk dog").unwrap();
        assert!(buffer[(x, y)].modifier.contains(Modifier::CROSSED_OUT));
        let (x, y) = find_cell(buffer, "Buy milk").unwrap();
        assert!(!buffer[(x, y)].modifier.contains(Modifier::CROSSED_OUT));

        let (x, y) = find_cell(buffer, "[Mark done]").unwrap();
        assert_eq!(buffer[(x, y)].fg, Color::Red);
        let (x, y) = find_cell(buffer, "[Mark not completed]").unwrap();
        assert_eq!(buffer[(x, y)].fg, Color::Green);
        let (x, y) = find_cell(buffer, ADD_LABEL).unwrap();
        assert_eq!(buffer[(x, y)].fg, Color::Blue);
    }

    #[tokio::test]
    async fn test_long_input_scrolls_and_cursor_stays_in_field() {
        let store = Arc::new(MemoryStore::new());
        let mut view = TodoView::new(store);
        let fetched = view.mount().run().await;
        view.apply(fetched);
        let mut app = App::new(view, RealtimeIndicator::Local);

        app.enter_input_mode();
        for c in "0123456789".repeat(6).chars() {
            app.insert_char(c);
        }
        app.insert_char('Z');

        let mut terminal = Terminal::new(TestBackend::new(40, 12)).unwrap();
        terminal.draw(|frame| draw(frame, &app)).unwrap();

        // Field spans columns 0..31, its text 1..30; the Add box follows
        let add_x = find_cell(terminal.backend().buffer(), ADD_LABEL).unwrap().0;
        let cursor = terminal.get_cursor_position().unwrap();
        assert!(cursor.x >= 1);
        assert!(cursor.x < add_x - 2);

        // The end of the text is visible just left of the cursor
        let buffer = terminal.backend().buffer();
        assert_eq!(buffer[(cursor.x - 1, cursor.y)].symbol(), "Z");

        // Back at the start, the head of the text shows again
        app.cursor_home();
        terminal.draw(|frame| draw(frame, &app)).unwrap();
        let cursor = terminal.get_cursor_position().unwrap();
        assert_eq!(cursor.x, 1);
        assert_eq!(terminal.backend().buffer()[(1, cursor.y)].symbol(), "0");
    }
}
