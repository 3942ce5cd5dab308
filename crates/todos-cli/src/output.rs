//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use todos_core::{ChangeEvent, Todo, TodoRow, TodoState};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print the todo list, one row per record
    pub fn print_rows(&self, rows: &[TodoRow]) {
        match self.format {
            OutputFormat::Human => {
                if rows.is_empty() {
                    println!("No todos yet.");
                    return;
                }
                for row in rows {
                    println!("{}", format_row(row));
                }
                let done = rows.iter().filter(|r| r.is_struck()).count();
                println!("\n{} todo(s), {} done", rows.len(), done);
            }
            OutputFormat::Json => print_json(&rows),
            OutputFormat::Quiet => {
                for row in rows {
                    println!("{}", row.id);
                }
            }
        }
    }

    /// Print a single record returned by a mutation
    pub fn print_todo(&self, todo: &Todo) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:       {}", todo.id);
                println!("Body:     {}", todo.body);
                println!(
                    "Finished: {}",
                    if todo.finished { "yes" } else { "no" }
                );
                println!("Created:  {}", todo.created_at.format("%Y-%m-%d %H:%M"));
            }
            OutputFormat::Json => print_json(todo),
            OutputFormat::Quiet => println!("{}", todo.id),
        }
    }

    /// Print a change notification
    pub fn print_change(&self, change: &ChangeEvent) {
        match self.format {
            OutputFormat::Human => {
                println!(
                    "── {} on {}.{} {}",
                    change.kind,
                    change.schema,
                    change.table,
                    change.commit_timestamp.as_deref().unwrap_or("")
                );
            }
            OutputFormat::Json => print_json(change),
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Report a failure that doesn't end the command
    pub fn warning(&self, msg: &str) {
        match self.format {
            OutputFormat::Json => {
                eprintln!("{}", serde_json::json!({"status": "error", "message": msg}));
            }
            _ => eprintln!("✗ {}", msg),
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode output: {}", e),
    }
}

/// One list line: `[x] 3/7/2024  #12  body`
fn format_row(row: &TodoRow) -> String {
    let mark = match row.state {
        TodoState::Pending => "[ ]",
        TodoState::Done => "[x]",
    };
    format!(
        "{} {:<10} #{:<4} {}",
        mark,
        row.date,
        row.id,
        truncate_line(&row.body, 60)
    )
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("ünïcödé text here", 8), "ünïcö...");
    }

    #[test]
    fn test_truncate_line() {
        assert_eq!(truncate_line("single line", 20), "single line");
        assert_eq!(truncate_line("line one\nline two", 20), "line one");
        assert_eq!(truncate_line("", 20), "");
    }

    #[test]
    fn test_format_row_marks_done() {
        let row = TodoRow {
            id: 12,
            date: "3/7/2024".to_string(),
            body: "Buy milk".to_string(),
            state: TodoState::Done,
        };
        assert_eq!(format_row(&row), "[x] 3/7/2024   #12   Buy milk");
    }
}
