//! Todos CLI
//!
//! Command-line and terminal interface for a live, shared todo list.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use todos_core::{Config, TodoId};

mod backend;
mod commands;
mod output;
mod tui;

use backend::Backend;
use output::{Output, OutputFormat};

/// Environment variable holding the log level
pub(crate) const LOG_ENV: &str = "TODOS_LOG";

#[derive(Parser)]
#[command(name = "todos")]
#[command(about = "Todos - a shared todo list that updates live")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use an in-memory store instead of the hosted one
    #[arg(long, global = true)]
    offline: bool,

    /// Path to config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the TUI interface
    Tui,
    /// List all todos, newest first
    #[command(alias = "ls")]
    List,
    /// Add a todo
    Add {
        /// Todo text
        body: String,
    },
    /// Mark a todo done, or not completed if it already is
    Toggle {
        /// Todo ID
        id: TodoId,
    },
    /// Print the list again whenever it changes
    Watch,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (url, anon_key, table, channel, heartbeat_secs, data_dir, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Commands that don't need the store
    if let Some(Commands::Config { command }) = &cli.command {
        return handle_config_command(command.clone(), config_path, &output);
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    // Handle TUI (default when no command given); it sets up its own logging
    let Some(command) = cli.command else {
        return tui::run(config, cli.offline).await;
    };
    if matches!(command, Commands::Tui) {
        return tui::run(config, cli.offline).await;
    }

    init_cli_logging();
    let backend = Backend::open(&config, cli.offline)?;

    match command {
        Commands::Tui | Commands::Config { .. } => unreachable!(), // Handled above
        Commands::List => commands::list::list(backend.store(), &output).await,
        Commands::Add { body } => commands::add::add(backend.store(), body, &output).await,
        Commands::Toggle { id } => commands::toggle::toggle(backend.store(), id, &output).await,
        Commands::Watch => commands::watch::watch(&backend, &output).await,
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Log to stderr, only if TODOS_LOG is set
fn init_cli_logging() {
    let Ok(log_level) = std::env::var(LOG_ENV) else {
        return;
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(&log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub(crate) fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!("todos_core={},todos_cli={}", level, level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_tui() {
        let cli = Cli::try_parse_from(["todos", "--offline"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.offline);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["todos", "toggle", "42", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Some(Commands::Toggle { id: 42 })));
    }

    #[test]
    fn test_add_takes_body() {
        let cli = Cli::try_parse_from(["todos", "add", "Buy milk"]).unwrap();
        match cli.command {
            Some(Commands::Add { body }) => assert_eq!(body, "Buy milk"),
            _ => panic!("Expected add command"),
        }
    }
}
