//! Config command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use todos_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "url": config.url,
                    "anon_key": config.anon_key.as_deref().map(mask_key),
                    "table": config.table,
                    "channel": config.channel,
                    "heartbeat_secs": config.heartbeat_secs,
                    "data_dir": config.data_dir,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.url.as_deref().unwrap_or(""));
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!(
                "  url:            {}",
                config.url.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  anon_key:       {}",
                config
                    .anon_key
                    .as_deref()
                    .map(mask_key)
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("  table:          {}", config.table);
            println!("  channel:        {}", config.channel);
            println!("  heartbeat_secs: {}", config.heartbeat_secs);
            println!("  data_dir:       {}", config.data_dir.display());
            println!(
                "  log_file:       {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    config.set(&key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    let shown = if key == "anon_key" {
        mask_key(&value)
    } else {
        value
    };
    output.success(&format!("Set {} = {}", key, shown));

    Ok(())
}

/// Show only the first few characters of a key
fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(6).collect();
    if prefix.len() == key.len() {
        "*".repeat(key.chars().count())
    } else {
        format!("{}…", prefix)
    }
}
