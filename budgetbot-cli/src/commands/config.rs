//! Config command - view and change bot settings

use std::path::Path;

use anyhow::Result;
use budgetbot_core::config::{Config, StorageBackend};
use clap::{Subcommand, ValueEnum};
use colored::Colorize;
use dialoguer::Confirm;

use crate::output;

#[derive(Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective settings (including environment overrides)
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Require /register before ledger commands
    Gate {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Set the fixed category list
    Categories {
        /// Allowed categories
        #[arg(required_unless_present = "clear")]
        categories: Vec<String>,
        /// Accept any category again
        #[arg(long, conflicts_with = "categories")]
        clear: bool,
    },
    /// Set the currency symbol used in replies
    Currency { symbol: String },
    /// Switch the ledger backend (json or duckdb)
    Storage {
        kind: String,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },
}

pub fn run(data_dir: &Path, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show { json } => show(&Config::load(data_dir)?, json),
        ConfigCommands::Gate { state } => {
            let mut config = load_for_edit(data_dir)?;
            config.require_registration = matches!(state, Toggle::On);
            config.save(data_dir)?;
            output::success(&format!(
                "Registration gate {}",
                if config.require_registration { "on" } else { "off" }
            ));
            Ok(())
        }
        ConfigCommands::Categories { categories, clear } => {
            let mut config = load_for_edit(data_dir)?;
            let categories = if clear { Vec::new() } else { categories };
            config.set_categories(&categories);
            config.save(data_dir)?;
            match &config.categories {
                Some(list) => output::success(&format!("Categories: {}", list.join(", "))),
                None => output::success("Any category is accepted"),
            }
            Ok(())
        }
        ConfigCommands::Currency { symbol } => {
            let mut config = load_for_edit(data_dir)?;
            config.currency = symbol.trim().to_string();
            config.save(data_dir)?;
            output::success(&format!("Currency: {}", config.currency));
            Ok(())
        }
        ConfigCommands::Storage { kind, force } => switch_storage(data_dir, &kind, force),
    }
}

/// Edits start from the file alone so env overrides don't get persisted
fn load_for_edit(data_dir: &Path) -> Result<Config> {
    Config::load_file(data_dir)
}

fn switch_storage(data_dir: &Path, kind: &str, force: bool) -> Result<()> {
    let mut config = load_for_edit(data_dir)?;
    let storage: StorageBackend = kind.parse()?;
    if storage == config.storage {
        output::info(&format!("Storage is already {}", storage));
        return Ok(());
    }

    if !force
        && !Confirm::new()
            .with_prompt(format!(
                "Switch storage from {} to {}? Existing records are not moved.",
                config.storage, storage
            ))
            .default(false)
            .interact()?
    {
        println!("Cancelled.");
        return Ok(());
    }

    config.storage = storage;
    config.save(data_dir)?;
    output::success(&format!("Storage: {}", storage));
    Ok(())
}

fn show(config: &Config, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "requireRegistration": config.require_registration,
                "categories": config.categories,
                "currency": config.currency,
                "storage": config.storage.to_string(),
                "dataFile": config.data_file,
            }))?
        );
        return Ok(());
    }

    println!("{}", "Bot Settings".bold());
    let mut table = output::create_table();
    table.add_row(vec![
        "Registration required",
        if config.require_registration { "yes" } else { "no" },
    ]);
    let categories = config
        .categories
        .as_ref()
        .map_or_else(|| "any".to_string(), |c| c.join(", "));
    table.add_row(vec!["Categories", &categories]);
    table.add_row(vec!["Currency", &config.currency]);
    table.add_row(vec!["Storage", &config.storage.to_string()]);
    table.add_row(vec!["Data file", &config.data_file]);
    println!("{}", table);
    Ok(())
}
