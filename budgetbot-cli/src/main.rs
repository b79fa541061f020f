//! Budgetbot CLI - family budget chat bot and ledger tools

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use budgetbot_core::services::LogEvent;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{chat, config, export, logs, run, status};

/// Budgetbot - expense and income tracking over chat
#[derive(Parser)]
#[command(name = "budgetbot", version, about, long_about = None)]
struct Cli {
    /// Data directory (defaults to ~/.budgetbot)
    #[arg(long, global = true, env = "BUDGETBOT_DIR")]
    data_dir: Option<PathBuf>,

    /// Emit diagnostics as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot against the Telegram Bot API
    Run {
        /// Bot token
        #[arg(long, env = "TOKEN", hide_env_values = true)]
        token: Option<String>,
        /// Bot API base URL
        #[arg(long)]
        api_url: Option<String>,
        /// Long-poll timeout in seconds
        #[arg(long, default_value = "30")]
        poll_timeout: u64,
    },

    /// Talk to the bot in the terminal
    Chat {
        /// Sender id to chat as
        #[arg(long, default_value = "console")]
        user: String,
        /// Display name to chat as
        #[arg(long)]
        name: Option<String>,
    },

    /// Show ledger status and totals
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export one owner's records as CSV
    Export {
        /// Owner (sender) id
        #[arg(long)]
        owner: String,
        /// Only records in this category (exact name)
        #[arg(long)]
        category: Option<String>,
        /// Output file (defaults to export_<owner>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show or change bot settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Run { .. } => "run",
            Commands::Chat { .. } => "chat",
            Commands::Status { .. } => "status",
            Commands::Export { .. } => "export",
            Commands::Config { .. } => "config",
            Commands::Logs { .. } => "logs",
        }
    }

    /// The bot runner reports progress; one-shot commands stay quiet
    fn default_log_level(&self) -> &'static str {
        match self {
            Commands::Run { .. } => "info",
            _ => "warn",
        }
    }
}

/// Diagnostics go to stderr so stdout stays clean for command output
fn init_tracing(default_level: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.command.default_log_level(), cli.log_json);

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let data_dir = commands::get_data_dir(cli.data_dir)?;
    let command_name = cli.command.name();
    // The event log is opened per write; the bot runner holds its own handle
    commands::log_event(&data_dir, LogEvent::new("command_executed").with_command(command_name));

    let result = match cli.command {
        Commands::Run { token, api_url, poll_timeout } => {
            run::run(&data_dir, token, api_url.as_deref(), poll_timeout)
        }
        Commands::Chat { user, name } => chat::run(&data_dir, &user, name.as_deref()),
        Commands::Status { json } => status::run(&data_dir, json),
        Commands::Export {
            owner,
            category,
            output,
        } => export::run(&data_dir, &owner, category.as_deref(), output),
        Commands::Config { command } => config::run(&data_dir, command),
        Commands::Logs { command } => logs::run(&data_dir, command),
    };

    if let Err(e) = &result {
        commands::log_event(
            &data_dir,
            LogEvent::new("command_failed")
                .with_command(command_name)
                .with_error(e.to_string()),
        );
    }
    result
}
