//! CLI command implementations

pub mod chat;
pub mod config;
pub mod export;
pub mod logs;
pub mod run;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use budgetbot_core::services::{BotService, CommandProcessor, EntryPoint, LogEvent, LoggingService};
use budgetbot_core::BudgetContext;

/// Resolve the data directory (flag or BUDGETBOT_DIR, else ~/.budgetbot) and create it
pub fn get_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    let data_dir = match explicit {
        Some(dir) => dir,
        None => dirs::home_dir()
            .context("Could not find home directory; pass --data-dir")?
            .join(".budgetbot"),
    };

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir)
}

/// Get the logging service for one-shot CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger(data_dir: &Path) -> Option<LoggingService> {
    LoggingService::new(data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(data_dir: &Path, event: LogEvent) {
    if let Some(logger) = get_logger(data_dir) {
        let _ = logger.log(event);
    }
}

/// Bot loop that records its events in the data directory's event log.
///
/// The loop holds the log open while it runs, so one-shot `log_event` writes
/// must not overlap with it.
pub fn bot_service(
    data_dir: &Path,
    processor: Arc<CommandProcessor>,
    entry_point: EntryPoint,
) -> BotService {
    let bot = BotService::new(processor);
    match LoggingService::new(data_dir, entry_point, env!("CARGO_PKG_VERSION")) {
        Ok(logger) => bot.with_logger(Arc::new(logger)),
        Err(e) => {
            tracing::warn!(error = %e, "event log unavailable, continuing without it");
            bot
        }
    }
}

/// Load settings and open the configured ledger store
pub fn get_context(data_dir: &Path) -> Result<BudgetContext> {
    BudgetContext::new(data_dir).context("Failed to initialize budget context")
}
