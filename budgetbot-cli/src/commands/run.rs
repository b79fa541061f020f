//! Run command - serve the bot over the Telegram Bot API

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use budgetbot_core::adapters::telegram::{TelegramTransport, DEFAULT_API_URL};
use budgetbot_core::services::EntryPoint;

use super::{bot_service, get_context};
use crate::output;

pub fn run(
    data_dir: &Path,
    token: Option<String>,
    api_url: Option<&str>,
    poll_timeout: u64,
) -> Result<()> {
    let token = token
        .filter(|t| !t.trim().is_empty())
        .context("No bot token. Set the TOKEN environment variable or pass --token")?;

    let ctx = get_context(data_dir)?;
    let mut transport = TelegramTransport::with_api_url(
        &token,
        api_url.unwrap_or(DEFAULT_API_URL),
        Duration::from_secs(poll_timeout),
    )?;

    let me = transport
        .get_me()
        .context("Failed to reach the Telegram Bot API")?;
    let bot_name = me.username.unwrap_or_else(|| me.first_name.clone());

    output::success(&format!("@{} is listening", bot_name));
    output::info(&format!(
        "storage: {}, registration required: {}",
        ctx.store.name(),
        ctx.config.require_registration
    ));

    let bot = bot_service(data_dir, Arc::clone(&ctx.processor), EntryPoint::Bot);
    let stats = bot.run(&mut transport)?;
    tracing::info!(
        handled = stats.handled,
        failed = stats.failed,
        poll_errors = stats.poll_errors,
        "bot finished"
    );
    Ok(())
}
