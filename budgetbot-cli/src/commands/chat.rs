//! Chat command - talk to the bot from the terminal
//!
//! Every stdin line is one message from a single local sender. Replies are
//! printed; export attachments are written to the output directory.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use budgetbot_core::domain::result::{Error, Result as StoreResult};
use budgetbot_core::ports::{ChatTransport, InboundMessage, Reply, Sender};
use budgetbot_core::services::EntryPoint;
use colored::Colorize;

use super::{bot_service, get_context};
use crate::output;

const CHAT_ID: &str = "console";

/// Lines ending the session besides end of input
const QUIT_WORDS: [&str; 2] = ["/quit", "/exit"];

pub struct ConsoleTransport<R, W> {
    input: R,
    output: W,
    sender: Sender,
    attachment_dir: PathBuf,
    prompt: bool,
}

impl<R: BufRead, W: Write> ConsoleTransport<R, W> {
    pub fn new(input: R, output: W, sender: Sender, attachment_dir: PathBuf) -> Self {
        Self {
            input,
            output,
            sender,
            attachment_dir,
            prompt: false,
        }
    }

    /// Print a prompt before each read
    pub fn with_prompt(mut self, prompt: bool) -> Self {
        self.prompt = prompt;
        self
    }
}

impl<R: BufRead, W: Write> ChatTransport for ConsoleTransport<R, W> {
    fn name(&self) -> &str {
        "console"
    }

    fn poll(&mut self) -> StoreResult<Option<Vec<InboundMessage>>> {
        if self.prompt {
            write!(self.output, "{} ", ">".bold())?;
            self.output.flush()?;
        }

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        let text = line.trim();
        if QUIT_WORDS.contains(&text) {
            return Ok(None);
        }
        if text.is_empty() {
            return Ok(Some(Vec::new()));
        }

        Ok(Some(vec![InboundMessage {
            chat_id: CHAT_ID.to_string(),
            sender: self.sender.clone(),
            text: text.to_string(),
        }]))
    }

    fn send(&mut self, _chat_id: &str, reply: &Reply) -> StoreResult<()> {
        writeln!(self.output, "{}", reply.text)?;

        if let Some(attachment) = &reply.attachment {
            let path = self.attachment_dir.join(&attachment.file_name);
            std::fs::write(&path, &attachment.bytes)
                .map_err(|e| {
                    Error::transport(format!("Failed to write {}: {}", path.display(), e))
                })?;
            writeln!(self.output, "{} {}", "📎".dimmed(), path.display())?;
        }
        Ok(())
    }
}

pub fn run(data_dir: &Path, user: &str, name: Option<&str>) -> Result<()> {
    let ctx = get_context(data_dir)?;
    let sender = Sender::new(user, name.unwrap_or(user));
    let interactive = output::is_interactive();

    if interactive {
        output::info(&format!(
            "Chatting as {} (storage: {}). /quit or Ctrl-D to leave.",
            sender.display_name,
            ctx.store.name()
        ));
    }

    let stdin = io::stdin();
    let mut transport = ConsoleTransport::new(
        stdin.lock(),
        io::stdout(),
        sender,
        std::env::current_dir()?,
    )
    .with_prompt(interactive);

    let bot = bot_service(data_dir, Arc::clone(&ctx.processor), EntryPoint::Cli);
    let stats = bot.run(&mut transport)?;
    if stats.failed > 0 {
        output::warning(&format!(
            "{} message(s) failed, see `budgetbot logs list --errors`",
            stats.failed
        ));
    }
    Ok(())
}
