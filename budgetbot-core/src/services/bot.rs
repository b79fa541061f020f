//! Bot service - the poll, handle, reply loop over a chat transport

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;

use crate::ports::{ChatTransport, InboundMessage};

use super::command::CommandProcessor;
use super::logging::{LogEvent, LoggingService};

/// First delay after a failed poll (doubles per consecutive failure)
const INITIAL_POLL_BACKOFF_MS: u64 = 500;

/// Upper bound for the poll backoff
const MAX_POLL_BACKOFF_MS: u64 = 30_000;

/// Counters for one run of the loop
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BotStats {
    pub handled: usize,
    pub failed: usize,
    pub poll_errors: usize,
    pub send_errors: usize,
}

pub struct BotService {
    processor: Arc<CommandProcessor>,
    logger: Option<Arc<LoggingService>>,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl BotService {
    pub fn new(processor: Arc<CommandProcessor>) -> Self {
        Self {
            processor,
            logger: None,
            initial_backoff: Duration::from_millis(INITIAL_POLL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MAX_POLL_BACKOFF_MS),
        }
    }

    /// Write events to the event log as well
    pub fn with_logger(mut self, logger: Arc<LoggingService>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Logging must never break request handling
    fn record(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            if let Err(e) = logger.log(event) {
                tracing::warn!(error = %e, "failed to write event log");
            }
        }
    }

    fn poll_delay(&self, consecutive_failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(consecutive_failures.saturating_sub(1));
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }

    /// Run until the transport closes.
    ///
    /// Messages are handled one at a time, each to completion. A poll
    /// failure waits with capped exponential backoff and polls again.
    pub fn run(&self, transport: &mut dyn ChatTransport) -> Result<BotStats> {
        let transport_name = transport.name().to_string();
        let mut stats = BotStats::default();
        let mut consecutive_failures = 0u32;

        tracing::info!(transport = %transport_name, "bot started");
        self.record(LogEvent::new("bot_started").with_transport(&transport_name));

        loop {
            let batch = match transport.poll() {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(e) => {
                    stats.poll_errors += 1;
                    consecutive_failures += 1;
                    let delay = self.poll_delay(consecutive_failures);
                    tracing::warn!(
                        transport = %transport_name,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "poll failed, backing off"
                    );
                    self.record(
                        LogEvent::new("poll_failed")
                            .with_transport(&transport_name)
                            .with_error(e.to_string()),
                    );
                    thread::sleep(delay);
                    continue;
                }
            };
            consecutive_failures = 0;

            for message in batch {
                self.handle_message(transport, &transport_name, &message, &mut stats);
            }
        }

        tracing::info!(
            transport = %transport_name,
            handled = stats.handled,
            failed = stats.failed,
            "bot stopped"
        );
        self.record(LogEvent::new("bot_stopped").with_transport(&transport_name));
        Ok(stats)
    }

    fn handle_message(
        &self,
        transport: &mut dyn ChatTransport,
        transport_name: &str,
        message: &InboundMessage,
        stats: &mut BotStats,
    ) {
        let handled = match self.processor.handle(&message.sender, &message.text) {
            Ok(handled) => handled,
            Err(e) => {
                // Storage failure: this request ends here, without a reply
                stats.failed += 1;
                tracing::error!(transport = %transport_name, error = %e, "command failed");
                self.record(
                    LogEvent::new("command_failed")
                        .with_transport(transport_name)
                        .with_error(e.to_string())
                        .with_error_details(format!("{:#}", e)),
                );
                return;
            }
        };

        let command = handled.kind.map_or("unknown", |k| k.as_str());
        tracing::debug!(transport = %transport_name, command, "command handled");
        self.record(
            LogEvent::new("command_handled")
                .with_transport(transport_name)
                .with_command(command),
        );
        stats.handled += 1;

        if let Err(e) = transport.send(&message.chat_id, &handled.reply) {
            stats.send_errors += 1;
            tracing::warn!(transport = %transport_name, error = %e, "failed to send reply");
            self.record(
                LogEvent::new("reply_failed")
                    .with_transport(transport_name)
                    .with_command(command)
                    .with_error(e.to_string()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::services::command::ProcessorSettings;

    #[test]
    fn test_poll_delay_is_capped() {
        let processor = Arc::new(CommandProcessor::new(
            Arc::new(MemoryStore::new()),
            ProcessorSettings::default(),
        ));
        let bot = BotService::new(processor)
            .with_backoff(Duration::from_millis(100), Duration::from_millis(1000));

        assert_eq!(bot.poll_delay(1), Duration::from_millis(100));
        assert_eq!(bot.poll_delay(2), Duration::from_millis(200));
        assert_eq!(bot.poll_delay(4), Duration::from_millis(800));
        assert_eq!(bot.poll_delay(5), Duration::from_millis(1000));
        assert_eq!(bot.poll_delay(60), Duration::from_millis(1000));
    }
}
