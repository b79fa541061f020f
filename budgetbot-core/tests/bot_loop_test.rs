//! Bot loop tests
//!
//! A scripted transport stands in for Telegram: each poll hands out the next
//! scripted step, sent replies are recorded for inspection.
//!
//! Run with: cargo test --test bot_loop_test -- --nocapture

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use budgetbot_core::adapters::memory::MemoryStore;
use budgetbot_core::domain::result::{Error, Result};
use budgetbot_core::ports::{ChatTransport, InboundMessage, LedgerStore, Reply, Sender};
use budgetbot_core::services::{
    messages, BotService, BotStats, CommandProcessor, EntryPoint, LoggingService, ProcessorSettings,
};
use budgetbot_core::{Ledger, Record, User};

// ============================================================================
// Test Helpers
// ============================================================================

enum Step {
    Batch(Vec<InboundMessage>),
    Fail,
}

#[derive(Default)]
struct ScriptedTransport {
    steps: VecDeque<Step>,
    sent: Vec<(String, Reply)>,
    fail_sends: bool,
}

impl ScriptedTransport {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            ..Default::default()
        }
    }
}

impl ChatTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    fn poll(&mut self) -> Result<Option<Vec<InboundMessage>>> {
        match self.steps.pop_front() {
            Some(Step::Batch(batch)) => Ok(Some(batch)),
            Some(Step::Fail) => Err(Error::transport("connection reset")),
            None => Ok(None),
        }
    }

    fn send(&mut self, chat_id: &str, reply: &Reply) -> Result<()> {
        if self.fail_sends {
            return Err(Error::transport("chat not found"));
        }
        self.sent.push((chat_id.to_string(), reply.clone()));
        Ok(())
    }
}

/// Reads work, every write fails
struct ReadOnlyStore;

impl LedgerStore for ReadOnlyStore {
    fn name(&self) -> &str {
        "read-only"
    }

    fn load(&self) -> Result<Ledger> {
        Ok(Ledger::new())
    }

    fn save(&self, _ledger: &Ledger) -> Result<()> {
        Err(Error::storage("disk full"))
    }

    fn append(&self, _owner: &User, _record: Record) -> Result<()> {
        Err(Error::storage("disk full"))
    }

    fn register(&self, _user: User) -> Result<bool> {
        Err(Error::storage("disk full"))
    }
}

fn message(chat_id: &str, sender_id: &str, text: &str) -> InboundMessage {
    InboundMessage {
        chat_id: chat_id.to_string(),
        sender: Sender::new(sender_id, "Аня"),
        text: text.to_string(),
    }
}

fn bot_over(store: Arc<dyn LedgerStore>) -> BotService {
    let processor = Arc::new(CommandProcessor::new(store, ProcessorSettings::default()));
    BotService::new(processor).with_backoff(Duration::from_millis(1), Duration::from_millis(5))
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_replies_in_order_and_stops_when_closed() {
    let store = Arc::new(MemoryStore::new());
    let bot = bot_over(store.clone());
    let mut transport = ScriptedTransport::new(vec![
        Step::Batch(vec![message("c1", "1", "/start"), message("c1", "1", "/add 500 еда")]),
        Step::Batch(vec![]),
        Step::Batch(vec![message("c2", "1", "/export")]),
    ]);

    let stats = bot.run(&mut transport).unwrap();
    assert_eq!(stats, BotStats { handled: 3, ..Default::default() });

    assert_eq!(transport.sent.len(), 3);
    assert_eq!(transport.sent[0].0, "c1");
    assert!(transport.sent[1].1.text.starts_with("Добавлен расход: 500"));
    assert_eq!(transport.sent[2].0, "c2");
    let attachment = transport.sent[2].1.attachment.as_ref().unwrap();
    assert_eq!(attachment.file_name, "export_1.csv");

    assert_eq!(store.load().unwrap().records.len(), 1);
}

#[test]
fn test_poll_failures_back_off_and_continue() {
    let bot = bot_over(Arc::new(MemoryStore::new()));
    let mut transport = ScriptedTransport::new(vec![
        Step::Fail,
        Step::Fail,
        Step::Batch(vec![message("c1", "1", "привет")]),
    ]);

    let stats = bot.run(&mut transport).unwrap();
    assert_eq!(stats.poll_errors, 2);
    assert_eq!(stats.handled, 1);
    assert_eq!(transport.sent[0].1.text, messages::not_understood());
}

#[test]
fn test_storage_failure_sends_no_reply() {
    let bot = bot_over(Arc::new(ReadOnlyStore));
    let mut transport = ScriptedTransport::new(vec![Step::Batch(vec![
        message("c1", "1", "/add 500 еда"),
        message("c1", "1", "/help"),
    ])]);

    let stats = bot.run(&mut transport).unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.handled, 1);

    // Only the help reply went out
    assert_eq!(transport.sent.len(), 1);
    assert!(transport.sent[0].1.text.contains("/add"));
}

#[test]
fn test_send_failure_does_not_stop_the_loop() {
    let bot = bot_over(Arc::new(MemoryStore::new()));
    let mut transport = ScriptedTransport::new(vec![
        Step::Batch(vec![message("c1", "1", "/add 1 еда")]),
        Step::Batch(vec![message("c1", "1", "/add 2 еда")]),
    ]);
    transport.fail_sends = true;

    let stats = bot.run(&mut transport).unwrap();
    assert_eq!(stats.handled, 2);
    assert_eq!(stats.send_errors, 2);
}

#[test]
fn test_events_are_logged_without_user_data() {
    let temp_dir = TempDir::new().unwrap();
    let logger = Arc::new(LoggingService::new(temp_dir.path(), EntryPoint::Bot, "0.1.0").unwrap());
    let bot = bot_over(Arc::new(MemoryStore::new())).with_logger(Arc::clone(&logger));
    let mut transport = ScriptedTransport::new(vec![Step::Batch(vec![
        message("c1", "4242", "/add 777 секретная категория"),
        message("c1", "4242", "/stat"),
    ])]);

    bot.run(&mut transport).unwrap();

    let entries = logger.get_recent(100).unwrap();
    let events: Vec<&str> = entries.iter().map(|e| e.event.as_str()).collect();
    assert!(events.contains(&"bot_started"));
    assert!(events.contains(&"bot_stopped"));

    let commands: Vec<&str> = entries.iter().filter_map(|e| e.command.as_deref()).collect();
    assert!(commands.contains(&"add_expense"));
    assert!(commands.contains(&"month_stat"));

    for entry in &entries {
        let fields = [
            Some(entry.event.as_str()),
            entry.transport.as_deref(),
            entry.command.as_deref(),
            entry.error_message.as_deref(),
            entry.error_details.as_deref(),
        ];
        for field in fields.into_iter().flatten() {
            assert!(!field.contains("777"));
            assert!(!field.contains("секретная"));
            assert!(!field.contains("4242"));
        }
    }
}
