//! Command processor - turns one inbound message into one reply
//!
//! Every command is an entry in a single handler table that names its
//! aliases, whether it needs a registered sender, and the action to run.
//! All state lives in the ledger store; the processor itself keeps none
//! between requests.

use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;

use crate::config::Config;
use crate::domain::{EntryKind, Record, User, YearMonth};
use crate::ports::{LedgerStore, Reply, Sender};

use super::export::ExportService;
use super::input::{quick_entry_args, Command, EntryError, EntryInput};
use super::messages;
use super::report::ReportService;

/// What a handler does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Start,
    Register,
    AddExpense,
    AddIncome,
    MonthStat,
    MyReport,
    FamilyReport,
    Stats,
    Export,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Start => "start",
            CommandKind::Register => "register",
            CommandKind::AddExpense => "add_expense",
            CommandKind::AddIncome => "add_income",
            CommandKind::MonthStat => "month_stat",
            CommandKind::MyReport => "my_report",
            CommandKind::FamilyReport => "family_report",
            CommandKind::Stats => "stats",
            CommandKind::Export => "export",
        }
    }

    /// Look up a command by any of its names
    pub fn from_name(name: &str) -> Option<Self> {
        HANDLERS
            .iter()
            .find(|h| h.names.contains(&name))
            .map(|h| h.kind)
    }

    /// Whether the registration gate applies to this command
    pub fn is_gated(&self) -> bool {
        HANDLERS.iter().any(|h| h.kind == *self && h.gated)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Action = fn(&CommandProcessor, &Sender, &[String]) -> Result<Reply>;

struct Handler {
    kind: CommandKind,
    names: &'static [&'static str],
    gated: bool,
    run: Action,
}

static HANDLERS: &[Handler] = &[
    Handler {
        kind: CommandKind::Start,
        names: &["start", "help"],
        gated: false,
        run: CommandProcessor::start,
    },
    Handler {
        kind: CommandKind::Register,
        names: &["register"],
        gated: false,
        run: CommandProcessor::register,
    },
    Handler {
        kind: CommandKind::AddExpense,
        names: &["add", "expense"],
        gated: true,
        run: CommandProcessor::add_expense,
    },
    Handler {
        kind: CommandKind::AddIncome,
        names: &["income"],
        gated: true,
        run: CommandProcessor::add_income,
    },
    Handler {
        kind: CommandKind::MonthStat,
        names: &["stat"],
        gated: true,
        run: CommandProcessor::month_stat,
    },
    Handler {
        kind: CommandKind::MyReport,
        names: &["my_report", "report"],
        gated: true,
        run: CommandProcessor::my_report,
    },
    Handler {
        kind: CommandKind::FamilyReport,
        names: &["family_report", "family"],
        gated: true,
        run: CommandProcessor::family_report,
    },
    Handler {
        kind: CommandKind::Stats,
        names: &["stats"],
        gated: true,
        run: CommandProcessor::stats,
    },
    Handler {
        kind: CommandKind::Export,
        names: &["export"],
        gated: true,
        run: CommandProcessor::export,
    },
];

fn handler_for_kind(kind: CommandKind) -> Result<&'static Handler> {
    HANDLERS
        .iter()
        .find(|h| h.kind == kind)
        .ok_or_else(|| anyhow!("No handler registered for {}", kind))
}

/// Processor settings taken from the bot configuration
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub require_registration: bool,
    pub categories: Option<Vec<String>>,
    pub currency: String,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ProcessorSettings {
    fn from(config: &Config) -> Self {
        Self {
            require_registration: config.require_registration,
            categories: config.categories.clone(),
            currency: config.currency.clone(),
        }
    }
}

/// Result of handling one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handled {
    /// The command that ran, None for text nobody understood
    pub kind: Option<CommandKind>,
    pub reply: Reply,
}

fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub struct CommandProcessor {
    store: Arc<dyn LedgerStore>,
    reports: ReportService,
    exports: ExportService,
    settings: ProcessorSettings,
    today: fn() -> NaiveDate,
}

impl CommandProcessor {
    pub fn new(store: Arc<dyn LedgerStore>, settings: ProcessorSettings) -> Self {
        Self {
            reports: ReportService::new(store.clone()),
            exports: ExportService::new(store.clone()),
            store,
            settings,
            today: local_today,
        }
    }

    /// Replace the clock used to date new records and pick the current month
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Handle one message from `sender`.
    ///
    /// Input mistakes and missing data come back as friendly replies; only
    /// storage failures are errors.
    pub fn handle(&self, sender: &Sender, text: &str) -> Result<Handled> {
        let (kind, args) = match Command::parse(text) {
            Command::Named { name, args } => match CommandKind::from_name(&name) {
                Some(kind) => (kind, args),
                None => return Ok(Self::not_understood()),
            },
            Command::Text(text) => match quick_entry_args(&text) {
                Some(args) => (CommandKind::AddExpense, args),
                None => return Ok(Self::not_understood()),
            },
        };

        if kind.is_gated() && self.settings.require_registration && !self.is_registered(sender)? {
            return Ok(Handled {
                kind: Some(kind),
                reply: Reply::text(messages::please_register()),
            });
        }

        let reply = (handler_for_kind(kind)?.run)(self, sender, &args)?;
        Ok(Handled {
            kind: Some(kind),
            reply,
        })
    }

    fn not_understood() -> Handled {
        Handled {
            kind: None,
            reply: Reply::text(messages::not_understood()),
        }
    }

    fn is_registered(&self, sender: &Sender) -> Result<bool> {
        let user = self
            .store
            .user(&sender.id)
            .context("Failed to look up sender registration")?;
        Ok(user.is_some())
    }

    fn start(&self, _sender: &Sender, _args: &[String]) -> Result<Reply> {
        Ok(Reply::text(messages::welcome(self.settings.require_registration)))
    }

    fn register(&self, sender: &Sender, _args: &[String]) -> Result<Reply> {
        let user = User::new(sender.id.clone(), sender.display_name.clone());
        let created = self.store.register(user).context("Failed to register user")?;

        Ok(Reply::text(if created {
            messages::registered(&sender.display_name)
        } else {
            messages::already_registered()
        }))
    }

    fn add_expense(&self, sender: &Sender, args: &[String]) -> Result<Reply> {
        self.add_entry(EntryKind::Expense, sender, args)
    }

    fn add_income(&self, sender: &Sender, args: &[String]) -> Result<Reply> {
        self.add_entry(EntryKind::Income, sender, args)
    }

    fn add_entry(&self, kind: EntryKind, sender: &Sender, args: &[String]) -> Result<Reply> {
        let categories = self.settings.categories.as_deref();
        let entry = match EntryInput::parse(args, categories) {
            Ok(entry) => entry,
            Err(EntryError::Format) => return Ok(Reply::text(messages::entry_format(kind))),
            Err(EntryError::UnknownCategory { category }) => {
                let allowed = categories.unwrap_or_default();
                return Ok(Reply::text(messages::unknown_category(&category, allowed)));
            }
        };

        let owner = User::new(sender.id.clone(), sender.display_name.clone());
        let record = Record::new(
            sender.id.clone(),
            kind,
            entry.amount,
            entry.category.clone(),
            (self.today)(),
        );
        self.store.append(&owner, record).context("Failed to append record")?;

        Ok(Reply::text(messages::entry_added(
            kind,
            entry.amount,
            &entry.category,
            &self.settings.currency,
        )))
    }

    fn month_stat(&self, sender: &Sender, _args: &[String]) -> Result<Reply> {
        let month = YearMonth::of((self.today)());
        Ok(Reply::text(match self.reports.monthly_summary(&sender.id, month)? {
            Some(summary) => messages::monthly_summary(&summary, &self.settings.currency),
            None => messages::no_records(),
        }))
    }

    fn my_report(&self, sender: &Sender, _args: &[String]) -> Result<Reply> {
        Ok(Reply::text(match self.reports.owner_report(&sender.id)? {
            Some(report) => messages::owner_report(&report, &self.settings.currency),
            None => messages::no_records(),
        }))
    }

    fn family_report(&self, _sender: &Sender, _args: &[String]) -> Result<Reply> {
        let totals = self.reports.family_report()?;
        Ok(Reply::text(if totals.is_empty() {
            messages::no_family_records()
        } else {
            messages::family_report(&totals, &self.settings.currency)
        }))
    }

    fn stats(&self, _sender: &Sender, _args: &[String]) -> Result<Reply> {
        Ok(Reply::text(match self.reports.ledger_stats()? {
            Some(stats) => messages::ledger_stats(&stats, &self.settings.currency),
            None => messages::no_family_records(),
        }))
    }

    fn export(&self, sender: &Sender, _args: &[String]) -> Result<Reply> {
        Ok(match self.exports.export_owner(&sender.id, None)? {
            Some(export) => Reply::text(messages::export_caption(export.record_count))
                .with_attachment(export.attachment),
            None => Reply::text(messages::no_export_data()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::domain::RecordFilter;
    use rust_decimal::Decimal;

    fn fixed_today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn processor(settings: ProcessorSettings) -> (CommandProcessor, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let processor = CommandProcessor::new(store.clone(), settings).with_clock(fixed_today);
        (processor, store)
    }

    fn gated() -> ProcessorSettings {
        ProcessorSettings {
            require_registration: true,
            categories: Some(vec!["еда".to_string(), "транспорт".to_string()]),
            currency: "₽".to_string(),
        }
    }

    fn ann() -> Sender {
        Sender::new("1", "Аня")
    }

    fn text(processor: &CommandProcessor, sender: &Sender, message: &str) -> String {
        processor.handle(sender, message).unwrap().reply.text
    }

    #[test]
    fn test_every_alias_resolves() {
        for handler in HANDLERS {
            for name in handler.names {
                assert_eq!(CommandKind::from_name(name), Some(handler.kind));
            }
        }
        assert_eq!(CommandKind::from_name("delete"), None);
        assert!(!CommandKind::Register.is_gated());
        assert!(CommandKind::Export.is_gated());
    }

    #[test]
    fn test_add_expense_dated_today() {
        let (processor, store) = processor(ProcessorSettings::default());

        let handled = processor.handle(&ann(), "/add 500 Еда").unwrap();
        assert_eq!(handled.kind, Some(CommandKind::AddExpense));
        assert_eq!(handled.reply.text, "Добавлен расход: 500 ₽ — еда");

        let records = store.query(&RecordFilter::all()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, fixed_today());
        assert_eq!(records[0].owner_id, "1");
        // Gate off: the owner is admitted with the first record
        assert_eq!(store.user("1").unwrap().unwrap().display_name, "Аня");
    }

    #[test]
    fn test_total_is_exact_regardless_of_order() {
        let amounts = ["0.10", "0.20", "1234.56", "99,99", "7"];
        let expected = Decimal::new(134285, 2);

        let mut reversed = amounts;
        reversed.reverse();
        for order in [amounts, reversed] {
            let (processor, store) = processor(ProcessorSettings::default());
            for amount in order {
                processor.handle(&ann(), &format!("/add {} еда", amount)).unwrap();
            }
            let total: Decimal = store
                .query(&RecordFilter::all().owner("1"))
                .unwrap()
                .iter()
                .map(|r| r.amount)
                .sum();
            assert_eq!(total, expected);
            assert!(text(&processor, &ann(), "/report").contains("Всего расходов: 1342.85 ₽"));
        }
    }

    #[test]
    fn test_register_twice() {
        let (processor, store) = processor(gated());

        assert_eq!(text(&processor, &ann(), "/register"), "Готово, Аня! Ты в семейном бюджете ✅");
        assert_eq!(text(&processor, &ann(), "/register"), messages::already_registered());
        assert_eq!(store.users().unwrap().len(), 1);
    }

    #[test]
    fn test_gate_blocks_unregistered_sender() {
        let (processor, store) = processor(gated());

        let handled = processor.handle(&ann(), "/add 500 еда").unwrap();
        assert_eq!(handled.reply.text, messages::please_register());
        assert!(store.load().unwrap().records.is_empty());

        // Ungated commands still work
        assert!(text(&processor, &ann(), "/start").contains("/register"));

        processor.handle(&ann(), "/register").unwrap();
        processor.handle(&ann(), "/add 500 еда").unwrap();
        assert_eq!(store.load().unwrap().records.len(), 1);
    }

    #[test]
    fn test_bad_amount_leaves_store_unchanged() {
        let (processor, store) = processor(ProcessorSettings::default());

        assert_eq!(text(&processor, &ann(), "/add пятьсот еда"), "Формат: /add 500 еда");
        assert_eq!(text(&processor, &ann(), "/income"), "Формат: /income 1000 зарплата");
        assert_eq!(text(&processor, &ann(), "/add -5 еда"), "Формат: /add 500 еда");
        assert_eq!(store.load().unwrap(), crate::domain::Ledger::new());
    }

    #[test]
    fn test_amount_above_limit_is_rejected() {
        let (processor, store) = processor(ProcessorSettings::default());

        let reply = text(&processor, &ann(), "/add 79228162514264337593543950335 еда");
        assert_eq!(reply, "Формат: /add 500 еда");
        assert_eq!(text(&processor, &ann(), "1000000000001 еда"), "Формат: /add 500 еда");
        assert!(store.load().unwrap().records.is_empty());

        processor.handle(&ann(), "/add 1000000000000 еда").unwrap();
        assert_eq!(store.load().unwrap().records.len(), 1);
    }

    #[test]
    fn test_overflowing_totals_fail_the_request() {
        let (processor, store) = processor(ProcessorSettings::default());
        let owner = User::new("1", "Аня");
        for _ in 0..2 {
            let record = Record::new("1", EntryKind::Expense, Decimal::MAX, "еда", fixed_today());
            store.append(&owner, record).unwrap();
        }

        for command in ["/stat", "/report", "/family", "/stats"] {
            assert!(processor.handle(&ann(), command).is_err(), "{} should fail", command);
        }
        assert!(processor.handle(&Sender::new("2", "Боря"), "/family").is_err());

        // The ledger stays intact and other owners keep working
        assert_eq!(store.load().unwrap().records.len(), 2);
        assert_eq!(text(&processor, &Sender::new("2", "Боря"), "/stat"), messages::no_records());
    }

    #[test]
    fn test_unknown_category_leaves_store_unchanged() {
        let (processor, store) = processor(gated());
        processor.handle(&ann(), "/register").unwrap();
        let before = store.load().unwrap();

        let reply = text(&processor, &ann(), "/add 100 казино");
        assert!(reply.contains("казино"));
        assert!(reply.contains("еда, транспорт"));
        assert_eq!(store.load().unwrap(), before);
    }

    #[test]
    fn test_quick_entry_is_an_expense() {
        let (processor, store) = processor(ProcessorSettings::default());

        let handled = processor.handle(&ann(), "250,5 Кофе").unwrap();
        assert_eq!(handled.kind, Some(CommandKind::AddExpense));

        let records = store.load().unwrap().records;
        assert_eq!(records[0].amount, Decimal::new(2505, 1));
        assert_eq!(records[0].category, "кофе");
        assert!(records[0].is_expense());
    }

    #[test]
    fn test_not_understood() {
        let (processor, _) = processor(ProcessorSettings::default());

        for message in ["привет", "/delete 5", "еда 500"] {
            let handled = processor.handle(&ann(), message).unwrap();
            assert_eq!(handled.kind, None);
            assert_eq!(handled.reply.text, messages::not_understood());
        }
    }

    #[test]
    fn test_month_stat_and_reports() {
        let (processor, _) = processor(ProcessorSettings::default());
        assert_eq!(text(&processor, &ann(), "/stat"), messages::no_records());
        assert_eq!(text(&processor, &ann(), "/family"), messages::no_family_records());
        assert_eq!(text(&processor, &ann(), "/stats"), messages::no_family_records());

        processor.handle(&ann(), "/add 300 еда").unwrap();
        processor.handle(&ann(), "/income 1000 зарплата").unwrap();
        processor.handle(&Sender::new("2", "Боря"), "/expense 200 еда").unwrap();

        let stat = text(&processor, &ann(), "/stat");
        assert!(stat.contains("03.2024"));
        assert!(stat.contains("Баланс: 700 ₽"));

        assert!(text(&processor, &ann(), "/family_report").contains("• еда: 500 ₽"));
        let stats = text(&processor, &ann(), "/stats");
        assert!(stats.contains("Боря: доходы 0 ₽, расходы 200 ₽"));
        assert!(stats.contains("Записей: 3"));
    }

    #[test]
    fn test_export() {
        let (processor, _) = processor(ProcessorSettings::default());

        let empty = processor.handle(&ann(), "/export").unwrap();
        assert_eq!(empty.reply.text, messages::no_export_data());
        assert!(empty.reply.attachment.is_none());

        processor.handle(&ann(), "/add 500 еда").unwrap();
        let reply = processor.handle(&ann(), "/export@family_bot").unwrap().reply;
        let attachment = reply.attachment.unwrap();
        assert_eq!(attachment.file_name, "export_1.csv");
        assert_eq!(
            String::from_utf8(attachment.bytes).unwrap(),
            "kind,amount,category,date\nexpense,500,еда,2024-03-15\n"
        );
    }
}
