//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod bot;
pub mod command;
mod export;
pub mod input;
pub mod logging;
pub mod messages;
pub mod migration;
mod report;

pub use bot::{BotService, BotStats};
pub use command::{CommandKind, CommandProcessor, Handled, ProcessorSettings};
pub use export::{render_csv, Export, ExportService, EXPORT_HEADER};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use report::{
    CategoryTotal, DateRange, LedgerStats, LedgerStatus, MemberTotals, MonthlySummary, OwnerReport,
    ReportService,
};
