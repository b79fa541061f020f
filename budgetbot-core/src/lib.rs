//! Budgetbot Core - ledger and command processing for a family budget chat bot
//!
//! This crate implements the core logic following hexagonal architecture:
//!
//! - **domain**: Core entities (Record, User, Ledger)
//! - **ports**: Trait definitions for external dependencies (LedgerStore, ChatTransport)
//! - **services**: Command processing, reports, export, the bot loop
//! - **adapters**: Concrete implementations (JSON file, DuckDB, Telegram)

pub mod domain;
pub mod ports;
pub mod services;
pub mod adapters;
pub mod config;
pub mod migrations;
pub mod log_migrations;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::duckdb::DuckDbStore;
use adapters::json_file::JsonFileStore;
use config::{Config, StorageBackend, DUCKDB_FILE};
use ports::LedgerStore;
use services::*;

// Re-export commonly used types at crate root
pub use domain::{EntryKind, Ledger, Record, RecordFilter, User, YearMonth};
pub use domain::result::{Error, Result as StoreResult};
pub use ports::{Attachment, ChatTransport, InboundMessage, Reply, Sender};

/// Main context for budget bot operations
///
/// Holds the configuration, the ledger store and the services built on it.
pub struct BudgetContext {
    pub config: Config,
    pub store: Arc<dyn LedgerStore>,
    pub processor: Arc<CommandProcessor>,
    pub report_service: ReportService,
    pub export_service: ExportService,
}

impl BudgetContext {
    /// Load settings from `data_dir` and open the configured store
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;
        let store = open_store(data_dir, &config)?;
        Ok(Self::with_store(config, store))
    }

    /// Build the services over an already opened store
    pub fn with_store(config: Config, store: Arc<dyn LedgerStore>) -> Self {
        let processor = Arc::new(CommandProcessor::new(
            Arc::clone(&store),
            ProcessorSettings::from(&config),
        ));
        let report_service = ReportService::new(Arc::clone(&store));
        let export_service = ExportService::new(Arc::clone(&store));

        Self {
            config,
            store,
            processor,
            report_service,
            export_service,
        }
    }
}

/// Open the ledger store selected by `config.storage`
pub fn open_store(data_dir: &Path, config: &Config) -> Result<Arc<dyn LedgerStore>> {
    Ok(match config.storage {
        StorageBackend::Json => {
            let path = data_dir.join(&config.data_file);
            Arc::new(
                JsonFileStore::open(&path)
                    .with_context(|| format!("Failed to open ledger {}", path.display()))?,
            )
        }
        StorageBackend::DuckDb => {
            let path = data_dir.join(DUCKDB_FILE);
            Arc::new(
                DuckDbStore::open(&path)
                    .with_context(|| format!("Failed to open ledger database {}", path.display()))?,
            )
        }
    })
}
