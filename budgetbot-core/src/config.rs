//! Configuration management
//!
//! Bot settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "bot": {
//!     "requireRegistration": false,
//!     "categories": ["еда", "транспорт"],
//!     "currency": "₽",
//!     "storage": "json",
//!     "dataFile": "data.json"
//!   }
//! }
//! ```
//! Keys this crate doesn't manage are preserved when saving.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Default ledger document name
pub const DEFAULT_DATA_FILE: &str = "data.json";

/// DuckDB ledger file name
pub const DUCKDB_FILE: &str = "ledger.duckdb";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    bot: BotSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BotSettings {
    #[serde(default)]
    require_registration: bool,
    #[serde(default)]
    categories: Option<Vec<String>>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    storage: Option<StorageBackend>,
    #[serde(default)]
    data_file: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Where the ledger is persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Single JSON document
    #[default]
    Json,
    /// DuckDB database file
    DuckDb,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(StorageBackend::Json),
            "duckdb" => Ok(StorageBackend::DuckDb),
            other => anyhow::bail!("Unknown storage backend '{}' (expected json or duckdb)", other),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Json => f.write_str("json"),
            StorageBackend::DuckDb => f.write_str("duckdb"),
        }
    }
}

/// Bot configuration (simplified view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    /// Block ledger commands until the sender ran /register
    pub require_registration: bool,
    /// Fixed category set; None accepts any category text
    pub categories: Option<Vec<String>>,
    pub currency: String,
    pub storage: StorageBackend,
    pub data_file: String,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_raw(SettingsFile::default())
    }
}

/// Parse a boolean-ish environment value
fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "true" | "1" | "yes" | "TRUE" | "YES" | "on" => Some(true),
        "false" | "0" | "no" | "FALSE" | "NO" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    fn from_raw(raw: SettingsFile) -> Self {
        Self {
            require_registration: raw.bot.require_registration,
            categories: raw
                .bot
                .categories
                .clone()
                .map(|c| normalize_categories(&c))
                .filter(|c| !c.is_empty()),
            currency: raw.bot.currency.clone().unwrap_or_else(|| "₽".to_string()),
            storage: raw.bot.storage.unwrap_or_default(),
            data_file: raw
                .bot
                .data_file
                .clone()
                .unwrap_or_else(|| DEFAULT_DATA_FILE.to_string()),
            _raw_settings: raw,
        }
    }

    /// Load config from the data directory
    ///
    /// The registration gate and storage backend can be overridden with
    /// BUDGETBOT_REQUIRE_REGISTRATION and BUDGETBOT_STORAGE.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let mut config = Self::load_file(data_dir)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load config from settings.json only, without environment overrides
    pub fn load_file(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        Ok(Self::from_raw(raw))
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(flag) = lookup("BUDGETBOT_REQUIRE_REGISTRATION")
            .as_deref()
            .and_then(parse_flag)
        {
            self.require_registration = flag;
        }
        if let Some(storage) = lookup("BUDGETBOT_STORAGE") {
            self.storage = storage.parse()?;
        }
        Ok(())
    }

    /// Save config to the data directory, preserving unmanaged settings
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join("settings.json");

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        settings.bot.require_registration = self.require_registration;
        settings.bot.categories = self.categories.clone();
        settings.bot.currency = Some(self.currency.clone());
        settings.bot.storage = Some(self.storage);
        settings.bot.data_file = Some(self.data_file.clone());

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// Replace the fixed category set. An empty list accepts any category.
    pub fn set_categories(&mut self, categories: &[String]) {
        let normalized = normalize_categories(categories);
        self.categories = if normalized.is_empty() {
            None
        } else {
            Some(normalized)
        };
    }
}

/// Trim, lowercase and dedupe category names, keeping first-seen order
fn normalize_categories(categories: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    categories
        .iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .collect()
}
