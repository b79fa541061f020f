//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - JSON document, DuckDB and in-memory stores for the LedgerStore port
//! - Telegram Bot API client for the ChatTransport port

pub mod duckdb;
pub mod json_file;
pub mod memory;
pub mod telegram;
