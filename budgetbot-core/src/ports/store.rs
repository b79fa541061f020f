//! Ledger store port - persistence abstraction

use crate::domain::result::Result;
use crate::domain::{Ledger, Record, RecordFilter, User};

/// Ledger store abstraction
///
/// Implementations own the persisted ledger and serialize access to it:
/// every mutating call is one read-modify-write under the store's
/// single-writer lock (or inside one database transaction).
pub trait LedgerStore: Send + Sync {
    /// Backend name (e.g., "json", "duckdb", "memory")
    fn name(&self) -> &str;

    /// Load the whole ledger. Nothing persisted yet yields an empty ledger.
    fn load(&self) -> Result<Ledger>;

    /// Replace the whole ledger
    fn save(&self, ledger: &Ledger) -> Result<()>;

    /// Append a record, admitting `owner` if the ledger doesn't know it yet
    fn append(&self, owner: &User, record: Record) -> Result<()>;

    /// Register a user. Returns false if the id was already registered.
    fn register(&self, user: User) -> Result<bool>;

    /// Records matching the filter, in insertion order
    fn query(&self, filter: &RecordFilter) -> Result<Vec<Record>> {
        let ledger = self.load()?;
        Ok(ledger.query(filter).cloned().collect())
    }

    /// Look up a registered user
    fn user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.load()?.users.remove(id))
    }

    /// All registered users, ordered by id
    fn users(&self) -> Result<Vec<User>> {
        Ok(self.load()?.users.into_values().collect())
    }
}
