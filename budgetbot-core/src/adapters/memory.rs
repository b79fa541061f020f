//! In-memory ledger store

use std::sync::{Mutex, MutexGuard};

use crate::domain::result::{Error, Result};
use crate::domain::{Ledger, Record, RecordFilter, User};
use crate::ports::LedgerStore;

/// Ledger held in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: Mutex<Ledger>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ledger(ledger: Ledger) -> Self {
        Self {
            ledger: Mutex::new(ledger),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger>> {
        self.ledger
            .lock()
            .map_err(|e| Error::storage(format!("Lock poisoned: {}", e)))
    }
}

impl LedgerStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn load(&self) -> Result<Ledger> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, ledger: &Ledger) -> Result<()> {
        *self.lock()? = ledger.clone();
        Ok(())
    }

    fn append(&self, owner: &User, record: Record) -> Result<()> {
        self.lock()?.append(owner, record);
        Ok(())
    }

    fn register(&self, user: User) -> Result<bool> {
        Ok(self.lock()?.register(user))
    }

    fn query(&self, filter: &RecordFilter) -> Result<Vec<Record>> {
        Ok(self.lock()?.query(filter).cloned().collect())
    }

    fn user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.lock()?.user(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntryKind;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    #[test]
    fn test_memory_store_append_and_query() {
        let store = MemoryStore::new();
        let owner = User::new("5", "Дима");
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        store
            .append(&owner, Record::new("5", EntryKind::Expense, Decimal::new(300, 0), "кафе", date))
            .unwrap();

        let records = store.query(&RecordFilter::all().owner("5")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(store.user("5").unwrap(), Some(owner));
        assert!(!store.register(User::new("5", "Дима")).unwrap());
    }
}
