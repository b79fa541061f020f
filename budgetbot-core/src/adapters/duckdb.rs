//! DuckDB ledger store
//!
//! Transactional alternative to the JSON document: every mutation runs in
//! one database transaction, so concurrent writers never drop records.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use duckdb::{params, params_from_iter, Connection};
use rust_decimal::Decimal;

use crate::domain::result::{Error, Result};
use crate::domain::{Ledger, Record, RecordFilter, User};
use crate::migrations::MIGRATIONS;
use crate::ports::LedgerStore;
use crate::services::MigrationService;

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// Raw record columns: owner_id, kind, amount, category, entry_date
type RecordRow = (String, String, String, String, String);

const SELECT_RECORDS: &str =
    "SELECT owner_id, kind, amount, category, entry_date FROM ledger_records";

/// Ledger store backed by a DuckDB database file
pub struct DuckDbStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbStore {
    /// Open (or create) the database and bring its schema up to date
    ///
    /// Retries with exponential backoff while another process holds the file.
    pub fn open(db_path: &Path) -> Result<Self> {
        let mut attempt = 0;
        let conn = loop {
            match Self::try_open_connection(db_path) {
                Ok(conn) => break conn,
                Err(e) if is_retryable_error(&e.to_string()) && attempt < MAX_RETRIES - 1 => {
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                    tracing::warn!(
                        attempt = attempt + 1,
                        max = MAX_RETRIES,
                        delay_ms = delay.as_millis() as u64,
                        "ledger database busy, retrying: {}",
                        e
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path.to_path_buf()),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// In-memory database, mainly for tests
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: None,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading stays off; nothing here needs extensions
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        MigrationService::new(&conn, MIGRATIONS)
            .run_pending()
            .map_err(|e| Error::Database(format!("Migration failed: {}", e)))?;
        Ok(())
    }

    /// Path of the database file, None for in-memory stores
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::storage(format!("Lock poisoned: {}", e)))
    }

    fn insert_record(conn: &Connection, record: &Record) -> Result<()> {
        conn.execute(
            "INSERT INTO ledger_records (owner_id, kind, amount, category, entry_date)
             VALUES (?, ?, ?, ?, ?)",
            params![
                record.owner_id,
                record.kind.as_str(),
                record.amount.to_string(),
                record.category,
                record.date.format("%Y-%m-%d").to_string(),
            ],
        )?;
        Ok(())
    }

    fn read_records(conn: &Connection, filter: &RecordFilter) -> Result<Vec<Record>> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(owner_id) = &filter.owner_id {
            clauses.push("owner_id = ?");
            values.push(owner_id.clone());
        }
        if let Some(kind) = filter.kind {
            clauses.push("kind = ?");
            values.push(kind.as_str().to_string());
        }
        if let Some(month) = filter.month {
            clauses.push("entry_date LIKE ?");
            values.push(format!("{}-%", month));
        }
        if let Some(category) = &filter.category {
            clauses.push("category = ?");
            values.push(category.clone());
        }

        let mut sql = SELECT_RECORDS.to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY record_id");

        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<RecordRow> = stmt
            .query_map(params_from_iter(values), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter().map(row_to_record).collect()
    }

    fn read_users(conn: &Connection) -> Result<Vec<User>> {
        let mut stmt =
            conn.prepare("SELECT user_id, display_name FROM ledger_users ORDER BY user_id")?;
        let users = stmt
            .query_map([], |row| Ok(User::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }
}

fn row_to_record(row: RecordRow) -> Result<Record> {
    let (owner_id, kind, amount, category, date) = row;
    Ok(Record {
        owner_id,
        kind: kind.parse()?,
        amount: amount
            .parse::<Decimal>()
            .map_err(|e| Error::storage(format!("Bad amount '{}': {}", amount, e)))?,
        category,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| Error::storage(format!("Bad date '{}': {}", date, e)))?,
    })
}

impl LedgerStore for DuckDbStore {
    fn name(&self) -> &str {
        "duckdb"
    }

    fn load(&self) -> Result<Ledger> {
        let conn = self.conn()?;
        let users = Self::read_users(&conn)?;
        let records = Self::read_records(&conn, &RecordFilter::all())?;

        Ok(Ledger {
            users: users.into_iter().map(|u| (u.id.clone(), u)).collect(),
            records,
        })
    }

    fn save(&self, ledger: &Ledger) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM ledger_records", [])?;
        tx.execute("DELETE FROM ledger_users", [])?;
        for user in ledger.users.values() {
            tx.execute(
                "INSERT INTO ledger_users (user_id, display_name) VALUES (?, ?)",
                params![user.id, user.display_name],
            )?;
        }
        for record in &ledger.records {
            Self::insert_record(&tx, record)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn append(&self, owner: &User, record: Record) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO ledger_users (user_id, display_name) VALUES (?, ?)
             ON CONFLICT (user_id) DO NOTHING",
            params![owner.id, owner.display_name],
        )?;
        Self::insert_record(&tx, &record)?;

        tx.commit()?;
        Ok(())
    }

    fn register(&self, user: User) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM ledger_users WHERE user_id = ?",
            params![user.id],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO ledger_users (user_id, display_name) VALUES (?, ?)",
            params![user.id, user.display_name],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn query(&self, filter: &RecordFilter) -> Result<Vec<Record>> {
        let conn = self.conn()?;
        Self::read_records(&conn, filter)
    }

    fn user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            "SELECT user_id, display_name FROM ledger_users WHERE user_id = ?",
            params![id],
            |row| Ok(User::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        );

        match result {
            Ok(user) => Ok(Some(user)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        Self::read_users(&conn)
    }
}
