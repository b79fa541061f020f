//! JSON document store
//!
//! The whole ledger lives in one JSON file. Every operation is a full
//! read or a full read-modify-write of that file, serialized by an
//! in-process mutex plus an advisory lock on a sibling `.lock` file so
//! that separate store instances (or processes) sharing the document
//! don't drop each other's writes.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use fs2::FileExt;
use tempfile::NamedTempFile;

use crate::domain::result::{Error, Result};
use crate::domain::{Ledger, Record, User};
use crate::ports::LedgerStore;

/// Ledger store backed by a single JSON document
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
    writer: Mutex<()>,
}

/// Held for the duration of one document operation
struct DocumentLock<'a> {
    _guard: MutexGuard<'a, ()>,
    file: File,
}

impl Drop for DocumentLock<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl JsonFileStore {
    /// Open a store at `path`. The document itself is created on first write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file_name = path
            .file_name()
            .ok_or_else(|| Error::Config(format!("Not a file path: {}", path.display())))?;

        let mut lock_name = file_name.to_os_string();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);

        fs::create_dir_all(Self::parent_dir(&path))?;

        Ok(Self {
            path,
            lock_path,
            writer: Mutex::new(()),
        })
    }

    /// Path of the JSON document
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(path: &Path) -> &Path {
        match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    fn lock(&self) -> Result<DocumentLock<'_>> {
        let guard = self
            .writer
            .lock()
            .map_err(|e| Error::storage(format!("Lock poisoned: {}", e)))?;

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        FileExt::lock_exclusive(&file)?;

        Ok(DocumentLock {
            _guard: guard,
            file,
        })
    }

    fn read_document(&self) -> Result<Ledger> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Ledger::new()),
            Err(e) => return Err(e.into()),
        };

        Ledger::from_json(&content).map_err(|e| {
            Error::storage(format!("Corrupt ledger document {}: {}", self.path.display(), e))
        })
    }

    /// Write to a temp file next to the document, then move it into place
    fn write_document(&self, ledger: &Ledger) -> Result<()> {
        let content = ledger.to_json()?;

        let mut tmp = NamedTempFile::new_in(Self::parent_dir(&self.path))?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        Ok(())
    }

    fn modify<T>(&self, f: impl FnOnce(&mut Ledger) -> T) -> Result<T> {
        let _lock = self.lock()?;
        let mut ledger = self.read_document()?;
        let out = f(&mut ledger);
        self.write_document(&ledger)?;
        Ok(out)
    }
}

impl LedgerStore for JsonFileStore {
    fn name(&self) -> &str {
        "json"
    }

    fn load(&self) -> Result<Ledger> {
        let _lock = self.lock()?;
        self.read_document()
    }

    fn save(&self, ledger: &Ledger) -> Result<()> {
        let _lock = self.lock()?;
        self.write_document(ledger)
    }

    fn append(&self, owner: &User, record: Record) -> Result<()> {
        tracing::debug!(store = "json", "appending record");
        self.modify(|ledger| ledger.append(owner, record))
    }

    fn register(&self, user: User) -> Result<bool> {
        let _lock = self.lock()?;
        let mut ledger = self.read_document()?;
        if !ledger.register(user) {
            return Ok(false);
        }
        self.write_document(&ledger)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntryKind;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    #[test]
    fn test_missing_document_loads_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("data.json")).unwrap();

        assert_eq!(store.load().unwrap(), Ledger::new());
        assert!(!store.path().exists(), "loading must not create the document");
    }

    #[test]
    fn test_corrupt_document_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_append_persists_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");
        let store = JsonFileStore::open(&path).unwrap();
        let owner = User::new("9", "Оля");

        store
            .append(
                &owner,
                Record::new(
                    "9",
                    EntryKind::Income,
                    Decimal::new(2500, 0),
                    "подработка",
                    NaiveDate::from_ymd_opt(2024, 4, 10).unwrap(),
                ),
            )
            .unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        let ledger = reopened.load().unwrap();
        assert_eq!(ledger.records.len(), 1);
        assert!(ledger.is_registered("9"));
    }

    #[test]
    fn test_register_twice_writes_once() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("data.json")).unwrap();

        assert!(store.register(User::new("1", "Аня")).unwrap());
        let before = fs::read_to_string(store.path()).unwrap();
        assert!(!store.register(User::new("1", "Аня")).unwrap());
        let after = fs::read_to_string(store.path()).unwrap();
        assert_eq!(before, after);
    }
}
