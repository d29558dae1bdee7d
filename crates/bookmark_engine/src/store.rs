//! Durable record store backed by redb.
//!
//! Records are keyed by normalized URL and stored as JSON. Every insert runs
//! its existence check and write inside one write transaction, so a key can
//! never be overwritten.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use bookmark_core::UrlRecord;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use thiserror::Error;

const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("url_records");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a record for {url} already exists")]
    Duplicate { url: String },

    #[error("failed to open record store at {path:?}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("storage engine error: {0}")]
    Backend(#[from] redb::Error),

    #[error("record encoding error: {0}")]
    Codec(#[from] serde_json::Error),
}

pub trait RecordStore: Send + Sync {
    fn exists(&self, url: &str) -> Result<bool, StoreError>;

    fn get(&self, url: &str) -> Result<Option<UrlRecord>, StoreError>;

    /// Snapshot of every stored URL.
    fn get_all_urls(&self) -> Result<HashSet<String>, StoreError>;

    /// Every record, ordered by URL.
    fn all_records(&self) -> Result<Vec<UrlRecord>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] if the URL is already stored.
    fn insert(&self, record: &UrlRecord) -> Result<(), StoreError>;
}

pub struct RedbRecordStore {
    db: Database,
    path: PathBuf,
}

impl RedbRecordStore {
    /// Open or create the database file, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let open_error = |message: String| StoreError::Open {
            path: path.to_path_buf(),
            message,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| open_error(e.to_string()))?;
        }
        let db = Database::create(path).map_err(|e| open_error(e.to_string()))?;

        // Make sure the table exists so read transactions can open it.
        let txn = db.begin_write().map_err(redb::Error::from)?;
        txn.open_table(RECORDS).map_err(redb::Error::from)?;
        txn.commit().map_err(redb::Error::from)?;

        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// Open a store that must already exist. Never creates a file.
    pub fn open_existing(path: &Path) -> Result<Self, StoreError> {
        if !path.is_file() {
            return Err(StoreError::Open {
                path: path.to_path_buf(),
                message: "no record store at this path".to_string(),
            });
        }
        let db = Database::open(path).map_err(|e| StoreError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> Result<u64, StoreError> {
        let txn = self.db.begin_read().map_err(redb::Error::from)?;
        let table = txn.open_table(RECORDS).map_err(redb::Error::from)?;
        Ok(table.len().map_err(redb::Error::from)?)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        self.len().map(|len| len == 0)
    }
}

impl RecordStore for RedbRecordStore {
    fn exists(&self, url: &str) -> Result<bool, StoreError> {
        let txn = self.db.begin_read().map_err(redb::Error::from)?;
        let table = txn.open_table(RECORDS).map_err(redb::Error::from)?;
        let found = table.get(url).map_err(redb::Error::from)?.is_some();
        Ok(found)
    }

    fn get(&self, url: &str) -> Result<Option<UrlRecord>, StoreError> {
        let txn = self.db.begin_read().map_err(redb::Error::from)?;
        let table = txn.open_table(RECORDS).map_err(redb::Error::from)?;
        let Some(guard) = table.get(url).map_err(redb::Error::from)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(guard.value())?))
    }

    fn get_all_urls(&self) -> Result<HashSet<String>, StoreError> {
        let txn = self.db.begin_read().map_err(redb::Error::from)?;
        let table = txn.open_table(RECORDS).map_err(redb::Error::from)?;
        let mut urls = HashSet::new();
        for entry in table.iter().map_err(redb::Error::from)? {
            let (key, _) = entry.map_err(redb::Error::from)?;
            urls.insert(key.value().to_string());
        }
        Ok(urls)
    }

    fn all_records(&self) -> Result<Vec<UrlRecord>, StoreError> {
        let txn = self.db.begin_read().map_err(redb::Error::from)?;
        let table = txn.open_table(RECORDS).map_err(redb::Error::from)?;
        let mut records = Vec::new();
        for entry in table.iter().map_err(redb::Error::from)? {
            let (_, value) = entry.map_err(redb::Error::from)?;
            records.push(serde_json::from_slice(value.value())?);
        }
        Ok(records)
    }

    fn insert(&self, record: &UrlRecord) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(record)?;
        let txn = self.db.begin_write().map_err(redb::Error::from)?;
        let inserted = {
            let mut table = txn.open_table(RECORDS).map_err(redb::Error::from)?;
            let taken = table
                .get(record.url.as_str())
                .map_err(redb::Error::from)?
                .is_some();
            if !taken {
                table
                    .insert(record.url.as_str(), payload.as_slice())
                    .map_err(redb::Error::from)?;
            }
            !taken
        };

        if !inserted {
            txn.abort().map_err(redb::Error::from)?;
            return Err(StoreError::Duplicate {
                url: record.url.clone(),
            });
        }
        txn.commit().map_err(redb::Error::from)?;
        Ok(())
    }
}

impl std::fmt::Debug for RedbRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbRecordStore")
            .field("path", &self.path)
            .finish()
    }
}
