//! Pipe-delimited cache table
//!
//! Provides the in-memory [`Cache`] keyed by ticker symbol and the
//! [`CacheStore`] that loads it from, and rewrites it to, a single text file.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::data::{normalize_symbol, or_sentinel, Record};
use crate::identifier;

/// Field delimiter; free-text company names may contain commas
pub const DELIMITER: u8 = b'|';

/// Header row of the cache file, in column order
pub const COLUMNS: [&str; 6] = ["Ticker", "CIK", "Name", "SIC", "Location", "Incorporated"];

/// Errors that can occur while loading or persisting the cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// The file exists but does not match the expected schema
    #[error("Corrupt cache file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// The file exists but could not be read
    #[error("Failed to read cache file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing the file failed; the previous content is left in place
    #[error("Failed to persist cache file {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// In-memory mapping from upper-cased symbol to record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cache {
    records: HashMap<String, Record>,
}

impl Cache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for `symbol`, compared case-insensitively
    pub fn lookup(&self, symbol: &str) -> Option<&Record> {
        self.records.get(&normalize_symbol(symbol))
    }

    /// Returns the cache with `record` replacing any record for the same symbol
    pub fn upsert(mut self, mut record: Record) -> Self {
        record.symbol = normalize_symbol(&record.symbol);
        self.records.insert(record.symbol.clone(), record);
        self
    }

    /// Number of cached symbols
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the cache holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records ordered by symbol
    pub fn records(&self) -> Vec<&Record> {
        let mut records: Vec<&Record> = self.records.values().collect();
        records.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        records
    }
}

/// Result of [`CacheStore::load`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedCache {
    /// The normalized cache contents
    pub cache: Cache,
    /// Whether a backing file was present
    pub existed: bool,
    /// Whether loading changed anything relative to the file (re-padded
    /// identifiers, blank fields, case-folded or duplicate symbols)
    pub healed: bool,
}

/// Loads and persists the cache table at a fixed location
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    /// Creates a store for the cache file named in `config`
    pub fn new(config: &Config) -> Self {
        Self::with_path(config.cache_file.clone())
    }

    /// Creates a store backed by an explicit file path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cache file into memory.
    ///
    /// A missing file yields an empty cache with `existed = false`. Every
    /// identifier is re-normalized and blank fields become the sentinel on
    /// the way in; rows that changed are flagged as `healed`.
    ///
    /// # Returns
    /// * `Ok(LoadedCache)` on success or cold start
    /// * `Err(CacheError::Corrupt)` on a header mismatch, a malformed row, or
    ///   an identifier that cannot be normalized
    /// * `Err(CacheError::Read)` on any other I/O failure
    pub fn load(&self) -> Result<LoadedCache, CacheError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            // A regular file where a parent directory should be also means
            // there is no table yet; persist reports the real problem.
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                debug!(path = %self.path.display(), "no cache file, starting empty");
                return Ok(LoadedCache {
                    cache: Cache::new(),
                    existed: false,
                    healed: false,
                });
            }
            Err(source) => {
                return Err(CacheError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let mut reader = ReaderBuilder::new().delimiter(DELIMITER).from_reader(file);

        let headers = reader.headers().map_err(|e| self.corrupt(e.to_string()))?;
        if !headers.iter().eq(COLUMNS.iter().copied()) {
            return Err(self.corrupt(format!(
                "expected columns [{}], found [{}]",
                COLUMNS.join("|"),
                headers.iter().collect::<Vec<_>>().join("|")
            )));
        }

        let mut cache = Cache::new();
        let mut healed = false;

        for row in reader.deserialize::<Record>() {
            let mut record = row.map_err(|e| self.corrupt(e.to_string()))?;

            let symbol = normalize_symbol(&record.symbol);
            if symbol != record.symbol {
                healed = true;
                record.symbol = symbol;
            }

            let canonical = identifier::normalize(&record.identifier)
                .map_err(|e| self.corrupt(format!("row {}: {}", record.symbol, e)))?;
            if canonical != record.identifier {
                healed = true;
                record.identifier = canonical;
            }

            for field in [
                &mut record.name,
                &mut record.category_code,
                &mut record.location,
                &mut record.incorporation,
            ] {
                let filled = or_sentinel(field.clone());
                if filled != *field {
                    healed = true;
                    *field = filled;
                }
            }

            if let Some(previous) = cache.records.insert(record.symbol.clone(), record) {
                warn!(symbol = %previous.symbol, "duplicate cache row, keeping the last one");
                healed = true;
            }
        }

        debug!(path = %self.path.display(), records = cache.len(), healed, "loaded cache");
        Ok(LoadedCache {
            cache,
            existed: true,
            healed,
        })
    }

    /// Rewrites the whole cache file.
    ///
    /// The table is written to a temporary file beside the target and renamed
    /// over it, so a failed write leaves the previous file intact. Parent
    /// directories are created as needed.
    pub fn persist(&self, cache: &Cache) -> Result<(), CacheError> {
        self.write_table(cache).map_err(|source| CacheError::Persist {
            path: self.path.clone(),
            source,
        })?;

        info!(path = %self.path.display(), records = cache.len(), "persisted cache");
        Ok(())
    }

    fn write_table(&self, cache: &Cache) -> io::Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        {
            let mut writer = WriterBuilder::new()
                .delimiter(DELIMITER)
                .has_headers(false)
                .from_writer(tmp.as_file_mut());
            writer.write_record(COLUMNS)?;
            for record in cache.records() {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn corrupt(&self, reason: String) -> CacheError {
        CacheError::Corrupt {
            path: self.path.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NOT_AVAILABLE;
    use tempfile::TempDir;

    fn create_test_store() -> (CacheStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = CacheStore::with_path(temp_dir.path().join("cik.psv"));
        (store, temp_dir)
    }

    fn record(symbol: &str, identifier: &str, name: &str) -> Record {
        Record {
            symbol: symbol.to_string(),
            identifier: identifier.to_string(),
            name: name.to_string(),
            category_code: "3571".to_string(),
            location: "CA".to_string(),
            incorporation: "CA".to_string(),
        }
    }

    #[test]
    fn test_load_missing_file_returns_empty_cache() {
        let (store, _temp_dir) = create_test_store();

        let loaded = store.load().expect("Missing file is not an error");

        assert!(loaded.cache.is_empty());
        assert!(!loaded.existed);
        assert!(!loaded.healed);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let cache = Cache::new().upsert(record("aapl", "0000320193", "Apple Inc."));

        assert!(cache.lookup("AAPL").is_some());
        assert!(cache.lookup("aapl").is_some());
        assert!(cache.lookup(" Aapl ").is_some());
        assert!(cache.lookup("MSFT").is_none());
        assert_eq!(cache.lookup("aapl").unwrap().symbol, "AAPL");
    }

    #[test]
    fn test_upsert_replaces_existing_record() {
        let cache = Cache::new()
            .upsert(record("AAPL", "0000320193", "Apple Computer"))
            .upsert(record("aapl", "0000320193", "Apple Inc."));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup("AAPL").unwrap().name, "Apple Inc.");
    }

    #[test]
    fn test_records_are_sorted_by_symbol() {
        let cache = Cache::new()
            .upsert(record("MSFT", "0000789019", "MICROSOFT CORP"))
            .upsert(record("AAPL", "0000320193", "Apple Inc."));

        let symbols: Vec<&str> = cache.records().iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn test_persist_then_load() {
        let (store, _temp_dir) = create_test_store();
        let cache = Cache::new()
            .upsert(record("AAPL", "0000320193", "Apple Inc."))
            .upsert(record("ACME", "0000000042", "ACME, INC. | HOLDINGS"));

        store.persist(&cache).expect("Persist should succeed");
        let loaded = store.load().expect("Load should succeed");

        assert!(loaded.existed);
        assert!(!loaded.healed);
        assert_eq!(loaded.cache, cache);
    }

    #[test]
    fn test_persist_writes_header_and_pipe_delimited_rows() {
        let (store, _temp_dir) = create_test_store();
        let cache = Cache::new().upsert(record("AAPL", "0000320193", "Apple Inc."));

        store.persist(&cache).unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("Ticker|CIK|Name|SIC|Location|Incorporated"));
        assert_eq!(lines.next(), Some("AAPL|0000320193|Apple Inc.|3571|CA|CA"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_persist_empty_cache_writes_header_only() {
        let (store, _temp_dir) = create_test_store();

        store.persist(&Cache::new()).unwrap();

        let loaded = store.load().unwrap();
        assert!(loaded.existed);
        assert!(loaded.cache.is_empty());
    }

    #[test]
    fn test_persist_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested").join("data").join("cik.psv");
        let store = CacheStore::with_path(nested.clone());

        store.persist(&Cache::new()).expect("Persist should succeed");

        assert!(nested.exists(), "Cache file should be created");
    }

    #[test]
    fn test_persist_failure_leaves_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let store = CacheStore::with_path(blocker.join("cik.psv"));

        let result = store.persist(&Cache::new());

        assert!(matches!(result, Err(CacheError::Persist { .. })));
        assert_eq!(fs::read_to_string(&blocker).unwrap(), "not a directory");
    }

    #[test]
    fn test_load_renormalizes_identifiers() {
        let (store, _temp_dir) = create_test_store();
        fs::write(
            store.path(),
            "Ticker|CIK|Name|SIC|Location|Incorporated\n\
             AAPL|320193|Apple Inc.|3571|CA|CA\n\
             AMZN|0001018724|AMAZON COM INC|5961|WA|DE\n",
        )
        .unwrap();

        let loaded = store.load().unwrap();

        assert!(loaded.healed);
        assert_eq!(loaded.cache.lookup("AAPL").unwrap().identifier, "0000320193");
        assert_eq!(loaded.cache.lookup("AMZN").unwrap().identifier, "0001018724");
    }

    #[test]
    fn test_load_uppercases_symbols() {
        let (store, _temp_dir) = create_test_store();
        fs::write(
            store.path(),
            "Ticker|CIK|Name|SIC|Location|Incorporated\nmsft|0000789019|MICROSOFT CORP|7372|WA|WA\n",
        )
        .unwrap();

        let loaded = store.load().unwrap();

        assert!(loaded.healed);
        assert_eq!(loaded.cache.lookup("MSFT").unwrap().symbol, "MSFT");
    }

    #[test]
    fn test_load_duplicate_rows_keep_last() {
        let (store, _temp_dir) = create_test_store();
        fs::write(
            store.path(),
            "Ticker|CIK|Name|SIC|Location|Incorporated\n\
             AAPL|0000320193|Apple Computer|3571|CA|CA\n\
             AAPL|0000320193|Apple Inc.|3571|CA|CA\n",
        )
        .unwrap();

        let loaded = store.load().unwrap();

        assert_eq!(loaded.cache.len(), 1);
        assert!(loaded.healed);
        assert_eq!(loaded.cache.lookup("AAPL").unwrap().name, "Apple Inc.");
    }

    #[test]
    fn test_load_fills_blank_fields_with_sentinel() {
        let (store, _temp_dir) = create_test_store();
        fs::write(
            store.path(),
            "Ticker|CIK|Name|SIC|Location|Incorporated\nAAPL|0000320193||3571||CA\n",
        )
        .unwrap();

        let loaded = store.load().unwrap();

        let record = loaded.cache.lookup("AAPL").unwrap();
        assert!(loaded.healed);
        assert_eq!(record.name, NOT_AVAILABLE);
        assert_eq!(record.location, NOT_AVAILABLE);
        assert_eq!(record.category_code, "3571");
        assert_eq!(record.incorporation, "CA");
    }

    #[test]
    fn test_load_under_regular_file_is_cold_start() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let store = CacheStore::with_path(blocker.join("cik.psv"));

        let loaded = store.load().expect("Missing table is not an error");

        assert!(!loaded.existed);
        assert!(loaded.cache.is_empty());
    }

    #[test]
    fn test_load_rejects_wrong_header() {
        let (store, _temp_dir) = create_test_store();
        fs::write(
            store.path(),
            "Ticker|CIK|Name|Exchange|SIC|Business|Incorporated|IRS\n\
             AAPL|320193|Apple Inc.|N/A|3571|CA|CA|N/A\n",
        )
        .unwrap();

        let result = store.load();

        assert!(matches!(result, Err(CacheError::Corrupt { .. })));
    }

    #[test]
    fn test_load_rejects_short_row() {
        let (store, _temp_dir) = create_test_store();
        fs::write(
            store.path(),
            "Ticker|CIK|Name|SIC|Location|Incorporated\nAAPL|320193|Apple Inc.\n",
        )
        .unwrap();

        assert!(matches!(store.load(), Err(CacheError::Corrupt { .. })));
    }

    #[test]
    fn test_load_rejects_oversized_identifier() {
        let (store, _temp_dir) = create_test_store();
        fs::write(
            store.path(),
            "Ticker|CIK|Name|SIC|Location|Incorporated\nAAPL|12345678901|Apple Inc.|3571|CA|CA\n",
        )
        .unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
        assert!(err.to_string().contains("AAPL"));
    }

    #[test]
    fn test_new_uses_configured_path() {
        let config = Config::with_cache_file("/tmp/somewhere/cik.psv");
        let store = CacheStore::new(&config);
        assert_eq!(store.path(), Path::new("/tmp/somewhere/cik.psv"));
    }
}
