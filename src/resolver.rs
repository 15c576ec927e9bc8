//! Cache-backed CIK resolution
//!
//! [`Resolver::resolve`] answers from the cache when it can and falls back to
//! a single external lookup otherwise. Fresh records are normalized, merged
//! into the cache and persisted before they are returned.
//!
//! A failed persist does not fail the resolve: the record is still correct,
//! so it is returned together with the persist error as a warning.

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{Cache, CacheError, CacheStore, LoadedCache};
use crate::config::Config;
use crate::data::{normalize_symbol, CompanyLookup, LookupError, Record};
use crate::identifier::IdentifierError;

/// Errors that fail a resolve
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The symbol is empty after trimming
    #[error("Symbol must not be empty")]
    EmptySymbol,

    /// The cache file is corrupt or unreadable
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The fetched identifier could not be normalized
    #[error("Invalid identifier for {symbol}: {source}")]
    InvalidIdentifier {
        symbol: String,
        #[source]
        source: IdentifierError,
    },

    /// The external lookup could not produce a record
    #[error("Lookup failed for {symbol}: {source}")]
    LookupFailed {
        symbol: String,
        #[source]
        source: LookupError,
    },
}

/// Which cache state a resolve went through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPath {
    /// No cache file existed; the record was fetched
    ColdStart,
    /// The cache file existed without this symbol; the record was fetched
    CacheMiss,
    /// The record came from the cache
    CacheHit,
}

/// A successful resolve
#[derive(Debug)]
pub struct Resolution {
    /// The resolved record, always fully populated
    pub record: Record,
    /// How the record was obtained
    pub path: ResolutionPath,
    /// Set when the cache could not be written back
    pub persist_warning: Option<CacheError>,
}

/// Resolves ticker symbols to company records through the cache
pub struct Resolver<L> {
    store: CacheStore,
    lookup: L,
    // Serializes load, fetch, upsert and persist so concurrent resolves never
    // read a half-updated table or drop each other's writes.
    lock: Mutex<()>,
}

impl<L: CompanyLookup> Resolver<L> {
    /// Creates a resolver over the cache file named in `config`
    pub fn new(config: &Config, lookup: L) -> Self {
        Self::with_store(CacheStore::new(config), lookup)
    }

    /// Creates a resolver over an explicit cache store
    pub fn with_store(store: CacheStore, lookup: L) -> Self {
        Self {
            store,
            lookup,
            lock: Mutex::new(()),
        }
    }

    /// Resolves `symbol` (case-insensitive) to its record.
    ///
    /// # Behavior
    /// - Loads the cache; a corrupt or unreadable file fails the call
    /// - On a hit, returns the cached record without fetching, writing the
    ///   cache back only if loading re-normalized it
    /// - On a miss, fetches once, normalizes, upserts and persists
    /// - A persist failure is logged and returned in `persist_warning`
    pub async fn resolve(&self, symbol: &str) -> Result<Resolution, ResolveError> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(ResolveError::EmptySymbol);
        }

        let _guard = self.lock.lock().await;
        let LoadedCache {
            cache,
            existed,
            healed,
        } = self.store.load()?;

        // The load already re-padded identifiers and filled blank fields.
        if let Some(record) = cache.lookup(&symbol) {
            debug!(symbol = %symbol, healed, "cache hit");
            let record = record.clone();
            let persist_warning = if healed {
                info!(symbol = %symbol, "rewriting re-normalized cache");
                self.persist_best_effort(&cache)
            } else {
                None
            };
            return Ok(Resolution {
                record,
                path: ResolutionPath::CacheHit,
                persist_warning,
            });
        }

        let path = if existed {
            ResolutionPath::CacheMiss
        } else {
            ResolutionPath::ColdStart
        };
        info!(symbol = %symbol, ?path, "symbol not cached, fetching");

        let raw = self
            .lookup
            .fetch(&symbol)
            .await
            .map_err(|source| ResolveError::LookupFailed {
                symbol: symbol.clone(),
                source,
            })?;

        let record =
            Record::from_raw(&symbol, raw).map_err(|source| ResolveError::InvalidIdentifier {
                symbol: symbol.clone(),
                source,
            })?;

        let cache = cache.upsert(record.clone());
        let persist_warning = self.persist_best_effort(&cache);

        Ok(Resolution {
            record,
            path,
            persist_warning,
        })
    }

    fn persist_best_effort(&self, cache: &Cache) -> Option<CacheError> {
        match self.store.persist(cache) {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "resolved, but the cache could not be persisted");
                Some(e)
            }
        }
    }
}
