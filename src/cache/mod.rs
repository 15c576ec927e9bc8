//! Cache module for the ticker-to-CIK table
//!
//! This module provides the in-memory cache keyed by ticker symbol and the
//! store that loads it from disk and rewrites it atomically. Identifiers are
//! re-normalized on every load so tables written by older versions heal
//! themselves on the next write.

mod store;

pub use store::{Cache, CacheError, CacheStore, LoadedCache, COLUMNS, DELIMITER};
