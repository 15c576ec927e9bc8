//! cikcache library
//!
//! Resolves SEC Central Index Keys for ticker symbols, keeping every resolved
//! company in a local pipe-delimited table so EDGAR is only consulted once per
//! symbol.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod identifier;
pub mod resolver;

pub use cache::{Cache, CacheError, CacheStore};
pub use config::Config;
pub use data::{CompanyLookup, LookupError, RawRecord, Record, NOT_AVAILABLE};
pub use resolver::{Resolution, ResolutionPath, ResolveError, Resolver};
