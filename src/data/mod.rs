//! Core data models for cikcache
//!
//! This module contains the record types stored in the cache, the raw record
//! produced by an external lookup, and the lookup trait the resolver consumes.

pub mod edgar;
pub mod filings;

pub use edgar::EdgarClient;
pub use filings::{Filing, FilingsClient, FilingsError};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identifier::{self, IdentifierError};

/// Placeholder for a field the external source could not provide
pub const NOT_AVAILABLE: &str = "N/A";

/// One cached company, keyed by its ticker symbol
///
/// Field order matches the column order of the cache file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Upper-cased ticker symbol
    #[serde(rename = "Ticker")]
    pub symbol: String,
    /// Canonical 10-digit CIK
    #[serde(rename = "CIK")]
    pub identifier: String,
    /// Registered company name
    #[serde(rename = "Name")]
    pub name: String,
    /// Standard Industrial Classification code
    #[serde(rename = "SIC")]
    pub category_code: String,
    /// State or country of the business address
    #[serde(rename = "Location")]
    pub location: String,
    /// State or country of incorporation
    #[serde(rename = "Incorporated")]
    pub incorporation: String,
}

impl Record {
    /// Builds a record from a freshly fetched raw record.
    ///
    /// The symbol is upper-cased, the identifier normalized, and any blank
    /// field replaced with [`NOT_AVAILABLE`].
    pub fn from_raw(symbol: &str, raw: RawRecord) -> Result<Self, IdentifierError> {
        Ok(Self {
            symbol: normalize_symbol(symbol),
            identifier: identifier::normalize(&raw.identifier)?,
            name: or_sentinel(raw.name),
            category_code: or_sentinel(raw.category_code),
            location: or_sentinel(raw.location),
            incorporation: or_sentinel(raw.incorporation),
        })
    }
}

/// Unnormalized fields as returned by an external lookup
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRecord {
    pub name: String,
    pub identifier: String,
    pub category_code: String,
    pub location: String,
    pub incorporation: String,
}

/// Errors an external lookup can fail with
#[derive(Debug, Error)]
pub enum LookupError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// No response within the configured wait
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The source has no company for this symbol
    #[error("No company found for symbol '{0}'")]
    NotFound(String),

    /// The response could not be interpreted
    #[error("Failed to parse lookup response: {0}")]
    Parse(String),
}

/// A source of company records for symbols missing from the cache
///
/// Implementations make a single attempt per call and enforce their own
/// bounded wait; callers do not retry.
#[async_trait]
pub trait CompanyLookup: Send + Sync {
    /// Fetches the raw record for `symbol`
    async fn fetch(&self, symbol: &str) -> Result<RawRecord, LookupError>;
}

#[async_trait]
impl<T: CompanyLookup + ?Sized> CompanyLookup for Arc<T> {
    async fn fetch(&self, symbol: &str) -> Result<RawRecord, LookupError> {
        (**self).fetch(symbol).await
    }
}

/// Canonical form of a ticker symbol used as the cache key
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Replaces a blank field with [`NOT_AVAILABLE`]
pub fn or_sentinel(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        trimmed.to_string()
    }
}
