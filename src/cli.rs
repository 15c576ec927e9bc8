//! Command-line interface parsing for cikcache
//!
//! This module handles parsing of CLI arguments using clap and the plain-text
//! rendering of records and filings on stdout.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::Overrides;
use crate::data::{Filing, Record};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The symbol contains characters no ticker uses
    #[error("Invalid symbol: '{0}'. Symbols contain letters, digits, '.' or '-'")]
    InvalidSymbol(String),
}

/// cikcache - resolve SEC CIK numbers for ticker symbols
#[derive(Parser, Debug)]
#[command(name = "cikcache")]
#[command(about = "Resolve SEC CIK numbers for ticker symbols through a local cache")]
#[command(version)]
pub struct Cli {
    /// JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Cache table location, overriding the config file
    #[arg(long, global = true, value_name = "PATH")]
    pub cache_file: Option<PathBuf>,

    /// User-Agent sent to SEC, e.g. "Jane Doe jane@example.com"
    #[arg(long, global = true, value_name = "AGENT")]
    pub user_agent: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Resolve one or more ticker symbols to CIK numbers
    Resolve {
        /// Ticker symbols, case-insensitive
        #[arg(required = true, value_parser = parse_symbol_arg)]
        symbols: Vec<String>,
    },
    /// Print every cached record
    List,
    /// Resolve a symbol and list its recent filings
    Filings {
        /// Ticker symbol, case-insensitive
        #[arg(value_parser = parse_symbol_arg)]
        symbol: String,
        /// Only show this form type, e.g. 10-K
        #[arg(long)]
        form: Option<String>,
        /// Maximum number of filings to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

impl Cli {
    /// Configuration overrides given on the command line
    pub fn overrides(&self) -> Overrides {
        Overrides {
            cache_file: self.cache_file.clone(),
            user_agent: self.user_agent.clone(),
            timeout_secs: self.timeout,
        }
    }
}

/// Validates a ticker symbol argument.
///
/// # Returns
/// * `Ok(String)` with surrounding whitespace removed
/// * `Err(CliError::InvalidSymbol)` if empty or containing other characters
pub fn parse_symbol_arg(s: &str) -> Result<String, CliError> {
    let symbol = s.trim();
    let valid = !symbol.is_empty()
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if valid {
        Ok(symbol.to_string())
    } else {
        Err(CliError::InvalidSymbol(s.to_string()))
    }
}

/// Renders a record as one pipe-separated line
pub fn format_record(record: &Record) -> String {
    [
        record.symbol.as_str(),
        record.identifier.as_str(),
        record.name.as_str(),
        record.category_code.as_str(),
        record.location.as_str(),
        record.incorporation.as_str(),
    ]
    .join("|")
}

/// Renders a filing as one aligned line
pub fn format_filing(filing: &Filing) -> String {
    format!(
        "{}  {:<8}  {}  {}",
        filing.filing_date.format("%Y-%m-%d"),
        filing.form,
        filing.accession_number,
        filing.primary_document
    )
}
