//! Canonical CIK formatting
//!
//! SEC Central Index Keys are always handled as exactly ten ASCII digits,
//! left-padded with zeros. Raw values scraped from EDGAR or read back from an
//! older cache file are normalized here before they are stored or returned.

use thiserror::Error;

/// Width of a canonical CIK
pub const CIK_WIDTH: usize = 10;

/// Errors produced while normalizing an identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// The raw value has no digits, or more digits than fit in a CIK
    #[error("Invalid identifier '{raw}': expected 1 to 10 digits, found {digits}")]
    Invalid {
        /// The value as it was received
        raw: String,
        /// Number of digits left after stripping everything else
        digits: usize,
    },
}

/// Normalizes a raw identifier into its canonical 10-character form.
///
/// All non-digit characters are discarded first, so values such as
/// `"CIK 320193"` or `"0000320193 (see all company filings)"` are accepted.
///
/// # Returns
/// * `Ok(String)` - exactly [`CIK_WIDTH`] digits
/// * `Err(IdentifierError::Invalid)` - no digits, or more than [`CIK_WIDTH`]
pub fn normalize(raw: &str) -> Result<String, IdentifierError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() || digits.len() > CIK_WIDTH {
        return Err(IdentifierError::Invalid {
            raw: raw.to_string(),
            digits: digits.len(),
        });
    }

    Ok(format!("{:0>width$}", digits, width = CIK_WIDTH))
}
