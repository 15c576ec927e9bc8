//! EDGAR submissions API client
//!
//! Lists a company's recent filings once its CIK is known. Only the
//! `filings.recent` block of the submissions document is read.

use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::identifier::{self, IdentifierError};

/// Errors that can occur when fetching filing history
#[derive(Debug, Error)]
pub enum FilingsError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The parallel columns of the recent block disagree in length
    #[error("Inconsistent submissions data: {0}")]
    Inconsistent(String),

    /// The CIK could not be normalized
    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierError),
}

/// A single filing from the submissions document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filing {
    /// Form type, e.g. `10-K`
    pub form: String,
    /// Date the filing was accepted
    pub filing_date: NaiveDate,
    /// Accession number, e.g. `0000320193-24-000123`
    pub accession_number: String,
    /// File name of the primary document
    pub primary_document: String,
}

#[derive(Debug, Deserialize)]
struct SubmissionsResponse {
    filings: FilingsBlock,
}

#[derive(Debug, Deserialize)]
struct FilingsBlock {
    recent: RecentFilings,
}

/// Column-oriented recent filings as EDGAR returns them
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentFilings {
    accession_number: Vec<String>,
    filing_date: Vec<NaiveDate>,
    form: Vec<String>,
    primary_document: Vec<String>,
}

/// Client for the EDGAR submissions API
#[derive(Debug, Clone)]
pub struct FilingsClient {
    client: Client,
    base_url: String,
}

impl FilingsClient {
    /// Creates a client from the process configuration
    pub fn new(config: &Config) -> Result<Self, FilingsError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.submissions_url.trim_end_matches('/').to_string(),
        })
    }

    fn submissions_url(&self, cik: &str) -> String {
        format!("{}/CIK{}.json", self.base_url, cik)
    }

    /// Fetches recent filings for a company
    ///
    /// # Arguments
    /// * `identifier` - CIK in any form accepted by [`identifier::normalize`]
    /// * `form` - only keep filings of this form type (case-insensitive)
    /// * `limit` - maximum number of filings to return, newest first
    pub async fn recent_filings(
        &self,
        identifier: &str,
        form: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Filing>, FilingsError> {
        let cik = identifier::normalize(identifier)?;
        let url = self.submissions_url(&cik);

        info!(cik = %cik, "fetching filing history");
        let text = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let filings = parse_submissions(&text)?;
        Ok(select_filings(filings, form, limit))
    }
}

/// Zips the recent filing columns into rows
fn parse_submissions(text: &str) -> Result<Vec<Filing>, FilingsError> {
    let response: SubmissionsResponse = serde_json::from_str(text)?;
    let recent = response.filings.recent;

    let count = recent.accession_number.len();
    if recent.filing_date.len() != count
        || recent.form.len() != count
        || recent.primary_document.len() != count
    {
        return Err(FilingsError::Inconsistent(format!(
            "{} accession numbers, {} dates, {} forms, {} documents",
            count,
            recent.filing_date.len(),
            recent.form.len(),
            recent.primary_document.len()
        )));
    }

    Ok(recent
        .accession_number
        .into_iter()
        .zip(recent.filing_date)
        .zip(recent.form)
        .zip(recent.primary_document)
        .map(
            |(((accession_number, filing_date), form), primary_document)| Filing {
                form,
                filing_date,
                accession_number,
                primary_document,
            },
        )
        .collect())
}

/// Filters by form and keeps the newest `limit` filings
fn select_filings(mut filings: Vec<Filing>, form: Option<&str>, limit: usize) -> Vec<Filing> {
    if let Some(form) = form {
        filings.retain(|f| f.form.eq_ignore_ascii_case(form));
    }
    filings.sort_by(|a, b| b.filing_date.cmp(&a.filing_date));
    filings.truncate(limit);
    filings
}
