//! SEC EDGAR company lookup
//!
//! Fetches the EDGAR company browse page for a ticker and scrapes the company
//! block for name, CIK, SIC code, state location and state of incorporation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use super::{CompanyLookup, LookupError, RawRecord, NOT_AVAILABLE};
use crate::config::Config;

/// A single HTTP session scoped to one fetch
///
/// Dropping the session releases the client; this happens on every exit path
/// of [`EdgarClient::fetch`], including errors.
struct EdgarSession {
    client: Client,
    symbol: String,
    timeout: Duration,
}

impl EdgarSession {
    fn open(user_agent: &str, timeout: Duration, symbol: &str) -> Result<Self, LookupError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        debug!(symbol, "opened EDGAR session");
        Ok(Self {
            client,
            symbol: symbol.to_string(),
            timeout,
        })
    }

    async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, LookupError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| self.classify(e))?;
        response.text().await.map_err(|e| self.classify(e))
    }

    fn classify(&self, error: reqwest::Error) -> LookupError {
        if error.is_timeout() {
            LookupError::Timeout(self.timeout)
        } else {
            LookupError::Http(error)
        }
    }
}

impl Drop for EdgarSession {
    fn drop(&mut self) {
        debug!(symbol = %self.symbol, "closed EDGAR session");
    }
}

/// Client for the EDGAR company browse page
#[derive(Debug, Clone)]
pub struct EdgarClient {
    base_url: String,
    user_agent: String,
    timeout: Duration,
}

impl EdgarClient {
    /// Creates a client from the process configuration
    pub fn new(config: &Config) -> Self {
        Self {
            base_url: config.edgar_url.clone(),
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
        }
    }

    /// Query parameters selecting a company's annual filings page
    fn company_query(symbol: &str) -> Vec<(&'static str, String)> {
        vec![
            ("action", "getcompany".to_string()),
            ("CIK", symbol.trim().to_lowercase()),
            ("type", "10-k".to_string()),
            ("dateb", String::new()),
            ("owner", "include".to_string()),
            ("count", "40".to_string()),
        ]
    }
}

#[async_trait]
impl CompanyLookup for EdgarClient {
    async fn fetch(&self, symbol: &str) -> Result<RawRecord, LookupError> {
        let session = EdgarSession::open(&self.user_agent, self.timeout, symbol)?;

        info!(symbol, "fetching company page from EDGAR");
        let html = session
            .get_text(&self.base_url, &Self::company_query(symbol))
            .await?;

        parse_company_page(symbol, &html)
    }
}

fn selector(css: &str) -> Result<Selector, LookupError> {
    Selector::parse(css).map_err(|e| LookupError::Parse(format!("selector {css}: {e:?}")))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Text of the first element matching `css` under `scope`, or the sentinel
fn first_text(scope: Option<ElementRef<'_>>, css: &str) -> Result<String, LookupError> {
    let selector = selector(css)?;
    Ok(scope
        .and_then(|scope| scope.select(&selector).next())
        .map(element_text)
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string()))
}

/// Extracts a raw record from an EDGAR company browse page.
///
/// Missing optional fields become [`NOT_AVAILABLE`]. A page without a
/// company block or CIK means EDGAR does not know the symbol.
fn parse_company_page(symbol: &str, html: &str) -> Result<RawRecord, LookupError> {
    let document = Html::parse_document(html);

    let company = document
        .select(&selector("div.companyInfo span.companyName")?)
        .next()
        .ok_or_else(|| LookupError::NotFound(symbol.to_string()))?;

    let identifier = company
        .select(&selector("a")?)
        .next()
        .map(element_text)
        .and_then(|text| text.split_whitespace().next().map(str::to_string))
        .ok_or_else(|| LookupError::NotFound(symbol.to_string()))?;

    let heading = element_text(company);
    let name = heading
        .split("CIK#")
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string();

    let ident_info = document
        .select(&selector("div.companyInfo p.identInfo")?)
        .next();

    Ok(RawRecord {
        name,
        identifier,
        category_code: first_text(ident_info, "a[href*='SIC=']")?,
        location: first_text(ident_info, "a[href*='State=']")?,
        incorporation: first_text(ident_info, "strong")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMAZON_PAGE: &str = r#"
        <html><body>
        <div id="contentDiv">
          <div class="companyInfo">
            <span class="companyName">AMAZON COM INC <acronym title="Central Index Key">CIK</acronym>#: <a href="/cgi-bin/browse-edgar?action=getcompany&amp;CIK=0001018724&amp;owner=include&amp;count=40">0001018724 (see all company filings)</a></span>
            <p class="identInfo"><acronym title="Standard Industrial Code">SIC</acronym>: <a href="/cgi-bin/browse-edgar?action=getcompany&amp;SIC=5961&amp;owner=include&amp;count=40">5961</a> - RETAIL-CATALOG &amp; MAIL-ORDER HOUSES<br />State location: <a href="/cgi-bin/browse-edgar?action=getcompany&amp;State=WA&amp;owner=include&amp;count=40">WA</a> | State of Inc.: <strong>DE</strong> | Fiscal Year End: 1231</p>
          </div>
        </div>
        </body></html>
    "#;

    #[test]
    fn test_parse_company_page() {
        let raw = parse_company_page("amzn", AMAZON_PAGE).unwrap();

        assert_eq!(raw.name, "AMAZON COM INC");
        assert_eq!(raw.identifier, "0001018724");
        assert_eq!(raw.category_code, "5961");
        assert_eq!(raw.location, "WA");
        assert_eq!(raw.incorporation, "DE");
    }

    #[test]
    fn test_missing_ident_info_uses_sentinel() {
        let html = r##"
            <div class="companyInfo">
              <span class="companyName">TINY CORP CIK#: <a href="#">0000000042 (see all company filings)</a></span>
            </div>
        "##;

        let raw = parse_company_page("TINY", html).unwrap();

        assert_eq!(raw.name, "TINY CORP");
        assert_eq!(raw.identifier, "0000000042");
        assert_eq!(raw.category_code, NOT_AVAILABLE);
        assert_eq!(raw.location, NOT_AVAILABLE);
        assert_eq!(raw.incorporation, NOT_AVAILABLE);
    }

    #[test]
    fn test_location_without_sic_is_not_misread() {
        let html = r##"
            <div class="companyInfo">
              <span class="companyName">NO SIC LLC CIK#: <a href="#">0000001234 (see all company filings)</a></span>
              <p class="identInfo">State location: <a href="/cgi-bin/browse-edgar?action=getcompany&amp;State=NY">NY</a> | State of Inc.: <strong>NY</strong></p>
            </div>
        "##;

        let raw = parse_company_page("NOSIC", html).unwrap();

        assert_eq!(raw.category_code, NOT_AVAILABLE);
        assert_eq!(raw.location, "NY");
        assert_eq!(raw.incorporation, "NY");
    }

    #[test]
    fn test_unknown_symbol_page_is_not_found() {
        let html = r#"<html><body><h1>No matching Ticker Symbol.</h1></body></html>"#;

        let err = parse_company_page("ZZZZ", html).unwrap_err();

        assert!(matches!(err, LookupError::NotFound(ref s) if s == "ZZZZ"));
    }

    #[test]
    fn test_company_without_cik_link_is_not_found() {
        let html = r#"<div class="companyInfo"><span class="companyName">GHOST INC</span></div>"#;

        assert!(matches!(
            parse_company_page("GHST", html),
            Err(LookupError::NotFound(_))
        ));
    }

    #[test]
    fn test_company_query_lowercases_symbol() {
        let query = EdgarClient::company_query(" AMZN ");

        assert!(query.contains(&("CIK", "amzn".to_string())));
        assert!(query.contains(&("type", "10-k".to_string())));
        assert!(query.contains(&("action", "getcompany".to_string())));
    }

    #[test]
    fn test_new_uses_config() {
        let config = Config {
            timeout_secs: 2,
            ..Config::with_cache_file("/tmp/cik.psv")
        };
        let client = EdgarClient::new(&config);

        assert_eq!(client.base_url, config.edgar_url);
        assert_eq!(client.timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_fetch_reports_unreachable_host() {
        let config = Config {
            edgar_url: "http://127.0.0.1:9/cgi-bin/browse-edgar".to_string(),
            timeout_secs: 2,
            ..Config::with_cache_file("/tmp/cik.psv")
        };
        let client = EdgarClient::new(&config);

        let result = client.fetch("AMZN").await;

        assert!(matches!(result, Err(LookupError::Http(_))));
    }
}
