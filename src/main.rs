//! cikcache - resolve SEC CIK numbers for ticker symbols
//!
//! Results go to stdout; logs and warnings go to stderr.

use clap::Parser;
use tracing::error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use cikcache::cli::{format_filing, format_record, Cli, Command};
use cikcache::data::{EdgarClient, FilingsClient};
use cikcache::{CacheStore, Config, Resolver};

/// Installs the stderr log subscriber; `CIKCACHE_LOG_FORMAT=json` switches to JSON lines
fn init_tracing() {
    let log_format = std::env::var("CIKCACHE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

/// Resolves every symbol, printing each record; returns the number of failures
async fn resolve_all(config: &Config, symbols: &[String]) -> usize {
    let resolver = Resolver::new(config, EdgarClient::new(config));
    let mut failures = 0;

    for symbol in symbols {
        match resolver.resolve(symbol).await {
            Ok(resolution) => {
                println!("{}", format_record(&resolution.record));
                if let Some(warning) = resolution.persist_warning {
                    eprintln!("warning: {}", warning);
                }
            }
            Err(e) => {
                error!(symbol = %symbol, "{}", e);
                failures += 1;
            }
        }
    }

    failures
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let config = Config::load(cli.config.as_deref(), cli.overrides())?;

    match cli.command {
        Command::Resolve { symbols } => {
            let failures = resolve_all(&config, &symbols).await;
            if failures > 0 {
                return Err(format!("{} of {} symbols failed to resolve", failures, symbols.len()).into());
            }
        }
        Command::List => {
            let loaded = CacheStore::new(&config).load()?;
            for record in loaded.cache.records() {
                println!("{}", format_record(record));
            }
        }
        Command::Filings {
            symbol,
            form,
            limit,
        } => {
            let resolver = Resolver::new(&config, EdgarClient::new(&config));
            let resolution = resolver.resolve(&symbol).await?;
            if let Some(warning) = resolution.persist_warning {
                eprintln!("warning: {}", warning);
            }

            let client = FilingsClient::new(&config)?;
            let filings = client
                .recent_filings(&resolution.record.identifier, form.as_deref(), limit)
                .await?;

            println!("{}", format_record(&resolution.record));
            for filing in &filings {
                println!("{}", format_filing(filing));
            }
        }
    }

    Ok(())
}
