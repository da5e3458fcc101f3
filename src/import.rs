use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::config::Config;
use crate::http::{client::Transport, fetcher::CachingFetcher, rate_limiter::RateLimiter};
use crate::model::{self, ImportError};
use crate::resolve::{
    batch::{BatchOrchestrator, BatchRun},
    disambiguate::Disambiguator,
    resolver::TickerResolver,
    retry::RetryPolicy,
};
use crate::yahoo::api_caller::YahooClient;
use crate::{report, store, symbols};

/// Everything that shares one rate budget and one cache.
pub struct Session {
    fetcher: Arc<CachingFetcher>,
    resolver: TickerResolver,
}

impl Session {
    pub fn open(config: &Config, transport: Arc<dyn Transport>) -> model::Result<Self> {
        config.validate()?;
        let limiter = Arc::new(RateLimiter::new(config.max_requests, config.interval)?);
        let conn =
            store::sqlite::init_connection(&config.cache_path).map_err(ImportError::Database)?;
        let fetcher = Arc::new(CachingFetcher::new(
            transport,
            limiter,
            conn,
            config.cache_expiry,
            config.stale_if_error,
        )?);
        let resolver = TickerResolver::new(
            YahooClient::new(Arc::clone(&fetcher)),
            RetryPolicy::with_max_retries(config.max_retries),
        );
        Ok(Self { fetcher, resolver })
    }
}

#[derive(Debug, Default, Clone)]
pub struct ResolveOptions {
    /// Report destination; stdout when unset.
    pub output: Option<PathBuf>,
    pub with_dividends: bool,
}

/// Reads the symbols file, resolves it in batches and writes the report.
pub async fn resolve_file(
    session: &Session,
    config: &Config,
    symbols_file_path: &Path,
    options: &ResolveOptions,
    disambiguator: &mut dyn Disambiguator,
) -> model::Result<BatchRun> {
    let inputs = symbols::read_symbols_from_file(symbols_file_path)?;

    let orchestrator = BatchOrchestrator::new(session.resolver.clone(), config.item_delay);
    let mut run = orchestrator
        .run_batches(
            &inputs,
            config.batch_size,
            config.batch_delay,
            config.interactive,
            disambiguator,
        )
        .await?;

    if options.with_dividends {
        attach_dividends(session.resolver.client(), &mut run).await;
    }

    log::info!(
        "{} upstream requests admitted by the rate limiter",
        session.fetcher.limiter().admitted()
    );
    deliver(&run, options.output.as_deref(), io::stdout().lock(), io::stderr().lock())?;
    Ok(run)
}

// Writes the report to `output`, or to `stdout` when unset. The summary goes
// to `stdout` only when the report does not, so piped reports stay pure CSV.
fn deliver<O: Write, E: Write>(
    run: &BatchRun,
    output: Option<&Path>,
    stdout: O,
    stderr: E,
) -> model::Result<()> {
    match output {
        Some(path) => {
            report::write_report(BufWriter::new(File::create(path)?), &run.entries)?;
            log::info!("report written to {}", path.display());
            report::write_summary(stdout, run)
        }
        None => {
            report::write_report(stdout, &run.entries)?;
            report::write_summary(stderr, run)
        }
    }
}

async fn attach_dividends(client: &YahooClient, run: &mut BatchRun) {
    for entry in &mut run.entries {
        let Some(security) = entry.result.security_mut() else {
            continue;
        };
        match client.dividends(&security.yahoo_symbol).await {
            Ok(dividends) => security.dividends = dividends,
            Err(e) => log::warn!("dividends for {} failed: {}", security.yahoo_symbol, e),
        }
    }
}

/// Resolves one symbol and prints its dividend history. Returns the number of
/// dividends printed.
pub async fn show_dividends<W: Write>(
    session: &Session,
    symbol: &str,
    exchange: Option<&str>,
    mut out: W,
) -> model::Result<usize> {
    let result = session.resolver.resolve(symbol, exchange).await;
    let Some(security) = result.security() else {
        writeln!(
            out,
            "Could not resolve {}: {}",
            result.symbol,
            result.failure_reason().unwrap_or("no candidates")
        )?;
        return Ok(0);
    };

    let dividends = session
        .resolver
        .client()
        .dividends(&security.yahoo_symbol)
        .await?;

    writeln!(
        out,
        "{} ({}, {} on {}) {} {}",
        security.yahoo_symbol,
        security.name.as_deref().unwrap_or("-"),
        security.instrument_type.as_deref().unwrap_or("-"),
        security.exchange_name.as_deref().unwrap_or("-"),
        security.price.price,
        security.currency
    )?;
    writeln!(
        out,
        "{:<12} {:<14} {:>10} {}",
        "Ex-date", "Payment (est.)", "Amount", "Currency"
    )?;
    for d in &dividends {
        writeln!(
            out,
            "{:<12} {:<14} {:>10.4} {}",
            d.ex_date.to_string(),
            d.payment_date.to_string(),
            d.amount,
            d.currency
        )?;
    }
    Ok(dividends.len())
}

pub fn purge_cache(session: &Session) -> model::Result<usize> {
    let removed = session.fetcher.purge_expired()?;
    log::info!("removed {} expired cache entries", removed);
    Ok(removed)
}

pub fn clear_cache(session: &Session) -> model::Result<usize> {
    let removed = session.fetcher.clear()?;
    log::info!("removed {} cache entries", removed);
    Ok(removed)
}
