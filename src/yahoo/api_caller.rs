use std::sync::Arc;

use chrono::{DateTime, Days};

use super::response;
use crate::constants;
use crate::http::client::{Request, RequestError};
use crate::http::fetcher::CachingFetcher;
use crate::model;

/// Yahoo Finance JSON API, reached through the shared caching fetcher.
#[derive(Clone)]
pub struct YahooClient {
    fetcher: Arc<CachingFetcher>,
}

// Builds a chart request for `symbol`, percent-encoding it as a path segment.
fn chart_request(symbol: &str, params: &[(&str, &str)]) -> Result<Request, RequestError> {
    let mut request = Request::get(constants::CHART_URL, params)?;
    request
        .url
        .path_segments_mut()
        .map_err(|_| RequestError::Other("chart URL cannot take a path".into()))?
        .push(symbol);
    Ok(request)
}

// Returns the first chart result, mapping a reported provider error first.
fn first_result(
    symbol: &str,
    resp: response::ChartResponse,
) -> Result<response::ChartResult, RequestError> {
    if let Some(err) = resp.chart.error {
        return Err(RequestError::Provider {
            code: err.code,
            description: err.description.unwrap_or_else(|| "No description".into()),
        });
    }
    resp.chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| RequestError::NoData(format!("no chart result for {}", symbol)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl YahooClient {
    pub fn new(fetcher: Arc<CachingFetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetches the latest quote for `symbol`. A missing or non-positive price,
    /// or a missing currency, is reported as `NoData`.
    pub async fn quote(&self, symbol: &str) -> Result<model::Security, RequestError> {
        let request = chart_request(symbol, &[("interval", "1d"), ("range", "1d")])?;
        let resp = self.fetcher.fetch(&request).await?;
        let meta = first_result(symbol, resp.json()?)?.meta;

        let price = meta
            .regular_market_price
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| RequestError::NoData(format!("no market price for {}", symbol)))?;
        let currency = non_empty(meta.currency)
            .ok_or_else(|| RequestError::NoData(format!("no currency for {}", symbol)))?;

        Ok(model::Security {
            yahoo_symbol: non_empty(meta.symbol).unwrap_or_else(|| symbol.to_string()),
            currency: currency.clone(),
            exchange_name: non_empty(meta.full_exchange_name).or(non_empty(meta.exchange_name)),
            name: non_empty(meta.long_name).or(non_empty(meta.short_name)),
            instrument_type: non_empty(meta.instrument_type),
            price: model::PriceSnapshot {
                price,
                currency,
                as_of: meta
                    .regular_market_time
                    .and_then(|t| DateTime::from_timestamp(t, 0)),
            },
            dividends: Vec::new(),
        })
    }

    /// Free-text search, returning at most `SEARCH_MAX_RESULTS` matches.
    pub async fn search(&self, query: &str) -> Result<Vec<model::SearchMatch>, RequestError> {
        let count = constants::SEARCH_MAX_RESULTS.to_string();
        let request = Request::get(
            constants::SEARCH_URL,
            &[
                ("q", query),
                ("quotesCount", count.as_str()),
                ("newsCount", "0"),
                ("listsCount", "0"),
            ],
        )?;
        let resp = self.fetcher.fetch(&request).await?;
        let data: response::SearchResponse = resp.json()?;

        Ok(data
            .quotes
            .into_iter()
            .filter_map(|q| {
                Some(model::SearchMatch {
                    symbol: non_empty(q.symbol)?,
                    exchange: non_empty(q.exchange),
                    quote_type: non_empty(q.quote_type),
                    name: non_empty(q.shortname).or(non_empty(q.longname)),
                })
            })
            .take(constants::SEARCH_MAX_RESULTS as usize)
            .collect())
    }

    /// Full dividend history for `symbol`, oldest first.
    pub async fn dividends(&self, symbol: &str) -> Result<Vec<model::Dividend>, RequestError> {
        let request = chart_request(
            symbol,
            &[("range", "max"), ("interval", "1mo"), ("events", "div")],
        )?;
        let resp = self.fetcher.fetch(&request).await?;
        let result = first_result(symbol, resp.json()?)?;
        let currency = non_empty(result.meta.currency).unwrap_or_default();

        let mut dividends: Vec<model::Dividend> = result
            .events
            .map(|events| events.dividends.into_values().collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|event| {
                let ex_date = DateTime::from_timestamp(event.date, 0)?.date_naive();
                Some(model::Dividend {
                    ex_date,
                    payment_date: ex_date
                        .checked_add_days(Days::new(constants::DIVIDEND_PAYMENT_LAG_DAYS))?,
                    amount: event.amount,
                    currency: currency.clone(),
                })
            })
            .collect();
        dividends.sort_by_key(|d| d.ex_date);
        Ok(dividends)
    }
}
