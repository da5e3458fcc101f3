use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Debug, Deserialize)]
pub struct Chart {
    pub result: Option<Vec<ChartResult>>,
    pub error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
pub struct ChartError {
    pub code: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
    pub events: Option<ChartEvents>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub symbol: Option<String>,
    pub currency: Option<String>,
    pub regular_market_price: Option<f64>,
    pub regular_market_time: Option<i64>,
    pub exchange_name: Option<String>,
    pub full_exchange_name: Option<String>,
    pub instrument_type: Option<String>,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChartEvents {
    // Keyed by ex-date timestamp as a string.
    #[serde(default)]
    pub dividends: HashMap<String, DividendEvent>,
}

#[derive(Debug, Deserialize)]
pub struct DividendEvent {
    pub amount: f64,
    pub date: i64,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub quotes: Vec<SearchQuote>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuote {
    pub symbol: Option<String>,
    pub exchange: Option<String>,
    #[serde(rename = "quoteType")]
    pub quote_type: Option<String>,
    pub shortname: Option<String>,
    pub longname: Option<String>,
}
