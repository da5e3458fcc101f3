use std::io;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::http::client::RequestError;

pub type Result<T> = std::result::Result<T, ImportError>;

/// Command-level failures. Unresolved symbols are outcomes, not errors.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("symbols file not found: {0}")]
    FileNotFound(String),
    #[error("symbols file has no usable rows: {0}")]
    EmptySymbolFile(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("database error: {0}")]
    Database(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Request(#[from] RequestError),
}

impl From<rusqlite::Error> for ImportError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Database(value.to_string())
    }
}

/// One input row: a user-supplied identifier with an optional exchange hint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SymbolInput {
    #[serde(alias = "ticker")]
    pub symbol: String,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[cfg(test)]
impl SymbolInput {
    pub fn new(symbol: &str, exchange: Option<&str>) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: exchange.map(String::from),
            note: None,
        }
    }
}

/// Last traded price at resolution time.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    pub price: f64,
    pub currency: String,
    pub as_of: Option<DateTime<Utc>>,
}

/// A security the provider quoted with a usable price.
#[derive(Debug, Clone, PartialEq)]
pub struct Security {
    pub yahoo_symbol: String, // Provider symbol that answered, e.g. "IVV.AX".
    pub currency: String,
    pub exchange_name: Option<String>,
    pub name: Option<String>,
    pub instrument_type: Option<String>,
    pub price: PriceSnapshot,
    pub dividends: Vec<Dividend>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dividend {
    pub ex_date: NaiveDate,
    pub payment_date: NaiveDate, // Estimated, the provider reports ex-dates only.
    pub amount: f64,
    pub currency: String,
}

/// One search hit offered to the operator during disambiguation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub symbol: String,
    pub exchange: Option<String>,
    pub quote_type: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Resolved(Security),
    Unresolved { last_error: Option<String> },
}

/// Result of resolving one input. `symbol` and `exchange` are the normalized
/// identifiers that were resolved, not the provider symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionResult {
    pub symbol: String,
    pub exchange: Option<String>,
    pub outcome: Outcome,
}

impl ResolutionResult {
    pub fn is_resolved(&self) -> bool {
        matches!(self.outcome, Outcome::Resolved(_))
    }

    pub fn security(&self) -> Option<&Security> {
        match &self.outcome {
            Outcome::Resolved(security) => Some(security),
            Outcome::Unresolved { .. } => None,
        }
    }

    pub fn security_mut(&mut self) -> Option<&mut Security> {
        match &mut self.outcome {
            Outcome::Resolved(security) => Some(security),
            Outcome::Unresolved { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Resolved(_) => None,
            Outcome::Unresolved { last_error } => last_error.as_deref(),
        }
    }
}
