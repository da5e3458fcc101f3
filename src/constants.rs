use std::time::Duration;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// Yahoo Finance endpoints.
pub const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
pub const SEARCH_URL: &str = "https://query1.finance.yahoo.com/v1/finance/search";
pub const SEARCH_MAX_RESULTS: u32 = 20;

// Rate limit (requests per window).
pub const DEFAULT_MAX_REQUESTS: u32 = 2;
pub const DEFAULT_INTERVAL_SECONDS: f64 = 5.0;

// HTTP cache.
pub const DEFAULT_CACHE_PATH: &str = "yfinance_cache/http_cache.sqlite";
pub const DEFAULT_CACHE_EXPIRY_SECONDS: u64 = 3600;

// Batch pacing.
pub const DEFAULT_BATCH_SIZE: usize = 2;
pub const DEFAULT_BATCH_DELAY_SECONDS: f64 = 10.0;
pub const DEFAULT_ITEM_DELAY_SECONDS: f64 = 1.0;

// Retry on throttling.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const RETRY_BASE: Duration = Duration::from_secs(1);
pub const RETRY_CAP: Duration = Duration::from_secs(30);
pub const RETRY_MAX_JITTER: Duration = Duration::from_secs(1);

// Exchanges whose tickers are quoted by the provider without a suffix.
pub const DOMESTIC_EXCHANGES: [&str; 5] = ["NASDAQ", "NYSE", "AMEX", "NYSEARCA", "BATS"];

// The provider reports ex-dates only.
pub const DIVIDEND_PAYMENT_LAG_DAYS: u64 = 15;
