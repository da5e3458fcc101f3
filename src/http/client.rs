use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use std::{fmt::Display, future::Future, pin::Pin, sync::Arc};
use thiserror::Error;

use crate::constants;

// Shared HTTP client instance.
lazy_static::lazy_static! {
    static ref CLIENT: Arc<reqwest::Client> = Arc::new(
        reqwest::Client::builder()
            .user_agent(constants::USER_AGENT)
            .timeout(constants::HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new()),
    );
}

/// Custom error type for HTTP requests.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("HTTP error: {status} for {url}. Response body: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Error deserializing JSON: {0}")]
    Json(String),
    #[error("Provider error: {code}: {description}")]
    Provider { code: String, description: String },
    #[error("No data: {0}")]
    NoData(String),
    #[error("Other error: {0}")]
    Other(String),
}

/// Outbound request. The query string is already encoded into `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
}

impl Request {
    /// Builds a GET request for `path` with optional query parameters.
    pub fn get(path: &str, params: &[(&str, &str)]) -> Result<Self, RequestError> {
        let url = if params.is_empty() {
            Url::parse(path)
        } else {
            Url::parse_with_params(path, params)
        }
        .map_err(|e| RequestError::Other(e.to_string()))?;

        Ok(Self {
            method: Method::GET,
            url,
        })
    }

    /// Only idempotent reads may be served from or written to the cache.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    /// Canonical text form: method, URL without fragment, query pairs sorted by key.
    pub fn canonical(&self) -> String {
        let mut pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.sort();

        let mut base = self.url.clone();
        base.set_query(None);
        base.set_fragment(None);

        if pairs.is_empty() {
            return format!("{} {}", self.method.as_str(), base);
        }
        let query = pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{} {}?{}", self.method.as_str(), base, query)
    }
}

impl Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method.as_str(), self.url)
    }
}

/// Response as seen by callers of the fetch layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
    pub from_cache: bool,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            from_cache: false,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        serde_json::from_str(&self.body).map_err(|e| RequestError::Json(e.to_string()))
    }
}

pub type ResponseFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Response, RequestError>> + Send + 'a>>;

/// Executes requests against the network. Non-success statuses are returned
/// as responses; only failures to get any response at all are errors.
pub trait Transport: Send + Sync {
    fn execute<'a>(&'a self, request: &'a Request) -> ResponseFuture<'a>;
}

/// Transport backed by the shared reqwest client.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReqwestTransport;

impl Transport for ReqwestTransport {
    fn execute<'a>(&'a self, request: &'a Request) -> ResponseFuture<'a> {
        Box::pin(async move {
            let req = CLIENT.request(request.method.clone(), request.url.clone());

            let response = req.send().await.map_err(|e| {
                if e.is_timeout() {
                    RequestError::Transport(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    RequestError::Transport(format!("connection failed: {e}"))
                } else {
                    RequestError::Transport(e.to_string())
                }
            })?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| RequestError::Transport(format!("failed to read body: {e}")))?;

            Ok(Response::new(status, body))
        })
    }
}

#[cfg(test)]
pub mod mock {
    use std::sync::Mutex;

    use super::*;

    type Handler = dyn Fn(&Request) -> Result<Response, RequestError> + Send + Sync;

    /// Transport answering from a closure and recording every request URL.
    pub struct MockTransport {
        handler: Box<Handler>,
        calls: Mutex<Vec<Url>>,
    }

    impl MockTransport {
        pub fn new(
            handler: impl Fn(&Request) -> Result<Response, RequestError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                handler: Box::new(handler),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        /// Number of calls whose URL path ends with `/{segment}`.
        pub fn calls_for(&self, segment: &str) -> usize {
            let suffix = format!("/{segment}");
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|url| url.path().ends_with(&suffix))
                .count()
        }

        /// Last path segment of every call, in order.
        pub fn call_segments(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter_map(|url| url.path_segments().and_then(|s| s.last()).map(String::from))
                .collect()
        }
    }

    impl Transport for MockTransport {
        fn execute<'a>(&'a self, request: &'a Request) -> ResponseFuture<'a> {
            self.calls.lock().unwrap().push(request.url.clone());
            let result = (self.handler)(request);
            Box::pin(async move { result })
        }
    }
}
