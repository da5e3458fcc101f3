use tokio::time::sleep;

use super::candidates;
use super::failure::{FailureKind, classify};
use super::retry::{RetryDecision, RetryPolicy, RetryState};
use crate::http::client::RequestError;
use crate::model::{Outcome, ResolutionResult, Security};
use crate::yahoo::api_caller::YahooClient;

/// Result of one quote attempt against a single candidate.
#[derive(Debug)]
enum Attempt {
    Success(Security),
    Retryable(RequestError),
    FatalForCandidate(RequestError),
}

/// Turns a user-supplied `(symbol, exchange)` into a priced security by
/// walking the candidate list, backing off on throttling.
#[derive(Clone)]
pub struct TickerResolver {
    client: YahooClient,
    policy: RetryPolicy,
}

impl TickerResolver {
    pub fn new(client: YahooClient, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn client(&self) -> &YahooClient {
        &self.client
    }

    pub async fn resolve(&self, symbol: &str, exchange: Option<&str>) -> ResolutionResult {
        self.resolve_with_retries(symbol, exchange, self.policy.max_retries)
            .await
    }

    pub async fn resolve_with_retries(
        &self,
        symbol: &str,
        exchange: Option<&str>,
        max_retries: u32,
    ) -> ResolutionResult {
        let policy = RetryPolicy {
            max_retries,
            ..self.policy
        };
        let symbol = symbol.trim().to_uppercase();
        let exchange = candidates::normalize_exchange(exchange);

        let candidates = candidates::generate(&symbol, exchange.as_deref());
        let mut last_error = if candidates.is_empty() {
            Some("empty symbol".to_string())
        } else {
            None
        };

        for candidate in &candidates {
            match self.try_candidate(candidate, &policy).await {
                Ok(security) => {
                    log::info!(
                        "resolved {} ({}) as {} at {} {}",
                        symbol,
                        exchange.as_deref().unwrap_or("-"),
                        security.yahoo_symbol,
                        security.price.price,
                        security.currency
                    );
                    return ResolutionResult {
                        symbol,
                        exchange,
                        outcome: Outcome::Resolved(security),
                    };
                }
                Err(err) => last_error = Some(err.to_string()),
            }
        }

        log::warn!(
            "could not resolve {} ({}) after trying {:?}",
            symbol,
            exchange.as_deref().unwrap_or("-"),
            candidates
        );
        ResolutionResult {
            symbol,
            exchange,
            outcome: Outcome::Unresolved { last_error },
        }
    }

    async fn attempt(&self, candidate: &str) -> Attempt {
        let err = match self.client.quote(candidate).await {
            Ok(security) => return Attempt::Success(security),
            Err(err) => err,
        };
        match classify(&err) {
            FailureKind::RateLimited => Attempt::Retryable(err),
            FailureKind::NotFound => {
                log::debug!("{}: not found ({})", candidate, err);
                Attempt::FatalForCandidate(err)
            }
            FailureKind::Transport | FailureKind::Unknown => {
                log::warn!("{}: giving up on candidate: {}", candidate, err);
                Attempt::FatalForCandidate(err)
            }
        }
    }

    async fn try_candidate(
        &self,
        candidate: &str,
        policy: &RetryPolicy,
    ) -> Result<Security, RequestError> {
        let mut state = RetryState::default();
        loop {
            match self.attempt(candidate).await {
                Attempt::Success(security) => return Ok(security),
                Attempt::FatalForCandidate(err) => return Err(err),
                Attempt::Retryable(err) => match state.on_throttled(policy) {
                    RetryDecision::RetryAfter(wait) => {
                        log::warn!(
                            "{}: rate limited, retry {}/{} in {:.2}s",
                            candidate,
                            state.attempts,
                            policy.max_retries,
                            wait.as_secs_f64()
                        );
                        sleep(wait).await;
                    }
                    RetryDecision::GiveUp => {
                        log::warn!(
                            "{}: still rate limited after {} retries",
                            candidate,
                            policy.max_retries
                        );
                        return Err(err);
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::http::client::{Response, mock::MockTransport};
    use crate::yahoo::api_caller::fixtures::{chart_body, client, not_found_body};

    fn resolver(transport: Arc<MockTransport>) -> TickerResolver {
        TickerResolver::new(client(transport), RetryPolicy::with_max_retries(3))
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_listing_resolves_on_first_candidate() {
        let transport = Arc::new(MockTransport::new(|req| {
            if req.url.path().ends_with("/IVV.ASX") {
                Ok(Response::new(200, chart_body("IVV.ASX", 55.94, "AUD")))
            } else {
                Ok(Response::new(404, not_found_body()))
            }
        }));

        let result = resolver(transport.clone()).resolve("IVV", Some("ASX")).await;

        assert_eq!(result.symbol, "IVV");
        assert_eq!(result.exchange.as_deref(), Some("ASX"));
        let security = result.security().unwrap();
        assert_eq!(security.price.price, 55.94);
        assert_eq!(security.yahoo_symbol, "IVV.ASX");
        assert_eq!(transport.call_segments(), vec!["IVV.ASX"]);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_symbol_is_unresolved_after_all_candidates() {
        let transport = Arc::new(MockTransport::new(|_| Ok(Response::new(404, not_found_body()))));

        let result = resolver(transport.clone()).resolve("XYZQ", Some("NASDAQ")).await;

        assert!(!result.is_resolved());
        assert!(result.failure_reason().is_some());
        assert_eq!(transport.call_segments(), vec!["XYZQ", "XYZQ.NASDAQ"]);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_next_candidate() {
        let transport = Arc::new(MockTransport::new(|req| {
            if req.url.path().ends_with("/BHP") {
                Ok(Response::new(200, chart_body("BHP", 45.0, "USD")))
            } else {
                Ok(Response::new(200, not_found_body()))
            }
        }));

        let result = resolver(transport.clone()).resolve("bhp", Some("xx")).await;

        assert_eq!(result.security().unwrap().yahoo_symbol, "BHP");
        assert_eq!(transport.call_segments(), vec!["BHP.XX", "BHP"]);
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_candidate_gets_initial_plus_max_retries_attempts() {
        let transport =
            Arc::new(MockTransport::new(|_| Ok(Response::new(429, "Too Many Requests"))));

        let result = resolver(transport.clone())
            .resolve_with_retries("AAPL", Some("NASDAQ"), 3)
            .await;

        assert!(!result.is_resolved());
        assert_eq!(transport.calls_for("AAPL"), 4);
        assert_eq!(transport.calls_for("AAPL.NASDAQ"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_throttling() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let transport = Arc::new(MockTransport::new(move |_| {
            if counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) < 2 {
                Ok(Response::new(429, "Too Many Requests"))
            } else {
                Ok(Response::new(200, chart_body("TSLA", 250.0, "USD")))
            }
        }));
        let start = tokio::time::Instant::now();

        let result = resolver(transport.clone()).resolve("TSLA", None).await;

        assert!(result.is_resolved());
        assert_eq!(transport.calls_for("TSLA"), 3);
        // Two backoffs: 2s and 4s plus jitter below 1s each.
        let waited = start.elapsed();
        assert!(waited >= std::time::Duration::from_secs(6));
        assert!(waited < std::time::Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn non_positive_price_counts_as_not_found() {
        let transport = Arc::new(MockTransport::new(|req| {
            let body = if req.url.path().ends_with("/AAPL") {
                chart_body("AAPL", 0.0, "USD")
            } else {
                chart_body("AAPL.NASDAQ", 190.0, "USD")
            };
            Ok(Response::new(200, body))
        }));

        let result = resolver(transport).resolve("AAPL", Some("NASDAQ")).await;

        assert_eq!(result.security().unwrap().yahoo_symbol, "AAPL.NASDAQ");
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_move_on_without_retry() {
        let transport = Arc::new(MockTransport::new(|_| {
            Err(RequestError::Transport("connection refused".into()))
        }));

        let result = resolver(transport.clone()).resolve("MSFT", None).await;

        assert!(!result.is_resolved());
        assert_eq!(transport.total_calls(), 1);
        assert!(result.failure_reason().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn blank_symbol_is_unresolved_without_requests() {
        let transport = Arc::new(MockTransport::new(|_| Ok(Response::new(500, ""))));

        let result = resolver(transport.clone()).resolve("  ", None).await;

        assert!(!result.is_resolved());
        assert_eq!(transport.total_calls(), 0);
    }
}
