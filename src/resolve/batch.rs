use std::time::Duration;

use tokio::time::sleep;

use super::disambiguate::{Disambiguator, disambiguate};
use super::resolver::TickerResolver;
use crate::config::ConfigError;
use crate::model::{ResolutionResult, SymbolInput};

/// Consecutive slice of the input handled as one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub index: usize,
    pub start: usize,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    batches: Vec<Batch>,
}

impl BatchPlan {
    pub fn new(total: usize, batch_size: usize) -> Result<Self, ConfigError> {
        if batch_size == 0 {
            return Err(ConfigError::InvalidConfiguration {
                field: "batch_size",
                reason: "must be positive".into(),
            });
        }
        let batches = (0..total)
            .step_by(batch_size)
            .enumerate()
            .map(|(index, start)| Batch {
                index,
                start,
                len: batch_size.min(total - start),
            })
            .collect();
        Ok(Self { batches })
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.batches.iter().map(|b| b.len).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    pub input: SymbolInput,
    pub result: ResolutionResult,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PacingStats {
    pub batches: usize,
    pub item_pauses: usize,
    pub batch_pauses: usize,
    pub disambiguations: usize,
}

/// One entry per input, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRun {
    pub entries: Vec<BatchEntry>,
    pub stats: PacingStats,
}

impl BatchRun {
    pub fn resolved_count(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_resolved()).count()
    }
}

/// Resolves inputs in paced groups on top of the rate limiter.
pub struct BatchOrchestrator {
    resolver: TickerResolver,
    item_delay: Duration,
}

impl BatchOrchestrator {
    pub fn new(resolver: TickerResolver, item_delay: Duration) -> Self {
        Self {
            resolver,
            item_delay,
        }
    }

    /// Resolves every input. Individual failures are recorded as unresolved
    /// entries; only an invalid `batch_size` fails the run.
    pub async fn run_batches(
        &self,
        inputs: &[SymbolInput],
        batch_size: usize,
        batch_delay: Duration,
        interactive: bool,
        disambiguator: &mut dyn Disambiguator,
    ) -> Result<BatchRun, ConfigError> {
        let plan = BatchPlan::new(inputs.len(), batch_size)?;
        if plan.is_empty() {
            log::warn!("no symbols to resolve");
        } else {
            log::info!("{} batches of sizes {:?}", plan.len(), plan.sizes());
        }
        let mut stats = PacingStats::default();
        let mut entries = Vec::with_capacity(inputs.len());

        for batch in plan.batches() {
            log::info!(
                "Processing batch {}/{} ({} symbols)",
                batch.index + 1,
                plan.len(),
                batch.len
            );
            stats.batches += 1;

            let items = &inputs[batch.start..batch.start + batch.len];
            for (i, input) in items.iter().enumerate() {
                let mut result = self
                    .resolver
                    .resolve(&input.symbol, input.exchange.as_deref())
                    .await;

                if !result.is_resolved() && interactive {
                    stats.disambiguations += 1;
                    if let Some(selected) =
                        disambiguate(&self.resolver, disambiguator, &input.symbol).await
                    {
                        result = selected;
                    }
                }

                entries.push(BatchEntry {
                    input: input.clone(),
                    result,
                });

                if i + 1 < items.len() && !self.item_delay.is_zero() {
                    stats.item_pauses += 1;
                    sleep(self.item_delay).await;
                }
            }

            if batch.index + 1 < plan.len() {
                log::info!(
                    "Waiting {:.1}s before next batch",
                    batch_delay.as_secs_f64()
                );
                stats.batch_pauses += 1;
                sleep(batch_delay).await;
            }
        }

        Ok(BatchRun { entries, stats })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::time::Instant;

    use super::*;
    use crate::http::client::{Response, mock::MockTransport};
    use crate::model::SearchMatch;
    use crate::resolve::disambiguate::NonInteractive;
    use crate::resolve::retry::RetryPolicy;
    use crate::yahoo::api_caller::fixtures::{chart_body, client, not_found_body, search_body};

    /// Records calls and always picks `pick`.
    struct Scripted {
        pick: Option<usize>,
        calls: usize,
    }

    impl Disambiguator for Scripted {
        fn choose(&mut self, _query: &str, _matches: &[SearchMatch]) -> Option<usize> {
            self.calls += 1;
            self.pick
        }
    }

    fn orchestrator(transport: Arc<MockTransport>) -> BatchOrchestrator {
        let resolver = TickerResolver::new(client(transport), RetryPolicy::default());
        BatchOrchestrator::new(resolver, Duration::from_secs(1))
    }

    fn inputs(symbols: &[&str]) -> Vec<SymbolInput> {
        symbols.iter().map(|s| SymbolInput::new(s, None)).collect()
    }

    #[test]
    fn plan_splits_into_consecutive_batches() {
        let plan = BatchPlan::new(7, 2).unwrap();
        assert_eq!(plan.sizes(), vec![2, 2, 2, 1]);
        assert_eq!(
            plan.batches()[3],
            Batch {
                index: 3,
                start: 6,
                len: 1
            }
        );
        assert!(BatchPlan::new(0, 2).unwrap().is_empty());
        assert_eq!(BatchPlan::new(4, 10).unwrap().sizes(), vec![4]);
    }

    #[test]
    fn plan_rejects_zero_batch_size() {
        assert!(matches!(
            BatchPlan::new(3, 0),
            Err(ConfigError::InvalidConfiguration { field: "batch_size", .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn seven_symbols_pause_between_batches_only() {
        let transport = Arc::new(MockTransport::new(|req| {
            let symbol = req.url.path().rsplit('/').next().unwrap_or("").to_string();
            Ok(Response::new(200, chart_body(&symbol, 10.0, "USD")))
        }));
        let orchestrator = orchestrator(transport.clone());
        let symbols = ["A", "B", "C", "D", "E", "F", "G"];
        let start = Instant::now();

        let run = orchestrator
            .run_batches(&inputs(&symbols), 2, Duration::from_secs(10), false, &mut NonInteractive)
            .await
            .unwrap();

        assert_eq!(run.stats.batches, 4);
        assert_eq!(run.stats.batch_pauses, 3);
        assert_eq!(run.stats.item_pauses, 3);
        assert_eq!(run.resolved_count(), 7);
        assert_eq!(transport.call_segments(), symbols);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(33));
        assert!(elapsed < Duration::from_secs(34));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_never_shrink_the_output() {
        let transport = Arc::new(MockTransport::new(|req| {
            if req.url.path().ends_with("/GOOD") {
                Ok(Response::new(200, chart_body("GOOD", 1.0, "USD")))
            } else if req.url.path().ends_with("/DOWN") {
                Err(crate::http::client::RequestError::Transport("timeout".into()))
            } else {
                Ok(Response::new(404, not_found_body()))
            }
        }));
        let symbols = ["BAD1", "GOOD", "DOWN", "BAD2", "GOOD"];

        let run = orchestrator(transport)
            .run_batches(&inputs(&symbols), 2, Duration::from_secs(1), false, &mut NonInteractive)
            .await
            .unwrap();

        assert_eq!(run.entries.len(), symbols.len());
        let order: Vec<_> = run.entries.iter().map(|e| e.input.symbol.as_str()).collect();
        assert_eq!(order, symbols);
        assert_eq!(run.resolved_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_prompt_when_not_interactive() {
        let transport = Arc::new(MockTransport::new(|_| Ok(Response::new(404, not_found_body()))));
        let mut scripted = Scripted {
            pick: Some(0),
            calls: 0,
        };

        let run = orchestrator(transport.clone())
            .run_batches(
                &[SymbolInput::new("XYZQ", Some("NASDAQ"))],
                2,
                Duration::from_secs(1),
                false,
                &mut scripted,
            )
            .await
            .unwrap();

        assert!(!run.entries[0].result.is_resolved());
        assert_eq!(scripted.calls, 0);
        assert_eq!(run.stats.disambiguations, 0);
        assert_eq!(transport.calls_for("search"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn interactive_selection_replaces_unresolved_result() {
        let transport = Arc::new(MockTransport::new(|req| {
            let path = req.url.path();
            if path.ends_with("/search") {
                Ok(Response::new(200, search_body(&[("IVV.AX", "ASX")])))
            } else if path.ends_with("/IVV.AX") {
                Ok(Response::new(200, chart_body("IVV.AX", 55.94, "AUD")))
            } else {
                Ok(Response::new(404, not_found_body()))
            }
        }));
        let mut scripted = Scripted {
            pick: Some(0),
            calls: 0,
        };

        let run = orchestrator(transport)
            .run_batches(&inputs(&["IVV"]), 2, Duration::from_secs(1), true, &mut scripted)
            .await
            .unwrap();

        assert_eq!(scripted.calls, 1);
        assert_eq!(run.stats.disambiguations, 1);
        assert_eq!(run.entries[0].input.symbol, "IVV");
        assert_eq!(
            run.entries[0].result.security().unwrap().yahoo_symbol,
            "IVV.AX"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn skipped_prompt_keeps_unresolved_result() {
        let transport = Arc::new(MockTransport::new(|req| {
            if req.url.path().ends_with("/search") {
                Ok(Response::new(200, search_body(&[("IVV.AX", "ASX")])))
            } else {
                Ok(Response::new(404, not_found_body()))
            }
        }));
        let mut scripted = Scripted {
            pick: None,
            calls: 0,
        };

        let run = orchestrator(transport)
            .run_batches(&inputs(&["IVV"]), 2, Duration::from_secs(1), true, &mut scripted)
            .await
            .unwrap();

        assert_eq!(scripted.calls, 1);
        assert!(!run.entries[0].result.is_resolved());
    }
}
