use std::{
    collections::VecDeque,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::time::{Instant, sleep};

use crate::config::ConfigError;

/// Sliding-window limiter: at most `max_requests` admissions within any
/// `interval`. Shared by every component that talks to the provider.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    interval: Duration,
    // Admission timestamps, oldest first.
    window: Mutex<VecDeque<Instant>>,
    admitted: AtomicU64,
}

impl RateLimiter {
    pub fn new(max_requests: u32, interval: Duration) -> Result<Self, ConfigError> {
        if max_requests == 0 {
            return Err(ConfigError::InvalidConfiguration {
                field: "max_requests",
                reason: "must be positive".into(),
            });
        }
        if interval.is_zero() {
            return Err(ConfigError::InvalidConfiguration {
                field: "interval",
                reason: "must be positive".into(),
            });
        }

        log::info!(
            "RateLimiter initialized: max_requests={}, interval={:.2}s",
            max_requests,
            interval.as_secs_f64()
        );
        Ok(Self {
            max_requests,
            interval,
            window: Mutex::new(VecDeque::with_capacity(max_requests as usize)),
            admitted: AtomicU64::new(0),
        })
    }

    /// Waits until a request fits the quota, then records it.
    pub async fn admit(&self) {
        loop {
            let wait = match self.try_admit(Instant::now()) {
                None => return,
                Some(wait) => wait,
            };

            log::info!(
                "RateLimiter: hit limit ({} req / {:.2}s). Sleeping for {:.2} seconds.",
                self.max_requests,
                self.interval.as_secs_f64(),
                wait.as_secs_f64()
            );
            // Other callers may take the freed slot meanwhile, so re-check after waking.
            sleep(wait).await;
        }
    }

    /// Records `now` and returns `None` when a slot is free, otherwise the
    /// time until the oldest admission leaves the window.
    fn try_admit(&self, now: Instant) -> Option<Duration> {
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);

        while let Some(&oldest) = window.front() {
            if now.duration_since(oldest) >= self.interval {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() < self.max_requests as usize {
            window.push_back(now);
            self.admitted.fetch_add(1, Ordering::Relaxed);
            log::debug!(
                "RateLimiter: request allowed. Current load: {}/{} in last {:.2}s.",
                window.len(),
                self.max_requests,
                self.interval.as_secs_f64()
            );
            return None;
        }

        let oldest = window.front().copied().unwrap_or(now);
        Some((oldest + self.interval).saturating_duration_since(now))
    }

    /// Total admissions since construction.
    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }
}
