use std::time::Duration;

use crate::constants;

/// Exponential backoff for throttled lookups: `min(cap, base * 2^attempts + jitter)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries per candidate; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub base: Duration,
    pub cap: Duration,
    /// Upper bound (exclusive) of the uniform random jitter.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: constants::DEFAULT_MAX_RETRIES,
            base: constants::RETRY_BASE,
            cap: constants::RETRY_CAP,
            max_jitter: constants::RETRY_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Wait before the next attempt, given the attempts already counted.
    pub fn delay(&self, attempts: u32) -> Duration {
        let exp = self.base.saturating_mul(2u32.saturating_pow(attempts));
        let jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(fastrand::u64(0..jitter_ms))
        };
        exp.saturating_add(jitter).min(self.cap)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// Per-candidate retry bookkeeping. Starts fresh for every candidate.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RetryState {
    pub attempts: u32,
    pub last_wait: Option<Duration>,
}

impl RetryState {
    /// Counts a throttled attempt and decides whether to try again.
    pub fn on_throttled(&mut self, policy: &RetryPolicy) -> RetryDecision {
        self.attempts += 1;
        if self.attempts > policy.max_retries {
            return RetryDecision::GiveUp;
        }
        let wait = policy.delay(self.attempts);
        self.last_wait = Some(wait);
        RetryDecision::RetryAfter(wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RetryPolicy {
        RetryPolicy {
            max_jitter: Duration::ZERO,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = no_jitter();
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(4), Duration::from_secs(16));
        assert_eq!(policy.delay(5), Duration::from_secs(30));
        assert_eq!(policy.delay(40), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_below_bound() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.delay(1);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay < Duration::from_secs(3));
        }
    }

    #[test]
    fn gives_up_after_max_retries() {
        let policy = RetryPolicy {
            max_retries: 3,
            ..no_jitter()
        };
        let mut state = RetryState::default();

        assert_eq!(state.on_throttled(&policy), RetryDecision::RetryAfter(Duration::from_secs(2)));
        assert_eq!(state.on_throttled(&policy), RetryDecision::RetryAfter(Duration::from_secs(4)));
        assert_eq!(state.on_throttled(&policy), RetryDecision::RetryAfter(Duration::from_secs(8)));
        assert_eq!(state.on_throttled(&policy), RetryDecision::GiveUp);
        assert_eq!(state.attempts, 4);
        assert_eq!(state.last_wait, Some(Duration::from_secs(8)));
    }

    #[test]
    fn zero_retries_gives_up_immediately() {
        let mut state = RetryState::default();
        assert_eq!(
            state.on_throttled(&RetryPolicy::with_max_retries(0)),
            RetryDecision::GiveUp
        );
    }
}
