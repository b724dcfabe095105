use std::time::Duration;

/// Counts consecutive failures of one chunk and decides when to give up on it.
///
/// The failure count lives in the persisted progress state, so a breaker is
/// rebuilt from it on every invocation rather than kept in memory.
#[derive(Clone, Debug)]
pub struct ChunkBreaker {
    max_attempts: u32,
    failures: u32,
    base_delay: Duration,
    max_delay: Duration,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BreakerState {
    /// Retry the same chunk after waiting this long.
    RetryAfter(Duration),
    /// Attempts exhausted.
    Open,
}

impl ChunkBreaker {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            failures: 0,
            base_delay,
            max_delay: if max_delay.is_zero() {
                base_delay
            } else {
                max_delay
            },
        }
    }

    /// Continues counting from failures recorded by earlier invocations.
    pub fn resume(mut self, failures: u32) -> Self {
        self.failures = failures;
        self
    }

    pub fn record_failure(&mut self) -> BreakerState {
        self.failures = self.failures.saturating_add(1);
        if self.failures >= self.max_attempts {
            BreakerState::Open
        } else {
            BreakerState::RetryAfter(self.delay_for(self.failures))
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    fn delay_for(&self, failures: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let exponent = failures.saturating_sub(1).min(6);
        let factor = 1u128 << exponent;
        let delay_ms = self.base_delay.as_millis().saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis());
        Duration::from_millis(capped as u64)
    }
}
