//! Injectable retry policy for any `DataPort`.
//!
//! The wrapper stays synchronous: it sleeps between attempts through an
//! injected function, so tests can record delays instead of waiting.

use crate::domain::error::ScannerError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::time::Duration;
use tracing::warn;

pub trait RetryPolicy {
    /// Delay before retry number `attempt` (1-based), or `None` to give up.
    fn next_delay(&self, attempt: u32, error: &ScannerError) -> Option<Duration>;
}

/// Single attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn next_delay(&self, _attempt: u32, _error: &ScannerError) -> Option<Duration> {
        None
    }
}

/// `base_delay * 2^(attempt - 1)` for up to `max_retries` retries of provider failures.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32, error: &ScannerError) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries || !matches!(error, ScannerError::DataUnavailable { .. }) {
            return None;
        }
        let factor = 2u32.checked_pow(attempt - 1)?;
        self.base_delay.checked_mul(factor)
    }
}

pub struct RetryingDataPort<P, R> {
    inner: P,
    policy: R,
    sleep: Box<dyn Fn(Duration)>,
}

impl<P: DataPort, R: RetryPolicy> RetryingDataPort<P, R> {
    pub fn new(inner: P, policy: R) -> Self {
        Self::with_sleep(inner, policy, Box::new(std::thread::sleep))
    }

    pub fn with_sleep(inner: P, policy: R, sleep: Box<dyn Fn(Duration)>) -> Self {
        Self { inner, policy, sleep }
    }
}

impl<P: DataPort, R: RetryPolicy> DataPort for RetryingDataPort<P, R> {
    fn fetch_daily_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ScannerError> {
        let mut attempt = 0;
        loop {
            match self.inner.fetch_daily_bars(symbol, start_date, end_date) {
                Ok(bars) => return Ok(bars),
                Err(e) => {
                    attempt += 1;
                    let Some(delay) = self.policy.next_delay(attempt, &e) else {
                        return Err(e);
                    };
                    warn!(
                        symbol = %symbol,
                        provider = self.inner.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying fetch"
                    );
                    (self.sleep)(delay);
                }
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
