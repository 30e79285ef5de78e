//! Retry strategies and tick sources.
//!
//! A [`RetryStrategy`] receives a thunk that performs one attempt and
//! decides when to call it again. The default, [`PollingRetry`], never
//! busy-waits: between attempts it suspends on a [`TickSource`] and gives
//! up once the tick source reports that `timeout` has elapsed.
//!
//! Tick sources are injected through options, not read from ambient state,
//! so the same chain can poll in real time ([`IntervalTicks`]) or under a
//! deterministic test driver ([`crate::mock::TickHarness`]).

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use crate::result::{QueryResult, RetryMetrics};
use crate::value::Value;

/// One attempt of a query against the present tree state
pub type Attempt<'a> = dyn FnMut() -> QueryResult<Value> + Send + 'a;

/// Decides when to re-attempt a failing query
#[async_trait]
pub trait RetryStrategy: Send + Sync + fmt::Debug {
    /// Resolve with the first successful attempt, or fail once exhausted
    async fn retry(&self, attempt: &mut Attempt<'_>, timeout: Duration) -> QueryResult<Value>;
}

/// Source of "try again now" signals
///
/// Ticks are counted so a waiter can name the last tick it saw. A tick
/// delivered between reading [`TickSource::ticks`] and calling
/// [`TickSource::tick_after`] is not lost.
#[async_trait]
pub trait TickSource: Send + Sync + fmt::Debug {
    /// Ticks delivered so far
    fn ticks(&self) -> u64;

    /// Suspend until more than `seen` ticks have been delivered
    async fn tick_after(&self, seen: u64);

    /// Monotonic time as seen by this source
    fn elapsed(&self) -> Duration;
}

/// Real-time ticks every `interval`
#[derive(Debug, Clone)]
pub struct IntervalTicks {
    interval: Duration,
    origin: Instant,
}

impl IntervalTicks {
    /// Tick every `interval`
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            origin: Instant::now(),
        }
    }

    /// Interval between ticks
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    fn interval_nanos(&self) -> u128 {
        self.interval.as_nanos().max(1)
    }
}

#[async_trait]
impl TickSource for IntervalTicks {
    fn ticks(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos() / self.interval_nanos()).unwrap_or(u64::MAX)
    }

    async fn tick_after(&self, seen: u64) {
        let due = self.interval_nanos() * (u128::from(seen) + 1);
        let now = self.origin.elapsed().as_nanos();
        if due > now {
            let wait = u64::try_from(due - now).unwrap_or(u64::MAX);
            tokio::time::sleep(Duration::from_nanos(wait)).await;
        }
    }

    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Default strategy: re-attempt on every tick until `timeout` elapses.
///
/// Fatal errors (see [`crate::ErrorKind::is_fatal`]) are returned at once.
/// On timeout the last failure is returned with [`RetryMetrics`] attached.
#[derive(Debug, Clone)]
pub struct PollingRetry {
    ticks: Arc<dyn TickSource>,
}

impl PollingRetry {
    /// Poll on `ticks`
    #[must_use]
    pub fn new(ticks: Arc<dyn TickSource>) -> Self {
        Self { ticks }
    }

    /// Real-time polling every `interval`
    #[must_use]
    pub fn every(interval: Duration) -> Self {
        Self::new(Arc::new(IntervalTicks::new(interval)))
    }
}

#[async_trait]
impl RetryStrategy for PollingRetry {
    async fn retry(&self, attempt: &mut Attempt<'_>, timeout: Duration) -> QueryResult<Value> {
        let start = self.ticks.elapsed();
        let mut retries = 0usize;

        loop {
            let seen = self.ticks.ticks();
            let error = match attempt() {
                Ok(value) => {
                    debug!(retries, "query satisfied");
                    return Ok(value);
                }
                Err(error) => error,
            };

            if error.is_fatal() {
                debug!(%error, "query failed structurally, not retrying");
                return Err(error);
            }

            let waited = self.ticks.elapsed().saturating_sub(start);
            if waited >= timeout {
                let metrics = RetryMetrics {
                    waited_ms: waited.as_millis() as u64,
                    retries,
                };
                debug!(waited_ms = metrics.waited_ms, retries, "query timed out");
                return Err(error.with_metrics(metrics));
            }

            debug!(
                attempt = retries + 1,
                waited_ms = waited.as_millis() as u64,
                %error,
                "query attempt failed"
            );
            self.ticks.tick_after(seen).await;
            retries += 1;
        }
    }
}

/// Attempt exactly once
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryOnce;

#[async_trait]
impl RetryStrategy for RetryOnce {
    async fn retry(&self, attempt: &mut Attempt<'_>, _timeout: Duration) -> QueryResult<Value> {
        attempt()
    }
}
