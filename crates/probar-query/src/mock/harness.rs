//! Deterministic tick driver.
//!
//! Polling queries bound to a [`TickHarness`] never sleep. They wait on the
//! harness, which wakes every waiting query once per [`TickHarness::tick`]
//! and advances a [`FakeClock`] by a fixed step, so timeouts and retry
//! counts are exact.
//!
//! ```no_run
//! # use probar_query::prelude::*;
//! # use probar_query::mock::{MemoryTree, Node, TickHarness};
//! # async fn demo() {
//! let tree = MemoryTree::new();
//! let harness = TickHarness::default();
//! let query = harness.bind(&tree.query().find(".b").should_exist());
//!
//! let writer = tree.clone();
//! let (found, _) = tokio::join!(
//!     query.then(),
//!     harness.eventually(move || writer.append(writer.root(), Node::new("div").class("b"))),
//! );
//! assert!(found.is_ok());
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};

use crate::clock::{create_clock, Clock};
use crate::config::DEFAULT_POLL_INTERVAL_MS;
use crate::options::OptionsOverride;
use crate::query::Query;
use crate::retry::{PollingRetry, TickSource};

type Deferred = Box<dyn FnOnce() + Send>;

struct Inner {
    clock: Clock,
    step: Duration,
    ticks: watch::Sender<u64>,
    deferred: Mutex<VecDeque<Deferred>>,
}

impl fmt::Debug for Inner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickHarness")
            .field("now_ms", &self.clock.now_ms())
            .field("step", &self.step)
            .field("ticks", &*self.ticks.borrow())
            .finish_non_exhaustive()
    }
}

/// Test driver standing in for real time
#[derive(Debug, Clone)]
pub struct TickHarness {
    inner: Arc<Inner>,
}

impl Default for TickHarness {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
    }
}

impl TickHarness {
    /// Harness whose ticks each advance time by `step`
    #[must_use]
    pub fn new(step: Duration) -> Self {
        let (ticks, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                clock: create_clock(),
                step,
                ticks,
                deferred: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// The fake clock behind [`TickSource::elapsed`]
    #[must_use]
    pub fn clock(&self) -> Clock {
        Arc::clone(&self.inner.clock)
    }

    /// Polling strategy that waits on this harness
    #[must_use]
    pub fn retry(&self) -> Arc<PollingRetry> {
        Arc::new(PollingRetry::new(Arc::new(self.clone())))
    }

    /// `query` polling on this harness
    #[must_use]
    pub fn bind(&self, query: &Query) -> Query {
        query.options(OptionsOverride::new().retry(self.retry()))
    }

    /// Queue `mutation` to run at the start of the next tick
    pub fn defer<F>(&self, mutation: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner
            .deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Box::new(mutation));
    }

    /// Let waiting queries run, apply deferred mutations, advance the clock
    /// and wake every waiting query once
    pub async fn tick(&self) {
        tokio::task::yield_now().await;
        self.flush();
        self.inner.clock.advance(self.inner.step);
        self.inner.ticks.send_modify(|count| *count += 1);
        tokio::task::yield_now().await;
    }

    /// Run `mutation` on a later tick and return its output
    pub async fn eventually<F, R>(&self, mutation: F) -> R
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (sender, mut receiver) = oneshot::channel();
        self.defer(move || {
            let _ = sender.send(mutation());
        });
        loop {
            self.tick().await;
            if let Ok(output) = receiver.try_recv() {
                return output;
            }
        }
    }

    /// Tick until `future` completes
    pub async fn drive<F: Future>(&self, future: F) -> F::Output {
        tokio::pin!(future);
        loop {
            tokio::select! {
                biased;
                output = &mut future => return output,
                () = self.tick() => {}
            }
        }
    }

    fn flush(&self) {
        let pending: Vec<Deferred> = self
            .inner
            .deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for mutation in pending {
            mutation();
        }
    }
}

#[async_trait]
impl TickSource for TickHarness {
    fn ticks(&self) -> u64 {
        *self.inner.ticks.borrow()
    }

    async fn tick_after(&self, seen: u64) {
        let mut ticks = self.inner.ticks.subscribe();
        let _ = ticks.wait_for(|&count| count > seen).await;
    }

    fn elapsed(&self) -> Duration {
        self.inner.clock.now()
    }
}
