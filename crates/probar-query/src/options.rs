//! Options resolved down a chain.
//!
//! Every node may carry a partial [`OptionsOverride`]. The options in effect
//! at a node are the process defaults with the overrides of every node from
//! the chain's input up to and including that node layered on top, later
//! nodes winning.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::config;
use crate::retry::{IntervalTicks, PollingRetry, RetryStrategy};
use crate::tree::TreeAccess;

static DEFAULT_OPTIONS: OnceLock<Options> = OnceLock::new();

/// Partial configuration set on one node
#[derive(Clone, Default)]
pub struct OptionsOverride {
    /// Upper bound on total polling
    pub timeout: Option<Duration>,
    /// Retry strategy driving the polling
    pub retry: Option<Arc<dyn RetryStrategy>>,
    /// Whether selection drops hidden items
    pub visible_only: Option<bool>,
    /// Tree the chain selects from
    pub tree: Option<Arc<dyn TreeAccess>>,
}

impl OptionsOverride {
    /// Override nothing
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the timeout in milliseconds
    #[must_use]
    pub const fn timeout_ms(self, timeout_ms: u64) -> Self {
        self.timeout(Duration::from_millis(timeout_ms))
    }

    /// Override the retry strategy
    #[must_use]
    pub fn retry(mut self, retry: Arc<dyn RetryStrategy>) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Override visibility filtering
    #[must_use]
    pub const fn visible_only(mut self, visible_only: bool) -> Self {
        self.visible_only = Some(visible_only);
        self
    }

    /// Override the tree accessor
    #[must_use]
    pub fn tree(mut self, tree: Arc<dyn TreeAccess>) -> Self {
        self.tree = Some(tree);
        self
    }

    /// `other` layered over `self`; keys set in `other` win
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            timeout: other.timeout.or(self.timeout),
            retry: other.retry.clone().or_else(|| self.retry.clone()),
            visible_only: other.visible_only.or(self.visible_only),
            tree: other.tree.clone().or_else(|| self.tree.clone()),
        }
    }

    /// Whether no key is set
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.timeout.is_none()
            && self.retry.is_none()
            && self.visible_only.is_none()
            && self.tree.is_none()
    }
}

impl fmt::Debug for OptionsOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionsOverride")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("visible_only", &self.visible_only)
            .field("tree", &self.tree.is_some())
            .finish()
    }
}

impl From<Options> for OptionsOverride {
    fn from(options: Options) -> Self {
        Self {
            timeout: Some(options.timeout),
            retry: Some(options.retry),
            visible_only: Some(options.visible_only),
            tree: options.tree,
        }
    }
}

/// Fully resolved options
#[derive(Clone)]
pub struct Options {
    /// Upper bound on total polling
    pub timeout: Duration,
    /// Retry strategy driving the polling
    pub retry: Arc<dyn RetryStrategy>,
    /// Whether selection drops hidden items
    pub visible_only: bool,
    /// Tree the chain selects from, if configured
    pub tree: Option<Arc<dyn TreeAccess>>,
}

impl Options {
    /// Process-wide defaults, built once from [`config::defaults`]
    #[must_use]
    pub fn defaults() -> Self {
        DEFAULT_OPTIONS
            .get_or_init(|| {
                let config = config::defaults();
                Self {
                    timeout: config.timeout(),
                    retry: Arc::new(PollingRetry::new(Arc::new(IntervalTicks::new(
                        config.poll_interval(),
                    )))),
                    visible_only: config.visible_only,
                    tree: None,
                }
            })
            .clone()
    }

    /// These options with `over` layered on top
    #[must_use]
    pub fn apply(&self, over: &OptionsOverride) -> Self {
        if over.is_empty() {
            return self.clone();
        }
        Self {
            timeout: over.timeout.unwrap_or(self.timeout),
            retry: over.retry.clone().unwrap_or_else(|| self.retry.clone()),
            visible_only: over.visible_only.unwrap_or(self.visible_only),
            tree: over.tree.clone().or_else(|| self.tree.clone()),
        }
    }

    /// Defaults with `overrides` applied in order
    pub fn resolve<'a>(overrides: impl IntoIterator<Item = &'a OptionsOverride>) -> Self {
        overrides
            .into_iter()
            .fold(Self::defaults(), |options, over| options.apply(over))
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("visible_only", &self.visible_only)
            .field("tree", &self.tree.is_some())
            .finish()
    }
}
