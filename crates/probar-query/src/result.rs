//! Result and error types for query evaluation.

use std::fmt;

use thiserror::Error;

use crate::path::Path;

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// What went wrong in an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Element count did not match what a terminal required
    NoMatch,
    /// A caller-supplied assertion, transform or fallible filter failed
    AssertionFailed,
    /// Submit target has no enclosing form
    NotInForm,
    /// A `firstOf`/`detect` sub-query has no assertion or action
    NoTerminal,
    /// Every `firstOf`/`detect` sub-query failed
    AllFailed,
    /// A step received a value it cannot operate on, or no tree is configured
    InvalidChain,
    /// A caller-supplied action returned an error
    ActionFailed,
}

impl ErrorKind {
    /// Structural failures that retrying cannot fix
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::NoTerminal | Self::InvalidChain | Self::ActionFailed)
    }
}

/// Timing attached to an error when polling gives up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryMetrics {
    /// Milliseconds spent polling
    pub waited_ms: u64,
    /// Attempts made after the first
    pub retries: usize,
}

/// A failed attempt, or a failed polling call.
///
/// Renders as the message, then the path of the attempt (when anything was
/// recorded), then the polling metrics (when polling gave up):
///
/// ```text
/// expected one or more elements, found 0 (found: path(find('.b') [0])) [waited 1003ms, retried 98 times]
/// ```
#[derive(Debug, Clone, Error)]
pub struct QueryError {
    kind: ErrorKind,
    message: String,
    path: Path,
    metrics: Option<RetryMetrics>,
}

impl QueryError {
    /// Create an error with an empty path
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            path: Path::new(),
            metrics: None,
        }
    }

    /// `expected <k> element(s), found <n>`
    #[must_use]
    pub fn count_mismatch(expected: usize, found: usize) -> Self {
        let noun = if expected == 1 { "element" } else { "elements" };
        Self::new(
            ErrorKind::NoMatch,
            format!("expected {expected} {noun}, found {found}"),
        )
    }

    /// `expected one or more elements, found <n>`
    #[must_use]
    pub fn none_found(found: usize) -> Self {
        Self::new(
            ErrorKind::NoMatch,
            format!("expected one or more elements, found {found}"),
        )
    }

    /// `expected no elements`
    #[must_use]
    pub fn unexpected_elements() -> Self {
        Self::new(ErrorKind::NoMatch, "expected no elements")
    }

    /// Assertion failure with a caller-supplied message
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AssertionFailed, message)
    }

    /// Submit target outside any form
    #[must_use]
    pub fn not_in_form() -> Self {
        Self::new(
            ErrorKind::NotInForm,
            "expected element to be inside a form for submit",
        )
    }

    /// Sub-query without assertion or action
    #[must_use]
    pub fn no_terminal() -> Self {
        Self::new(ErrorKind::NoTerminal, "no expectations or actions in query")
    }

    /// Every sub-query of a combinator failed
    #[must_use]
    pub fn all_failed(combinator: &str) -> Self {
        Self::new(
            ErrorKind::AllFailed,
            format!("all queries failed in {combinator}"),
        )
    }

    /// Structural problem with the chain itself
    #[must_use]
    pub fn invalid_chain(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidChain, message)
    }

    /// Caller-supplied action failed
    #[must_use]
    pub fn action_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ActionFailed, message)
    }

    /// Attach the path of the failing attempt
    #[must_use]
    pub fn with_path(mut self, path: Path) -> Self {
        self.path = path;
        self
    }

    /// Attach polling metrics
    #[must_use]
    pub const fn with_metrics(mut self, metrics: RetryMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Error kind
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Bare message, without path or metrics
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Path of the failing attempt
    #[must_use]
    pub const fn path(&self) -> &Path {
        &self.path
    }

    /// Polling metrics, if polling gave up
    #[must_use]
    pub const fn metrics(&self) -> Option<RetryMetrics> {
        self.metrics
    }

    /// Whether retrying can never fix this error
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }

    /// Rendering used inside a combinator entry: the sub-path is not
    /// wrapped in `path(...)` and metrics are never shown.
    #[must_use]
    pub fn render_nested(&self) -> String {
        if self.path.is_empty() {
            self.message.clone()
        } else {
            format!("{} (found: {})", self.message, self.path)
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if !self.path.is_empty() {
            write!(f, " (found: path({}))", self.path)?;
        }
        if let Some(metrics) = self.metrics {
            write!(
                f,
                " [waited {}ms, retried {} times]",
                metrics.waited_ms, metrics.retries
            )?;
        }
        Ok(())
    }
}
