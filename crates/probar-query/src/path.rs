//! Diagnostic path of one attempt.
//!
//! A path records, for every step evaluated in an attempt, its description
//! and how many items it produced. It is thrown away on success and
//! attached to the error on failure so the message can show *where* the
//! chain diverged:
//!
//! ```text
//! expected 1 element, found 0 (found: path(find('.container') [1], find('.contact') [2], find('.name') [0]))
//! ```

use std::fmt;

use crate::result::QueryError;

/// One failed branch of a `firstOf` or `detect`
#[derive(Debug, Clone)]
pub struct Branch {
    /// Key for `detect` branches, `None` for `firstOf`
    pub key: Option<String>,
    /// Why the branch failed
    pub error: QueryError,
}

/// Sub-paths nested under a combinator entry
#[derive(Debug, Clone)]
pub enum Nested {
    /// `concat`: one path per sub-query, in listed order
    Sequence(Vec<Path>),
    /// `firstOf` / `detect`: one failure per sub-query, in listed order
    Alternatives(Vec<Branch>),
}

/// A single step on a path
#[derive(Debug, Clone)]
pub struct PathEntry {
    /// Step description, e.g. `find('.name')`
    pub description: String,
    /// Items produced by the step
    pub found: usize,
    /// Sub-paths for combinator steps
    pub nested: Option<Nested>,
}

impl PathEntry {
    /// Plain step entry
    #[must_use]
    pub fn step(description: impl Into<String>, found: usize) -> Self {
        Self {
            description: description.into(),
            found,
            nested: None,
        }
    }

    /// Combinator entry carrying sub-paths
    #[must_use]
    pub fn nested(description: impl Into<String>, found: usize, nested: Nested) -> Self {
        Self {
            description: description.into(),
            found,
            nested: Some(nested),
        }
    }
}

impl fmt::Display for PathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.nested {
            None => write!(f, "{} [{}]", self.description, self.found),
            Some(Nested::Sequence(paths)) => {
                write!(f, "{}(", self.description)?;
                write_joined(f, paths.iter())?;
                write!(f, ") [{}]", self.found)
            }
            Some(Nested::Alternatives(branches)) => {
                write!(f, "{}(", self.description)?;
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if let Some(key) = &branch.key {
                        write!(f, "{key}: ")?;
                    }
                    f.write_str(&branch.error.render_nested())?;
                }
                write!(f, ") [{}]", self.found)
            }
        }
    }
}

/// Ordered steps of one attempt
#[derive(Debug, Clone, Default)]
pub struct Path {
    entries: Vec<PathEntry>,
}

impl Path {
    /// Empty path
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plain step
    pub fn record(&mut self, description: impl Into<String>, found: usize) {
        self.entries.push(PathEntry::step(description, found));
    }

    /// Append any entry
    pub fn push(&mut self, entry: PathEntry) {
        self.entries.push(entry);
    }

    /// Entries in evaluation order
    #[must_use]
    pub fn entries(&self) -> &[PathEntry] {
        &self.entries
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of recorded steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Found-count of the last recorded step
    #[must_use]
    pub fn last_found(&self) -> Option<usize> {
        self.entries.last().map(|entry| entry.found)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_joined(f, self.entries.iter())
    }
}

fn write_joined<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = T>,
) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}
