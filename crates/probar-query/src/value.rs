//! Items and values threaded through a query chain.

use serde::{Deserialize, Serialize};

/// Opaque handle naming one item of an external tree.
///
/// Two handles are equal when they name the same item. The tree accessor
/// decides how ids map onto its own nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Element(u64);

impl Element {
    /// Create a handle from a tree-specific id
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Tree-specific id of this handle
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// The "current items" of a chain at some step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Ordered collection of matched items
    Elements(Vec<Element>),
    /// Scalar produced by `input` or `transform`
    Data(serde_json::Value),
    /// Winning branch of a `detect`
    Detected {
        /// Key of the first sub-query that succeeded
        key: String,
        /// That sub-query's result
        value: Box<Value>,
    },
}

impl Value {
    /// Empty element collection
    #[must_use]
    pub const fn empty() -> Self {
        Self::Elements(Vec::new())
    }

    /// Wrap arbitrary serialisable data
    pub fn data(data: impl Serialize) -> Result<Self, serde_json::Error> {
        serde_json::to_value(data).map(Self::Data)
    }

    /// Number of items this value represents on a path
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Self::Elements(elements) => elements.len(),
            Self::Data(_) | Self::Detected { .. } => 1,
        }
    }

    /// Borrow the element collection, if this is one
    #[must_use]
    pub fn elements(&self) -> Option<&[Element]> {
        match self {
            Self::Elements(elements) => Some(elements),
            _ => None,
        }
    }

    /// Take the element collection, if this is one
    #[must_use]
    pub fn into_elements(self) -> Option<Vec<Element>> {
        match self {
            Self::Elements(elements) => Some(elements),
            _ => None,
        }
    }

    /// Borrow scalar data, if this is scalar
    #[must_use]
    pub const fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Data(data) => Some(data),
            _ => None,
        }
    }

    /// String content of scalar string data
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(serde_json::Value::as_str)
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<Element>> for Value {
    fn from(elements: Vec<Element>) -> Self {
        Self::Elements(elements)
    }
}

impl From<Element> for Value {
    fn from(element: Element) -> Self {
        Self::Elements(vec![element])
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Data(serde_json::Value::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Data(serde_json::Value::String(s))
    }
}

impl From<serde_json::Value> for Value {
    fn from(data: serde_json::Value) -> Self {
        Self::Data(data)
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(data: $ty) -> Self {
                    Self::Data(serde_json::Value::from(data))
                }
            }
        )*
    };
}

impl_from_scalar!(bool, i64, u64, usize, f64);
