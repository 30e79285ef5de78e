//! Tree capability consumed by the engine.
//!
//! The engine never matches selectors itself. It asks a [`TreeAccess`]
//! implementation for candidates and applies only the text and visibility
//! criteria on top. Anything that can answer these questions (a real
//! rendered page, a virtual DOM, [`crate::mock::MemoryTree`]) can back a
//! query chain.

use std::fmt;

use crate::value::{Element, Value};

/// Accessor for an externally owned, externally mutated tree
pub trait TreeAccess: Send + Sync + fmt::Debug {
    /// Descendants of `root` matching `selector`, in document order
    fn query_all(&self, root: Element, selector: &str) -> Vec<Element>;

    /// Text content of an element and its descendants
    fn text(&self, element: Element) -> String;

    /// Attribute value, if present
    fn attribute(&self, element: Element, name: &str) -> Option<String>;

    /// Whether the tree considers the element visible
    fn is_visible(&self, element: Element) -> bool;

    /// Nearest enclosing form
    fn parent_form(&self, element: Element) -> Option<Element>;

    /// Submit a form
    fn submit(&self, form: Element);
}

/// Selection criteria for `find` and `containing`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criteria {
    /// Selector understood by the tree accessor
    pub selector: String,
    /// Required substring of the element's text
    pub text: Option<String>,
}

impl Criteria {
    /// Selector-only criteria
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            text: None,
        }
    }

    /// Also require the element's text to contain `text`
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Path description for a step using these criteria
    #[must_use]
    pub fn describe(&self, step: &str) -> String {
        match &self.text {
            Some(text) => format!("{step}('{}', text: '{text}')", self.selector),
            None => format!("{step}('{}')", self.selector),
        }
    }

    /// Matches of these criteria under `root`
    pub(crate) fn select(
        &self,
        tree: &dyn TreeAccess,
        root: Element,
        visible_only: bool,
    ) -> Vec<Element> {
        tree.query_all(root, &self.selector)
            .into_iter()
            .filter(|&element| !visible_only || tree.is_visible(element))
            .filter(|&element| {
                self.text
                    .as_deref()
                    .map_or(true, |text| tree.text(element).contains(text))
            })
            .collect()
    }
}

impl From<&str> for Criteria {
    fn from(selector: &str) -> Self {
        Self::css(selector)
    }
}

impl From<String> for Criteria {
    fn from(selector: String) -> Self {
        Self::css(selector)
    }
}

impl From<&String> for Criteria {
    fn from(selector: &String) -> Self {
        Self::css(selector.as_str())
    }
}

/// A borrowed element handed to `filter` and `map` callbacks
#[derive(Clone, Copy)]
pub struct ElementView<'a> {
    tree: &'a dyn TreeAccess,
    element: Element,
}

impl<'a> ElementView<'a> {
    /// View `element` through `tree`
    #[must_use]
    pub fn new(tree: &'a dyn TreeAccess, element: Element) -> Self {
        Self { tree, element }
    }

    /// The element handle
    #[must_use]
    pub const fn element(&self) -> Element {
        self.element
    }

    /// Text content
    #[must_use]
    pub fn text(&self) -> String {
        self.tree.text(self.element)
    }

    /// Attribute value
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.tree.attribute(self.element, name)
    }

    /// Whether the `class` attribute lists `class`
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    /// Whether the tree considers the element visible
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.tree.is_visible(self.element)
    }

    /// Descendants matching `selector`
    #[must_use]
    pub fn find(&self, selector: &str) -> Vec<Element> {
        self.tree.query_all(self.element, selector)
    }

    /// First descendant matching `selector`
    #[must_use]
    pub fn find_first(&self, selector: &str) -> Option<ElementView<'a>> {
        self.find(selector)
            .first()
            .map(|&element| ElementView::new(self.tree, element))
    }

    /// Nearest enclosing form
    #[must_use]
    pub fn parent_form(&self) -> Option<Element> {
        self.tree.parent_form(self.element)
    }
}

impl fmt::Debug for ElementView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementView")
            .field("element", &self.element)
            .finish_non_exhaustive()
    }
}

/// The current value handed to `transform`, `expect` and `action` callbacks
#[derive(Clone, Copy)]
pub struct Items<'a> {
    tree: &'a dyn TreeAccess,
    value: &'a Value,
}

impl<'a> Items<'a> {
    /// Wrap `value`, resolving elements through `tree`
    #[must_use]
    pub fn new(tree: &'a dyn TreeAccess, value: &'a Value) -> Self {
        Self { tree, value }
    }

    /// The raw value
    #[must_use]
    pub const fn value(&self) -> &'a Value {
        self.value
    }

    /// Elements of the value; empty for scalars
    #[must_use]
    pub fn elements(&self) -> &'a [Element] {
        self.value.elements().unwrap_or(&[])
    }

    /// Number of items, as shown on the path
    #[must_use]
    pub fn len(&self) -> usize {
        self.value.count()
    }

    /// Whether there are no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<ElementView<'a>> {
        self.elements()
            .get(index)
            .map(|&element| ElementView::new(self.tree, element))
    }

    /// Every element, viewed through the tree
    pub fn views(&self) -> impl Iterator<Item = ElementView<'a>> + 'a {
        let tree = self.tree;
        self.elements()
            .iter()
            .map(move |&element| ElementView::new(tree, element))
    }

    /// Text of every element
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.views().map(|view| view.text()).collect()
    }

    /// String content of scalar data
    #[must_use]
    pub fn as_str(&self) -> Option<&'a str> {
        self.value.as_str()
    }

    /// The tree the elements belong to
    #[must_use]
    pub fn tree(&self) -> &'a dyn TreeAccess {
        self.tree
    }
}

impl fmt::Debug for Items<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Items")
            .field("value", self.value)
            .finish_non_exhaustive()
    }
}

/// Stand-in accessor for chains that never configured a tree.
///
/// Only reachable from callbacks over `input` data; every query is empty.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DetachedTree;

impl TreeAccess for DetachedTree {
    fn query_all(&self, _root: Element, _selector: &str) -> Vec<Element> {
        Vec::new()
    }

    fn text(&self, _element: Element) -> String {
        String::new()
    }

    fn attribute(&self, _element: Element, _name: &str) -> Option<String> {
        None
    }

    fn is_visible(&self, _element: Element) -> bool {
        false
    }

    fn parent_form(&self, _element: Element) -> Option<Element> {
        None
    }

    fn submit(&self, _form: Element) {}
}
