//! In-memory element tree.
//!
//! Nodes live in an arena behind a shared lock; clones of a [`MemoryTree`]
//! see the same nodes, so a test can keep one handle for mutations while a
//! query chain holds another.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use super::selector::{Matchable, Selector};
use crate::query::Query;
use crate::tree::TreeAccess;
use crate::value::Element;

/// Builder for a node and its subtree
#[derive(Debug, Clone, Default)]
pub struct Node {
    tag: String,
    attributes: Vec<(String, String)>,
    text: String,
    hidden: bool,
    children: Vec<Node>,
}

impl Node {
    /// Element with tag name `tag`
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    /// Add one or more space-separated classes
    #[must_use]
    pub fn class(self, class: impl Into<String>) -> Self {
        let class = class.into();
        let classes = match self.attr_value("class") {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class,
        };
        self.attr("class", classes)
    }

    /// Set the `id` attribute
    #[must_use]
    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    /// Set an attribute, replacing any previous value
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
        self
    }

    /// Set the node's own text
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Mark the node hidden
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Append a child
    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    fn attr_value(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug)]
struct Slot {
    tag: String,
    attributes: Vec<(String, String)>,
    text: String,
    hidden: bool,
    parent: Option<usize>,
    children: Vec<usize>,
}

#[derive(Debug)]
struct TreeData {
    slots: Vec<Slot>,
    submissions: Vec<Element>,
}

const ROOT: usize = 0;

impl TreeData {
    fn new() -> Self {
        Self {
            slots: vec![Slot {
                tag: "body".to_string(),
                attributes: Vec::new(),
                text: String::new(),
                hidden: false,
                parent: None,
                children: Vec::new(),
            }],
            submissions: Vec::new(),
        }
    }

    fn slot(&self, element: Element) -> Option<&Slot> {
        usize::try_from(element.id())
            .ok()
            .and_then(|index| self.slots.get(index))
    }

    fn insert(&mut self, parent: Option<usize>, node: Node) -> usize {
        let index = self.slots.len();
        self.slots.push(Slot {
            tag: node.tag,
            attributes: node.attributes,
            text: node.text,
            hidden: node.hidden,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.slots[parent].children.push(index);
        }
        for child in node.children {
            self.insert(Some(index), child);
        }
        index
    }

    fn detach(&mut self, index: usize) {
        if let Some(parent) = self.slots[index].parent.take() {
            self.slots[parent].children.retain(|&child| child != index);
        }
    }

    /// Descendants of `index` in document order
    fn descendants(&self, index: usize) -> Vec<usize> {
        let mut found = Vec::new();
        let mut stack: Vec<usize> = self.slots[index].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            found.push(next);
            stack.extend(self.slots[next].children.iter().rev().copied());
        }
        found
    }

    fn ancestors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.slots[index].parent, |&up| self.slots[up].parent)
    }

    fn select(&self, root: usize, selector: &str) -> Vec<usize> {
        let Some(selector) = Selector::parse(selector) else {
            debug!(selector, "unsupported selector matches nothing");
            return Vec::new();
        };
        self.descendants(root)
            .into_iter()
            .filter(|&index| selector.matches(SlotRef { data: self, index }))
            .collect()
    }
}

#[derive(Clone, Copy)]
struct SlotRef<'a> {
    data: &'a TreeData,
    index: usize,
}

impl Matchable for SlotRef<'_> {
    fn tag(&self) -> &str {
        &self.data.slots[self.index].tag
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.data.slots[self.index]
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn parent(&self) -> Option<Self> {
        self.data.slots[self.index]
            .parent
            .map(|index| Self { index, ..*self })
    }
}

/// Shared, mutable in-memory tree implementing [`TreeAccess`]
#[derive(Debug, Clone)]
pub struct MemoryTree {
    data: Arc<RwLock<TreeData>>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    /// Tree holding only a `body` root
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(TreeData::new())),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TreeData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TreeData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn index_of(&self, element: Element) -> Option<usize> {
        let index = usize::try_from(element.id()).ok()?;
        (index < self.read().slots.len()).then_some(index)
    }

    /// The root element
    #[must_use]
    pub const fn root(&self) -> Element {
        Element::new(ROOT as u64)
    }

    /// Query chain scoped to the root of this tree
    #[must_use]
    pub fn query(&self) -> Query {
        Query::with_tree(Arc::new(self.clone())).scope_element(self.root())
    }

    /// Insert `node` as the last child of `parent`.
    ///
    /// An unknown `parent` leaves the new subtree detached.
    pub fn append(&self, parent: Element, node: Node) -> Element {
        let parent = self.index_of(parent);
        let index = self.write().insert(parent, node);
        Element::new(index as u64)
    }

    /// Detach `element` and its subtree
    pub fn remove(&self, element: Element) {
        if let Some(index) = self.index_of(element) {
            if index != ROOT {
                self.write().detach(index);
            }
        }
    }

    /// Detach every element matching `selector`; returns how many
    pub fn remove_matching(&self, selector: &str) -> usize {
        let mut data = self.write();
        let matched = data.select(ROOT, selector);
        for &index in &matched {
            data.detach(index);
        }
        matched.len()
    }

    /// Replace the own text of `element`
    pub fn set_text(&self, element: Element, text: impl Into<String>) {
        if let Some(index) = self.index_of(element) {
            self.write().slots[index].text = text.into();
        }
    }

    /// Show or hide `element`
    pub fn set_hidden(&self, element: Element, hidden: bool) {
        if let Some(index) = self.index_of(element) {
            self.write().slots[index].hidden = hidden;
        }
    }

    /// Forms submitted so far, in order
    #[must_use]
    pub fn submissions(&self) -> Vec<Element> {
        self.read().submissions.clone()
    }
}

impl TreeAccess for MemoryTree {
    fn query_all(&self, root: Element, selector: &str) -> Vec<Element> {
        let Some(root) = self.index_of(root) else {
            return Vec::new();
        };
        self.read()
            .select(root, selector)
            .into_iter()
            .map(|index| Element::new(index as u64))
            .collect()
    }

    fn text(&self, element: Element) -> String {
        let Some(index) = self.index_of(element) else {
            return String::new();
        };
        let data = self.read();
        std::iter::once(index)
            .chain(data.descendants(index))
            .map(|i| data.slots[i].text.as_str())
            .collect()
    }

    fn attribute(&self, element: Element, name: &str) -> Option<String> {
        let data = self.read();
        data.slot(element)?
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn is_visible(&self, element: Element) -> bool {
        let Some(index) = self.index_of(element) else {
            return false;
        };
        let data = self.read();
        let mut chain = std::iter::once(index).chain(data.ancestors(index));
        let mut attached = index == ROOT;
        let visible = chain.all(|i| {
            attached |= i == ROOT;
            !data.slots[i].hidden
        });
        visible && attached
    }

    fn parent_form(&self, element: Element) -> Option<Element> {
        let index = self.index_of(element)?;
        let data = self.read();
        let form = data
            .ancestors(index)
            .find(|&up| data.slots[up].tag == "form");
        form.map(|up| Element::new(up as u64))
    }

    fn submit(&self, form: Element) {
        debug!(%form, "form submitted");
        self.write().submissions.push(form);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> MemoryTree {
        let tree = MemoryTree::new();
        tree.append(
            tree.root(),
            Node::new("form")
                .id("login")
                .child(Node::new("div").class("row").child(Node::new("input").attr("name", "user")))
                .child(Node::new("button").text("Log ").child(Node::new("b").text("in"))),
        );
        tree.append(tree.root(), Node::new("input").class("search"));
        tree
    }

    #[test]
    fn test_document_order() {
        let tree = page();
        let all = tree.query_all(tree.root(), "*");
        let tags: Vec<String> = all
            .iter()
            .map(|&e| tree.read().slot(e).unwrap().tag.clone())
            .collect();
        assert_eq!(tags, ["form", "div", "input", "button", "b", "input"]);
    }

    #[test]
    fn test_scoped_query_may_use_outer_ancestors() {
        let tree = page();
        let row = tree.query_all(tree.root(), ".row")[0];
        assert_eq!(tree.query_all(row, "form input").len(), 1);
        assert!(tree.query_all(row, "form").is_empty());
    }

    #[test]
    fn test_text_includes_descendants() {
        let tree = page();
        let button = tree.query_all(tree.root(), "button")[0];
        assert_eq!(tree.text(button), "Log in");
    }

    #[test]
    fn test_parent_form() {
        let tree = page();
        let inputs = tree.query_all(tree.root(), "input");
        let form = tree.query_all(tree.root(), "#login")[0];
        assert_eq!(tree.parent_form(inputs[0]), Some(form));
        assert_eq!(tree.parent_form(inputs[1]), None);
        assert_eq!(tree.parent_form(form), None);
    }

    #[test]
    fn test_visibility_follows_ancestors_and_attachment() {
        let tree = page();
        let form = tree.query_all(tree.root(), "form")[0];
        let input = tree.query_all(tree.root(), "[name=user]")[0];
        assert!(tree.is_visible(input));

        tree.set_hidden(form, true);
        assert!(!tree.is_visible(input));
        tree.set_hidden(form, false);

        tree.remove(form);
        assert!(!tree.is_visible(input));
        assert!(tree.query_all(tree.root(), "input").len() == 1);
    }

    #[test]
    fn test_remove_matching() {
        let tree = page();
        assert_eq!(tree.remove_matching("input"), 2);
        assert!(tree.query_all(tree.root(), "input").is_empty());
        assert_eq!(tree.remove_matching("input"), 0);
    }

    #[test]
    fn test_class_builder_accumulates() {
        let tree = MemoryTree::new();
        let e = tree.append(tree.root(), Node::new("div").class("a").class("b c"));
        assert_eq!(tree.attribute(e, "class").as_deref(), Some("a b c"));
        assert_eq!(tree.query_all(tree.root(), ".a.c"), vec![e]);
    }

    #[test]
    fn test_clones_share_nodes() {
        let tree = MemoryTree::new();
        let other = tree.clone();
        other.append(other.root(), Node::new("p"));
        assert_eq!(tree.query_all(tree.root(), "p").len(), 1);

        let p = tree.query_all(tree.root(), "p")[0];
        tree.submit(p);
        assert_eq!(other.submissions(), vec![p]);
    }

    #[test]
    fn test_unknown_elements_are_inert() {
        let tree = MemoryTree::new();
        let ghost = Element::new(999);
        assert!(tree.query_all(ghost, "*").is_empty());
        assert_eq!(tree.text(ghost), "");
        assert!(!tree.is_visible(ghost));
        let orphan = tree.append(ghost, Node::new("div"));
        assert!(!tree.is_visible(orphan));
    }
}
