//! Immutable query chains.
//!
//! A [`Query`] is the tail of a singly linked list of [`QueryNode`]s, read
//! from tail back to its Input head. Every builder returns a new tail and
//! leaves the receiver untouched, so chains can be reused and shared:
//!
//! ```no_run
//! # use probar_query::prelude::*;
//! # async fn demo(page: Query) -> QueryResult<()> {
//! let names = page.find(".contact").find(".name");
//! let sally = names.filter(|name| name.text() == "Sally").should_have_elements(1);
//! let anyone = names.should_exist();
//!
//! sally.then().await?;
//! anyone.then().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Building a chain never touches the tree. Evaluation happens only when a
//! terminal is called: [`Query::result`] for a single attempt against the
//! present state, or [`Query::then`] (or `.await`) to poll until the chain
//! holds or times out.

use std::fmt;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::options::{Options, OptionsOverride};
use crate::result::{QueryError, QueryResult};
use crate::scheduler;
use crate::tree::{Criteria, ElementView, Items, TreeAccess};
use crate::value::{Element, Value};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one node, unique per process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

pub(crate) type FilterFn = Arc<dyn Fn(ElementView<'_>) -> Result<bool, String> + Send + Sync>;
pub(crate) type MapFn = Arc<dyn Fn(ElementView<'_>) -> Option<Element> + Send + Sync>;
pub(crate) type TransformFn = Arc<dyn Fn(Items<'_>) -> QueryResult<Value> + Send + Sync>;
pub(crate) type CheckFn = Arc<dyn Fn(Items<'_>) -> QueryResult<()> + Send + Sync>;

/// Operation performed by a node
#[derive(Clone)]
pub(crate) enum NodeKind {
    /// Chain head. `None` is the placeholder of a combinator sub-chain,
    /// which receives the combinator's current value.
    Input(Option<Value>),
    Select(Criteria),
    Containing(Criteria),
    Filter(FilterFn),
    Map(MapFn),
    Transform(TransformFn),
    Expect(CheckFn),
    Action(CheckFn),
    Concat(Vec<Query>),
    FirstOf(Vec<Query>),
    Detect(Vec<(String, Query)>),
}

impl NodeKind {
    /// Steps that make a combinator sub-chain acceptable
    const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Expect(_) | Self::Action(_) | Self::FirstOf(_) | Self::Detect(_)
        )
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Input(_) => "Input",
            Self::Select(_) => "Select",
            Self::Containing(_) => "Containing",
            Self::Filter(_) => "Filter",
            Self::Map(_) => "Map",
            Self::Transform(_) => "Transform",
            Self::Expect(_) => "Expect",
            Self::Action(_) => "Action",
            Self::Concat(_) => "Concat",
            Self::FirstOf(_) => "FirstOf",
            Self::Detect(_) => "Detect",
        }
    }
}

/// One immutable link of a chain
pub(crate) struct QueryNode {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) description: String,
    pub(crate) options: OptionsOverride,
    pub(crate) parent: Option<Query>,
}

impl fmt::Debug for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryNode")
            .field("id", &self.id)
            .field("kind", &self.kind.name())
            .field("description", &self.description)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// A chain of query steps, identified by its tail node
#[derive(Clone)]
pub struct Query {
    node: Arc<QueryNode>,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    /// Empty chain over an empty collection, with no tree configured
    #[must_use]
    pub fn new() -> Self {
        Self::head(Some(Value::empty()), OptionsOverride::new())
    }

    /// Empty chain selecting from `tree`
    #[must_use]
    pub fn with_tree(tree: Arc<dyn TreeAccess>) -> Self {
        Self::head(Some(Value::empty()), OptionsOverride::new().tree(tree))
    }

    fn head(input: Option<Value>, options: OptionsOverride) -> Self {
        Self {
            node: Arc::new(QueryNode {
                id: NodeId::next(),
                kind: NodeKind::Input(input),
                description: "input".to_string(),
                options,
                parent: None,
            }),
        }
    }

    fn push(&self, kind: NodeKind, description: impl Into<String>) -> Self {
        Self {
            node: Arc::new(QueryNode {
                id: NodeId::next(),
                kind,
                description: description.into(),
                options: OptionsOverride::new(),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Placeholder head for combinator sub-chains
    fn sub_chain(&self) -> Self {
        Self::head(None, OptionsOverride::from(self.get_options()))
    }

    /// Nodes from head to tail
    pub(crate) fn nodes(&self) -> Vec<&QueryNode> {
        let mut nodes = Vec::new();
        let mut current = Some(self);
        while let Some(query) = current {
            nodes.push(query.node.as_ref());
            current = query.node.parent.as_ref();
        }
        nodes.reverse();
        nodes
    }

    /// Identity of the tail node
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.node.id
    }

    /// Whether the chain ends in something that can fail on its own
    #[must_use]
    pub fn has_terminal(&self) -> bool {
        self.nodes().iter().any(|node| node.kind.is_terminal())
    }

    // -- entry points ------------------------------------------------------

    /// New chain over `elements`, keeping these options
    #[must_use]
    pub fn scope(&self, elements: impl Into<Vec<Element>>) -> Self {
        self.input(Value::Elements(elements.into()))
    }

    /// New chain over a single element, keeping these options
    #[must_use]
    pub fn scope_element(&self, element: Element) -> Self {
        self.scope(vec![element])
    }

    /// New chain over an arbitrary value, keeping these options
    #[must_use]
    pub fn input(&self, value: impl Into<Value>) -> Self {
        Self::head(Some(value.into()), OptionsOverride::from(self.get_options()))
    }

    /// Input the chain starts from; `None` for combinator sub-chains
    #[must_use]
    pub fn get_input(&self) -> Option<&Value> {
        let mut head = self;
        while let Some(parent) = &head.node.parent {
            head = parent;
        }
        match &head.node.kind {
            NodeKind::Input(input) => input.as_ref(),
            _ => None,
        }
    }

    /// Options in effect at the tail
    #[must_use]
    pub fn get_options(&self) -> Options {
        Options::resolve(self.nodes().into_iter().map(|node| &node.options))
    }

    /// Same chain with `options` layered over the tail's options
    #[must_use]
    pub fn options(&self, options: OptionsOverride) -> Self {
        let node = &self.node;
        Self {
            node: Arc::new(QueryNode {
                id: NodeId::next(),
                kind: node.kind.clone(),
                description: node.description.clone(),
                options: node.options.merge(&options),
                parent: node.parent.clone(),
            }),
        }
    }

    // -- selection ---------------------------------------------------------

    /// Descendants of every current element matching `criteria`
    #[must_use]
    pub fn find(&self, criteria: impl Into<Criteria>) -> Self {
        let criteria = criteria.into();
        let description = criteria.describe("find");
        self.push(NodeKind::Select(criteria), description)
    }

    /// Current elements with at least one descendant matching `criteria`
    #[must_use]
    pub fn containing(&self, criteria: impl Into<Criteria>) -> Self {
        let criteria = criteria.into();
        let description = criteria.describe("containing");
        self.push(NodeKind::Containing(criteria), description)
    }

    /// Keep elements for which `predicate` holds
    #[must_use]
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(ElementView<'_>) -> bool + Send + Sync + 'static,
    {
        self.filter_described(predicate, "filter")
    }

    /// [`Query::filter`] shown on the path as `description`
    #[must_use]
    pub fn filter_described<F>(&self, predicate: F, description: impl Into<String>) -> Self
    where
        F: Fn(ElementView<'_>) -> bool + Send + Sync + 'static,
    {
        self.push(
            NodeKind::Filter(Arc::new(move |view: ElementView<'_>| -> Result<bool, String> {
                Ok(predicate(view))
            })),
            description,
        )
    }

    /// Filter whose predicate may fail the attempt
    #[must_use]
    pub fn try_filter<F>(&self, predicate: F, description: impl Into<String>) -> Self
    where
        F: Fn(ElementView<'_>) -> Result<bool, String> + Send + Sync + 'static,
    {
        self.push(NodeKind::Filter(Arc::new(predicate)), description)
    }

    /// Replace each element; elements mapped to `None` are dropped
    #[must_use]
    pub fn map<F>(&self, mapper: F) -> Self
    where
        F: Fn(ElementView<'_>) -> Option<Element> + Send + Sync + 'static,
    {
        self.push(NodeKind::Map(Arc::new(mapper)), "map")
    }

    /// Replace the whole current value
    #[must_use]
    pub fn transform<F, T>(&self, transform: F) -> Self
    where
        F: Fn(Items<'_>) -> T + Send + Sync + 'static,
        T: Into<Value>,
    {
        self.push(
            NodeKind::Transform(Arc::new(move |items: Items<'_>| -> QueryResult<Value> {
                Ok(transform(items).into())
            })),
            "transform",
        )
    }

    /// [`Query::transform`] that may fail the attempt
    #[must_use]
    pub fn try_transform<F, T>(&self, transform: F) -> Self
    where
        F: Fn(Items<'_>) -> Result<T, String> + Send + Sync + 'static,
        T: Into<Value>,
    {
        self.push(
            NodeKind::Transform(Arc::new(move |items: Items<'_>| -> QueryResult<Value> {
                transform(items)
                    .map(Into::into)
                    .map_err(QueryError::assertion)
            })),
            "transform",
        )
    }

    // -- assertions --------------------------------------------------------

    /// Fail the attempt with the returned message unless `assertion` holds
    #[must_use]
    pub fn expect<F>(&self, assertion: F) -> Self
    where
        F: Fn(Items<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.push(
            NodeKind::Expect(Arc::new(move |items: Items<'_>| -> QueryResult<()> {
                assertion(items).map_err(QueryError::assertion)
            })),
            "expect",
        )
    }

    fn check<F>(&self, check: F, description: &str) -> Self
    where
        F: Fn(Items<'_>) -> QueryResult<()> + Send + Sync + 'static,
    {
        self.push(NodeKind::Expect(Arc::new(check)), description)
    }

    /// At least one item
    #[must_use]
    pub fn should_exist(&self) -> Self {
        self.check(
            |items| {
                if items.is_empty() {
                    Err(QueryError::none_found(items.len()))
                } else {
                    Ok(())
                }
            },
            "shouldExist",
        )
    }

    /// No items
    #[must_use]
    pub fn should_not_exist(&self) -> Self {
        self.check(
            |items| {
                if items.is_empty() {
                    Ok(())
                } else {
                    Err(QueryError::unexpected_elements())
                }
            },
            "shouldNotExist",
        )
    }

    /// Exactly `count` items
    #[must_use]
    pub fn should_have_elements(&self, count: usize) -> Self {
        self.check(
            move |items| {
                if items.len() == count {
                    Ok(())
                } else {
                    Err(QueryError::count_mismatch(count, items.len()))
                }
            },
            "shouldHaveElements",
        )
    }

    // -- actions -----------------------------------------------------------

    /// Run `effect` on the current items, at most once per terminal call.
    ///
    /// The step yields the items the effect ran on. An `Err` from the effect
    /// fails the call without retrying.
    #[must_use]
    pub fn action<F>(&self, effect: F) -> Self
    where
        F: Fn(Items<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.push(
            NodeKind::Action(Arc::new(move |items: Items<'_>| -> QueryResult<()> {
                effect(items).map_err(QueryError::action_failed)
            })),
            "action",
        )
    }

    /// Submit the enclosing form of the single current element
    #[must_use]
    pub fn submit(&self) -> Self {
        self.should_have_elements(1)
            .check(
                |items| match items.get(0).and_then(|view| view.parent_form()) {
                    Some(_) => Ok(()),
                    None => Err(QueryError::not_in_form()),
                },
                "inForm",
            )
            .push(
                NodeKind::Action(Arc::new(|items: Items<'_>| -> QueryResult<()> {
                    let form = items
                        .get(0)
                        .and_then(|view| view.parent_form())
                        .ok_or_else(QueryError::not_in_form)?;
                    items.tree().submit(form);
                    Ok(())
                })),
                "submit",
            )
    }

    /// Find one element matching `criteria` and submit its form
    #[must_use]
    pub fn submit_at(&self, criteria: impl Into<Criteria>) -> Self {
        self.find(criteria).submit()
    }

    // -- combinators -------------------------------------------------------

    /// Results of every sub-chain, concatenated in listed order
    #[must_use]
    pub fn concat<F>(&self, build: F) -> Self
    where
        F: FnOnce(&Self) -> Vec<Self>,
    {
        let subs = build(&self.sub_chain());
        self.push(NodeKind::Concat(subs), "concat")
    }

    /// Result of the first sub-chain, in listed order, that succeeds
    #[must_use]
    pub fn first_of<F>(&self, build: F) -> Self
    where
        F: FnOnce(&Self) -> Vec<Self>,
    {
        let subs = build(&self.sub_chain());
        self.push(NodeKind::FirstOf(subs), "firstOf")
    }

    /// Key and result of the first keyed sub-chain, in listed order, that
    /// succeeds
    #[must_use]
    pub fn detect<F, K>(&self, build: F) -> Self
    where
        F: FnOnce(&Self) -> Vec<(K, Self)>,
        K: Into<String>,
    {
        let subs = build(&self.sub_chain())
            .into_iter()
            .map(|(key, query)| (key.into(), query))
            .collect();
        self.push(NodeKind::Detect(subs), "detect")
    }

    // -- terminals ---------------------------------------------------------

    /// One attempt against the present state
    pub fn result(&self) -> QueryResult<Value> {
        scheduler::once(self)
    }

    /// One attempt requiring exactly one element
    pub fn element_result(&self) -> QueryResult<Element> {
        single(self.should_have_elements(1).result()?)
    }

    /// One attempt requiring at least one element
    pub fn elements_result(&self) -> QueryResult<Vec<Element>> {
        collection(self.should_exist().result()?)
    }

    /// Poll until the chain holds or the timeout elapses
    pub async fn then(&self) -> QueryResult<Value> {
        scheduler::poll(self.clone()).await
    }

    /// Poll until exactly one element matches
    pub async fn element(&self) -> QueryResult<Element> {
        single(self.should_have_elements(1).then().await?)
    }

    /// Poll until at least one element matches
    pub async fn elements(&self) -> QueryResult<Vec<Element>> {
        collection(self.should_exist().then().await?)
    }
}

fn single(value: Value) -> QueryResult<Element> {
    collection(value)?
        .first()
        .copied()
        .ok_or_else(|| QueryError::count_mismatch(1, 0))
}

fn collection(value: Value) -> QueryResult<Vec<Element>> {
    value
        .into_elements()
        .ok_or_else(|| QueryError::invalid_chain("expected elements, found a transformed value"))
}

impl IntoFuture for Query {
    type Output = QueryResult<Value>;
    type IntoFuture = BoxFuture<'static, QueryResult<Value>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(scheduler::poll(self))
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.nodes().into_iter().map(|node| &node.description))
            .finish()
    }
}
