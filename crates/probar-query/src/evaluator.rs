//! Single attempts of a chain.
//!
//! The evaluator walks a chain from its Input head to its tail, threading
//! the current [`Value`] through each step and recording a [`Path`] entry
//! for every step that produces items. The first failing step stops the
//! walk; the error leaves with the path recorded so far.

use tracing::trace;

use crate::action::ActionGuard;
use crate::combinator;
use crate::options::Options;
use crate::path::Path;
use crate::query::{NodeKind, Query, QueryNode};
use crate::result::{QueryError, QueryResult};
use crate::tree::{DetachedTree, ElementView, Items, TreeAccess};
use crate::value::{Element, Value};

/// Result and path of one attempt, before the path is attached
#[derive(Debug)]
pub(crate) struct Outcome {
    pub(crate) result: QueryResult<Value>,
    pub(crate) path: Path,
}

/// Performs attempts on behalf of one terminal call
#[derive(Debug)]
pub struct Evaluator<'g> {
    guard: &'g mut ActionGuard,
}

impl<'g> Evaluator<'g> {
    /// Evaluator replaying actions through `guard`
    pub fn new(guard: &'g mut ActionGuard) -> Self {
        Self { guard }
    }

    /// One attempt of `query` from its own input
    pub fn evaluate(&mut self, query: &Query) -> QueryResult<Value> {
        self.evaluate_chain(query, None)
    }

    /// One attempt of `query`, feeding `input` to a combinator placeholder
    /// head
    pub fn evaluate_from(&mut self, query: &Query, input: &Value) -> QueryResult<Value> {
        self.evaluate_chain(query, Some(input))
    }

    fn evaluate_chain(&mut self, query: &Query, input: Option<&Value>) -> QueryResult<Value> {
        let Outcome { result, path } = self.run_chain(query, input);
        result.map_err(|error| error.with_path(path))
    }

    /// Walk the chain without attaching the path to a failure
    pub(crate) fn run_chain(&mut self, query: &Query, input: Option<&Value>) -> Outcome {
        let mut options = Options::defaults();
        let mut path = Path::new();
        let mut current = Value::empty();

        for node in query.nodes() {
            options = options.apply(&node.options);
            if let NodeKind::Input(head) = &node.kind {
                current = head
                    .as_ref()
                    .or(input)
                    .cloned()
                    .unwrap_or_default();
                continue;
            }
            match self.step(node, &options, current, &mut path) {
                Ok(next) => current = next,
                Err(error) => {
                    trace!(step = %node.description, %error, "step failed");
                    return Outcome {
                        result: Err(error),
                        path,
                    };
                }
            }
        }

        Outcome {
            result: Ok(current),
            path,
        }
    }

    fn step(
        &mut self,
        node: &QueryNode,
        options: &Options,
        current: Value,
        path: &mut Path,
    ) -> QueryResult<Value> {
        let description = node.description.as_str();
        let next = match &node.kind {
            NodeKind::Input(_) => return Ok(current),
            NodeKind::Select(criteria) => {
                let tree = attached(options)?;
                let found: Vec<Element> = elements(&current, description)?
                    .iter()
                    .flat_map(|&root| criteria.select(tree, root, options.visible_only))
                    .collect();
                Value::Elements(found)
            }
            NodeKind::Containing(criteria) => {
                let tree = attached(options)?;
                let kept: Vec<Element> = elements(&current, description)?
                    .iter()
                    .copied()
                    .filter(|&outer| !criteria.select(tree, outer, options.visible_only).is_empty())
                    .collect();
                Value::Elements(kept)
            }
            NodeKind::Filter(predicate) => {
                let tree = attached(options)?;
                let mut kept = Vec::new();
                for &element in elements(&current, description)? {
                    if predicate(ElementView::new(tree, element)).map_err(QueryError::assertion)? {
                        kept.push(element);
                    }
                }
                Value::Elements(kept)
            }
            NodeKind::Map(mapper) => {
                let tree = attached(options)?;
                let mapped: Vec<Element> = elements(&current, description)?
                    .iter()
                    .filter_map(|&element| mapper(ElementView::new(tree, element)))
                    .collect();
                Value::Elements(mapped)
            }
            NodeKind::Transform(transform) => transform(Items::new(detached(options), &current))?,
            NodeKind::Expect(check) => {
                check(Items::new(detached(options), &current))?;
                return Ok(current);
            }
            NodeKind::Action(effect) => {
                let tree = detached(options);
                return self.guard.invoke(node.id, || {
                    effect(Items::new(tree, &current))?;
                    Ok(current.clone())
                });
            }
            NodeKind::Concat(subs) => return combinator::concat(self, subs, &current, path),
            NodeKind::FirstOf(subs) => {
                return combinator::first_of(self, subs, &current, path);
            }
            NodeKind::Detect(subs) => return combinator::detect(self, subs, &current, path),
        };

        trace!(step = description, found = next.count(), "step evaluated");
        path.record(description, next.count());
        Ok(next)
    }
}

/// Tree for element-only steps
fn attached(options: &Options) -> QueryResult<&dyn TreeAccess> {
    options
        .tree
        .as_deref()
        .ok_or_else(|| QueryError::invalid_chain("no tree accessor configured"))
}

/// Tree for callbacks that may run over plain input data
fn detached(options: &Options) -> &dyn TreeAccess {
    options.tree.as_deref().unwrap_or(&DetachedTree)
}

fn elements<'v>(value: &'v Value, step: &str) -> QueryResult<&'v [Element]> {
    value.elements().ok_or_else(|| {
        QueryError::invalid_chain(format!("{step} needs elements, found a transformed value"))
    })
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::mock::{MemoryTree, Node};
    use crate::result::ErrorKind;

    fn attempt(query: &Query) -> QueryResult<Value> {
        let mut guard = ActionGuard::new();
        Evaluator::new(&mut guard).evaluate(query)
    }

    fn contacts() -> MemoryTree {
        let tree = MemoryTree::new();
        let root = tree.root();
        tree.append(
            root,
            Node::new("div").class("container").child(
                Node::new("div")
                    .class("contact")
                    .child(Node::new("div").class("name").text("Sally"))
                    .child(Node::new("div").class("address").text("32 Yellow Drive")),
            ),
        );
        tree.append(
            root,
            Node::new("div").class("contact").child(Node::new("div").class("name").text("Bob")),
        );
        tree
    }

    mod step_tests {
        use super::*;

        #[test]
        fn test_select_concatenates_per_input() {
            let tree = contacts();
            let value = attempt(&tree.query().find(".contact").find(".name")).unwrap();
            assert_eq!(value.count(), 2);
            assert_eq!(value.into_elements().unwrap(), tree.query_all(tree.root(), ".name"));
        }

        #[test]
        fn test_duplicates_are_kept() {
            let tree = contacts();
            let container = tree.query_all(tree.root(), ".container")[0];
            let value = attempt(&tree.query().scope(vec![container, container]).find(".name")).unwrap();
            assert_eq!(value.count(), 2);
        }

        #[test]
        fn test_containing_keeps_outer_element() {
            let tree = contacts();
            let value = attempt(&tree.query().find(".contact").containing(".address")).unwrap();
            let contact = tree.query_all(tree.root(), ".contact")[0];
            assert_eq!(value, Value::from(contact));
        }

        #[test]
        fn test_map_drops_none() {
            let tree = contacts();
            let value = attempt(
                &tree
                    .query()
                    .find(".contact")
                    .map(|contact| contact.find(".address").first().copied()),
            )
            .unwrap();
            assert_eq!(value.count(), 1);
        }

        #[test]
        fn test_transform_produces_scalar() {
            let tree = contacts();
            let value = attempt(
                &tree
                    .query()
                    .find(".name")
                    .transform(|names| names.texts().join(", ")),
            )
            .unwrap();
            assert_eq!(value.as_str(), Some("Sally, Bob"));
        }

        #[test]
        fn test_expect_passes_value_through() {
            let tree = contacts();
            let query = tree.query().find(".name").expect(|names| {
                if names.len() == 2 {
                    Ok(())
                } else {
                    Err("expected two names".to_string())
                }
            });
            assert_eq!(attempt(&query).unwrap().count(), 2);
        }
    }

    mod failure_tests {
        use super::*;

        #[test]
        fn test_path_shows_where_chain_diverged() {
            let tree = MemoryTree::new();
            tree.append(
                tree.root(),
                Node::new("div")
                    .class("container")
                    .child(Node::new("div").class("contact").text("no .name"))
                    .child(Node::new("div").class("contact")),
            );
            let query = tree
                .query()
                .find(".container")
                .find(".contact")
                .find(".name")
                .should_have_elements(1);

            assert_eq!(
                attempt(&query).unwrap_err().to_string(),
                "expected 1 element, found 0 (found: path(find('.container') [1], find('.contact') [2], find('.name') [0]))"
            );
        }

        #[test]
        fn test_later_steps_are_skipped() {
            let tree = contacts();
            let query = tree
                .query()
                .find(".missing")
                .should_exist()
                .action(|_| panic!("must not run"));
            let error = attempt(&query).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::NoMatch);
            assert_eq!(error.path().len(), 1);
        }

        #[test]
        fn test_try_filter_error_fails_attempt() {
            let tree = contacts();
            let query = tree
                .query()
                .find(".name")
                .try_filter(|_| Err("cannot read".to_string()), "readable");
            let error = attempt(&query).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::AssertionFailed);
            assert_eq!(error.message(), "cannot read");
        }

        #[test]
        fn test_find_after_scalar_is_invalid() {
            let tree = contacts();
            let query = tree.query().transform(|_| "x").find(".name");
            let error = attempt(&query).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::InvalidChain);
            assert!(error.is_fatal());
        }

        #[test]
        fn test_find_without_tree_is_invalid() {
            let error = attempt(&Query::new().find(".a")).unwrap_err();
            assert_eq!(error.message(), "no tree accessor configured");
        }

        #[test]
        fn test_input_data_needs_no_tree() {
            let query = Query::new()
                .input("a")
                .transform(|items| format!("{}b", items.as_str().unwrap_or_default()));
            assert_eq!(attempt(&query).unwrap().as_str(), Some("ab"));
        }
    }

    mod determinism_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_attempts_repeat_on_unchanged_tree(
                classes in prop::collection::vec(0usize..3, 0..12),
                wanted in 0usize..3,
                expected in 0usize..4,
            ) {
                let tree = MemoryTree::new();
                for class in &classes {
                    tree.append(tree.root(), Node::new("div").class(&format!("c{class}")));
                }
                let query = tree
                    .query()
                    .find(format!(".c{wanted}"))
                    .should_have_elements(expected);

                let first = attempt(&query).map_err(|e| e.to_string());
                let second = attempt(&query).map_err(|e| e.to_string());
                prop_assert_eq!(first, second);
            }
        }
    }
}
