//! Steps that evaluate sub-chains: `concat`, `firstOf` and `detect`.
//!
//! Within one attempt sub-chains run one after another in listed order,
//! each against the combinator's current value. A sub-chain's own path is
//! nested under the combinator's entry; failures re-raise with only the
//! kind and message so the outer chain's path is the one attached.

use tracing::trace;

use crate::evaluator::{Evaluator, Outcome};
use crate::path::{Branch, Nested, Path, PathEntry};
use crate::query::Query;
use crate::result::{QueryError, QueryResult};
use crate::value::Value;

/// Every sub-chain must succeed; element results are joined in listed order.
///
/// All sub-chains are evaluated so the failure path shows each of them.
/// The first failure decides the error; a fatal one stops evaluation.
pub(crate) fn concat(
    evaluator: &mut Evaluator<'_>,
    subs: &[Query],
    input: &Value,
    path: &mut Path,
) -> QueryResult<Value> {
    let mut paths = Vec::with_capacity(subs.len());
    let mut combined = Vec::new();
    let mut first_failure: Option<QueryError> = None;

    for sub in subs {
        let Outcome {
            result,
            path: sub_path,
        } = evaluator.run_chain(sub, Some(input));
        paths.push(sub_path);

        let failure = match result {
            Ok(Value::Elements(elements)) => {
                combined.extend(elements);
                continue;
            }
            Ok(_) => QueryError::invalid_chain("concat needs elements, found a transformed value"),
            Err(error) => error,
        };
        if failure.is_fatal() {
            path.push(PathEntry::nested("concat", 0, Nested::Sequence(paths)));
            return Err(rethrow(&failure));
        }
        first_failure.get_or_insert(failure);
    }

    if let Some(failure) = first_failure {
        path.push(PathEntry::nested("concat", 0, Nested::Sequence(paths)));
        return Err(rethrow(&failure));
    }

    trace!(found = combined.len(), "concat evaluated");
    path.push(PathEntry::nested(
        "concat",
        combined.len(),
        Nested::Sequence(paths),
    ));
    Ok(Value::Elements(combined))
}

/// Value of the first sub-chain that succeeds
pub(crate) fn first_of(
    evaluator: &mut Evaluator<'_>,
    subs: &[Query],
    input: &Value,
    path: &mut Path,
) -> QueryResult<Value> {
    let branches: Vec<(Option<&str>, &Query)> = subs.iter().map(|sub| (None, sub)).collect();
    let (_, value) = race(evaluator, "firstOf", &branches, input, path)?;
    Ok(value)
}

/// Key and value of the first keyed sub-chain that succeeds
pub(crate) fn detect(
    evaluator: &mut Evaluator<'_>,
    subs: &[(String, Query)],
    input: &Value,
    path: &mut Path,
) -> QueryResult<Value> {
    let branches: Vec<(Option<&str>, &Query)> = subs
        .iter()
        .map(|(key, sub)| (Some(key.as_str()), sub))
        .collect();
    let (winner, value) = race(evaluator, "detect", &branches, input, path)?;
    Ok(Value::Detected {
        key: subs[winner].0.clone(),
        value: Box::new(value),
    })
}

fn race(
    evaluator: &mut Evaluator<'_>,
    name: &str,
    subs: &[(Option<&str>, &Query)],
    input: &Value,
    path: &mut Path,
) -> QueryResult<(usize, Value)> {
    if subs.iter().any(|(_, sub)| !sub.has_terminal()) {
        return Err(QueryError::no_terminal());
    }

    let mut failures = Vec::with_capacity(subs.len());
    for (index, (key, sub)) in subs.iter().enumerate() {
        let Outcome {
            result,
            path: sub_path,
        } = evaluator.run_chain(sub, Some(input));
        match result {
            Ok(value) => {
                trace!(combinator = name, winner = index, "sub-query succeeded");
                path.record(name, value.count());
                return Ok((index, value));
            }
            Err(error) if error.is_fatal() => return Err(rethrow(&error)),
            Err(error) => failures.push(Branch {
                key: key.map(str::to_string),
                error: error.with_path(sub_path),
            }),
        }
    }

    path.push(PathEntry::nested(name, 0, Nested::Alternatives(failures)));
    Err(QueryError::all_failed(name))
}

/// A sub-chain failure raised at the combinator's own step
fn rethrow(error: &QueryError) -> QueryError {
    QueryError::new(error.kind(), error.message())
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::action::ActionGuard;
    use crate::mock::{MemoryTree, Node};
    use crate::result::ErrorKind;
    use crate::tree::TreeAccess;

    fn attempt(query: &Query) -> QueryResult<Value> {
        let mut guard = ActionGuard::new();
        Evaluator::new(&mut guard).evaluate(query)
    }

    fn abc() -> MemoryTree {
        let tree = MemoryTree::new();
        let root = tree.root();
        tree.append(root, Node::new("div").class("b").text("B"));
        tree.append(root, Node::new("div").class("a").text("A"));
        tree.append(root, Node::new("div").class("c").text("C"));
        tree
    }

    mod concat_tests {
        use super::*;

        #[test]
        fn test_listed_order_wins_over_document_order() {
            let tree = abc();
            let a = tree.query_all(tree.root(), ".a")[0];
            let b = tree.query_all(tree.root(), ".b")[0];
            let value = attempt(&tree.query().concat(|q| vec![q.find(".a"), q.find(".b")])).unwrap();
            assert_eq!(value, Value::from(vec![a, b]));
        }

        #[test]
        fn test_path_nests_sub_paths() {
            let tree = abc();
            let query = tree
                .query()
                .concat(|q| vec![q.find(".a"), q.find(".b")])
                .find(".child")
                .should_exist();
            assert_eq!(
                attempt(&query).unwrap_err().to_string(),
                "expected one or more elements, found 0 (found: path(concat(find('.a') [1], find('.b') [1]) [2], find('.child') [0]))"
            );
        }

        #[test]
        fn test_failing_sub_chain_fails_concat() {
            let tree = abc();
            let query = tree
                .query()
                .concat(|q| vec![q.find(".a"), q.find(".z").should_exist(), q.find(".c")]);
            let error = attempt(&query).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::NoMatch);
            assert_eq!(
                error.to_string(),
                "expected one or more elements, found 0 (found: path(concat(find('.a') [1], find('.z') [0], find('.c') [1]) [0]))"
            );
        }

        #[test]
        fn test_later_sub_chains_still_reported() {
            let tree = abc();
            let query = tree.query().concat(|q| {
                vec![
                    q.find(".z").should_exist(),
                    q.find(".a"),
                    q.find(".y").should_exist(),
                ]
            });
            let error = attempt(&query).unwrap_err();
            assert_eq!(error.message(), "expected one or more elements, found 0");
            assert_eq!(
                error.to_string(),
                "expected one or more elements, found 0 (found: path(concat(find('.z') [0], find('.a') [1], find('.y') [0]) [0]))"
            );
        }

        #[test]
        fn test_fatal_sub_chain_stops_concat() {
            let tree = abc();
            let query = tree.query().concat(|q| {
                vec![
                    q.find(".a").transform(|_| "text"),
                    q.find(".b").action(|_| panic!("not reached")),
                ]
            });
            let error = attempt(&query).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::InvalidChain);
            assert_eq!(
                error.to_string(),
                "concat needs elements, found a transformed value (found: path(concat(find('.a') [1], transform [1]) [0]))"
            );
        }

        #[test]
        fn test_sub_chains_share_input() {
            let tree = MemoryTree::new();
            let outer = tree.append(
                tree.root(),
                Node::new("div")
                    .class("outer")
                    .child(Node::new("span").class("x"))
                    .child(Node::new("span").class("y")),
            );
            tree.append(tree.root(), Node::new("span").class("x"));

            let value = attempt(
                &tree
                    .query()
                    .find(".outer")
                    .concat(|q| vec![q.find(".y"), q.find(".x")]),
            )
            .unwrap();
            let inside = tree.query_all(outer, "span");
            assert_eq!(value, Value::from(vec![inside[1], inside[0]]));
        }
    }

    mod first_of_tests {
        use super::*;

        #[test]
        fn test_first_listed_success_wins() {
            let tree = abc();
            let c = tree.query_all(tree.root(), ".c")[0];
            let query = tree.query().first_of(|q| {
                vec![
                    q.find(".z").should_exist(),
                    q.find(".c").should_exist(),
                    q.find(".a").action(|_| panic!("short-circuited")),
                ]
            });
            assert_eq!(attempt(&query).unwrap(), Value::from(c));
        }

        #[test]
        fn test_all_failed_lists_every_branch() {
            let tree = MemoryTree::new();
            tree.append(
                tree.root(),
                Node::new("div").class("content").child(Node::new("div").class("c")),
            );
            let query = tree
                .query()
                .find(".content")
                .first_of(|q| vec![q.find(".a").should_exist(), q.find(".b").should_exist()]);

            let error = attempt(&query).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::AllFailed);
            assert_eq!(
                error.to_string(),
                "all queries failed in firstOf (found: path(find('.content') [1], firstOf(expected one or more elements, found 0 (found: find('.a') [0]), expected one or more elements, found 0 (found: find('.b') [0])) [0]))"
            );
        }

        #[test]
        fn test_sub_chain_without_terminal_is_fatal() {
            let tree = abc();
            let query = tree
                .query()
                .first_of(|q| vec![q.find(".a"), q.find(".b").should_exist()]);
            let error = attempt(&query).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::NoTerminal);
            assert_eq!(error.message(), "no expectations or actions in query");
        }

        #[test]
        fn test_nested_combinator_counts_as_terminal() {
            let tree = abc();
            let b = tree.query_all(tree.root(), ".b")[0];
            let query = tree.query().first_of(|q| {
                vec![q.first_of(|inner| vec![inner.find(".b").should_exist()])]
            });
            assert_eq!(attempt(&query).unwrap(), Value::from(b));
        }
    }

    mod detect_tests {
        use super::*;

        #[test]
        fn test_yields_key_and_value() {
            let tree = abc();
            let b = tree.query_all(tree.root(), ".b")[0];
            let query = tree.query().detect(|q| {
                vec![
                    ("x", q.find(".x").should_exist()),
                    ("b", q.find(".b").should_exist()),
                ]
            });
            assert_eq!(
                attempt(&query).unwrap(),
                Value::Detected {
                    key: "b".to_string(),
                    value: Box::new(Value::from(b)),
                }
            );
        }

        #[test]
        fn test_failures_are_keyed() {
            let tree = MemoryTree::new();
            tree.append(tree.root(), Node::new("div").class("content"));
            let query = tree.query().find(".content").detect(|q| {
                vec![
                    ("a", q.find(".a").should_exist()),
                    ("b", q.find(".b").should_exist()),
                ]
            });
            assert_eq!(
                attempt(&query).unwrap_err().to_string(),
                "all queries failed in detect (found: path(find('.content') [1], detect(a: expected one or more elements, found 0 (found: find('.a') [0]), b: expected one or more elements, found 0 (found: find('.b') [0])) [0]))"
            );
        }

        #[test]
        fn test_missing_terminal_is_fatal() {
            let tree = abc();
            let query = tree
                .query()
                .detect(|q| vec![("a", q.find(".a")), ("b", q.find(".b").should_exist())]);
            assert_eq!(attempt(&query).unwrap_err().kind(), ErrorKind::NoTerminal);
        }
    }
}
