//! Form submission through `submit` and `submit_at`.

use std::time::Duration;

use probar_query::mock::{MemoryTree, Node, TickHarness};
use probar_query::prelude::*;

fn login_form(tree: &MemoryTree) -> Element {
    tree.append(
        tree.root(),
        Node::new("form")
            .id("login")
            .child(Node::new("input").attr("name", "user"))
            .child(Node::new("button").attr("type", "submit").text("Log in")),
    )
}

#[tokio::test]
async fn submit_at_submits_enclosing_form_once() {
    let tree = MemoryTree::new();
    let form = login_form(&tree);
    let harness = TickHarness::default();

    let query = harness.bind(&tree.query().submit_at("input[name=user]"));
    let value = query.then().await.unwrap();

    assert_eq!(value.count(), 1);
    assert_eq!(tree.submissions(), vec![form]);
}

#[tokio::test]
async fn submit_waits_for_field() {
    let tree = MemoryTree::new();
    let form = tree.append(tree.root(), Node::new("form"));
    let harness = TickHarness::default();
    let query = harness.bind(&tree.query().find("form").submit_at(".late"));

    let writer = tree.clone();
    let (submitted, _) = tokio::join!(
        query.then(),
        harness.eventually(move || writer.append(form, Node::new("input").class("late")))
    );
    assert!(submitted.is_ok());
    assert_eq!(tree.submissions(), vec![form]);
}

#[tokio::test]
async fn submit_outside_form_times_out() {
    let tree = MemoryTree::new();
    tree.append(tree.root(), Node::new("input").class("loose"));
    let harness = TickHarness::new(Duration::from_millis(100));
    let query = harness.bind(
        &tree
            .query()
            .options(OptionsOverride::new().timeout_ms(200))
            .submit_at(".loose"),
    );

    let error = harness.drive(query.then()).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotInForm);
    assert_eq!(
        error.message(),
        "expected element to be inside a form for submit"
    );
    assert_eq!(error.metrics().unwrap().retries, 2);
    assert!(tree.submissions().is_empty());
}

#[test]
fn submit_on_scoped_element() {
    let tree = MemoryTree::new();
    let form = login_form(&tree);
    let button = tree.query_all(form, "button")[0];

    tree.query().scope_element(button).submit().result().unwrap();
    assert_eq!(tree.submissions(), vec![form]);
}

#[test]
fn submit_needs_exactly_one_element() {
    let tree = MemoryTree::new();
    let form = login_form(&tree);
    tree.append(form, Node::new("input").attr("name", "password"));

    let error = tree.query().submit_at("input").result().unwrap_err();
    assert_eq!(error.message(), "expected 1 element, found 2");
    assert!(tree.submissions().is_empty());
}
