mod common;

use common::{FakeStore, rows};
use graphsel::{Client, GraphselError, Settings};
use serde_json::json;

fn client(store: &FakeStore) -> Client {
    Client::new(Box::new(store.clone()), Settings::default())
}

#[test]
fn malformed_expression_fails_before_any_remote_call() {
    let store = FakeStore::new();
    store.queue(rows("devices", &["d1"]));
    let err = client(&store)
        .select("name")
        .using("nb.devices")
        .where_("name=")
        .expect_err("missing value must not parse");
    assert!(matches!(err, GraphselError::Parse { .. }), "{err}");
    assert!(store.calls().is_empty(), "no remote call for a malformed expression");
}

#[test]
fn parse_error_carries_a_position() {
    let store = FakeStore::new();
    let err = client(&store)
        .select("name")
        .using("nb.devices")
        .where_("name=x andand role=y")
        .expect_err("dangling operator");
    let GraphselError::Parse { line, col, .. } = err else {
        panic!("expected a parse error, got {err}");
    };
    assert!(line.is_some() && col.is_some());
}

#[test]
fn unknown_custom_field_is_rejected() {
    let store = FakeStore::new();
    // catalog is empty, so any cf_ reference is unknown
    let err = client(&store)
        .select("name")
        .using("nb.devices")
        .where_("cf_nonexistent=x")
        .expect_err("field missing from the catalog");
    assert!(matches!(err, GraphselError::UnknownField(_)), "{err}");
    assert!(store.calls().is_empty());
}

#[test]
fn remote_errors_propagate_instead_of_emptying_the_result() {
    let store = FakeStore::new();
    store.queue(json!({"errors": [{"message": "variable $name of the wrong type"}]}));
    let err = client(&store)
        .select("name")
        .using("nb.devices")
        .where_("name=x")
        .expect_err("error payload must surface");
    let GraphselError::Remote(message) = err else {
        panic!("expected a remote error, got {err}");
    };
    assert!(message.contains("wrong type"));
}

#[test]
fn remote_error_in_one_branch_aborts_the_whole_query() {
    let store = FakeStore::new();
    store.queue(rows("devices", &["d1"]));
    store.queue(json!({"errors": [{"message": "boom"}]}));
    let err = client(&store)
        .select("name")
        .using("nb.devices")
        .where_("location=site_1 or role=edge")
        .expect_err("second branch fails");
    assert!(matches!(err, GraphselError::Remote(_)), "{err}");
    assert_eq!(store.calls().len(), 2, "execution stops at the failing leaf");
}

#[test]
fn unknown_entity_type_is_a_config_error() {
    let store = FakeStore::new();
    let err = client(&store)
        .select("name")
        .using("nb.nonsense")
        .where_("name=x")
        .expect_err("no template for this entity type");
    assert!(matches!(err, GraphselError::Config(_)), "{err}");
}

#[test]
fn scalar_field_with_conflicting_values_is_an_invariant_error() {
    let store = FakeStore::new();
    // changed_object_type binds as a scalar; an and over two values cannot
    // be satisfied in one binding
    let err = client(&store)
        .select("time")
        .using("nb.changes")
        .where_("changed_object_type=dcim.device and changed_object_type=ipam.vlan")
        .expect_err("two values for a scalar binding");
    assert!(matches!(err, GraphselError::Invariant(_)), "{err}");
    assert!(store.calls().is_empty());
}

#[test]
fn malformed_response_envelope_is_a_remote_error() {
    let store = FakeStore::new();
    store.queue(json!({"data": {"unexpected": []}}));
    let err = client(&store)
        .select("name")
        .using("nb.devices")
        .where_("name=x")
        .expect_err("result list missing from data");
    assert!(matches!(err, GraphselError::Remote(_)), "{err}");
}
