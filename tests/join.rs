mod common;

use common::FakeStore;
use graphsel::{Client, GraphselError, Settings};
use serde_json::json;

fn client(store: &FakeStore) -> Client {
    Client::new(Box::new(store.clone()), Settings::default())
}

#[test]
fn join_runs_one_pipeline_per_side_and_merges_rows() {
    let store = FakeStore::new();
    // left side: vlans carrying links to devices
    store.queue(json!({"data": {"vlans": [
        {"id": "v1", "vid": 100, "name": "blue",
         "link": [{"device": {"id": "d1"}}]},
        {"id": "v2", "vid": 200, "name": "red",
         "link": [{"device": {"id": "d9"}}]}
    ]}}));
    // right side: devices
    store.queue(json!({"data": {"devices": [
        {"id": "d1", "name": "edge-01"},
        {"id": "d2", "name": "edge-02"}
    ]}}));
    let result = client(&store)
        .select("vlans.vid, vlans.name, devices.name")
        .using("nb.vlans as vlans")
        .join("nb.devices as devices")
        .on("vlans.link[0].device.id = devices.id")
        .where_("vlans.vid=100, vlans.vid=200")
        .expect("join ok");

    let calls = store.calls();
    assert_eq!(calls.len(), 2, "one call per side");
    assert!(calls[0].query.contains("link"), "left side selects the join path root");
    assert_eq!(calls[0].variables["vid"], json!([100, 200]), "left clauses condense normally");
    assert_eq!(
        calls[1].variables["name"],
        json!(""),
        "right side has no clauses and falls back to the default binding"
    );

    assert_eq!(result.len(), 1, "v2 points at an unknown device and drops out");
    let row = &result.entities()[0];
    assert_eq!(row["vid"], json!(100));
    assert_eq!(row["devices"]["name"], json!("edge-01"));
}

#[test]
fn join_clauses_split_per_alias() {
    let store = FakeStore::new();
    store.queue(json!({"data": {"vlans": [
        {"id": "v1", "vid": 100, "link": [{"device": {"id": "d1"}}]}
    ]}}));
    store.queue(json!({"data": {"devices": [
        {"id": "d1", "name": "edge-01", "role": {"name": "edge"}}
    ]}}));
    client(&store)
        .select("vlans.vid, devices.name")
        .using("nb.vlans as vlans")
        .join("nb.devices as devices")
        .on("vlans.link[0].device.id = devices.id")
        .where_("vlans.vid=100, devices.role=edge")
        .expect("join ok");
    let calls = store.calls();
    assert_eq!(calls[0].variables["vid"], json!(100));
    assert_eq!(calls[1].variables["role"], json!("edge"));
}

#[test]
fn unindexed_join_path_scans_list_elements() {
    let store = FakeStore::new();
    store.queue(json!({"data": {"vlans": [
        {"id": "v1", "vid": 100,
         "link": [{"other": true}, {"device": {"id": "d1"}}]}
    ]}}));
    store.queue(json!({"data": {"devices": [{"id": "d1", "name": "edge-01"}]}}));
    let result = client(&store)
        .select("vlans.vid, devices.name")
        .using("nb.vlans as vlans")
        .join("nb.devices as devices")
        .on("vlans.link.device.id = devices.id")
        .where_("vlans.vid=100")
        .expect("join ok");
    assert_eq!(result.len(), 1, "first list element carrying the key matches");
}

#[test]
fn structurally_dead_join_path_is_an_error() {
    let store = FakeStore::new();
    store.queue(json!({"data": {"vlans": [{"id": "v1", "vid": 100}]}}));
    store.queue(json!({"data": {"devices": [{"id": "d1"}]}}));
    let err = client(&store)
        .select("vlans.vid, devices.name")
        .using("nb.vlans as vlans")
        .join("nb.devices as devices")
        .on("vlans.link[0].device.id = devices.id")
        .where_("vlans.vid=100")
        .expect_err("no vlan resolves the join path");
    assert!(matches!(err, GraphselError::JoinPath(_)), "{err}");
}

#[test]
fn join_without_on_condition_is_rejected() {
    let store = FakeStore::new();
    let err = client(&store)
        .select("vlans.vid")
        .using("nb.vlans as vlans")
        .join("nb.devices as devices")
        .where_("vlans.vid=100")
        .expect_err("on(...) missing");
    assert!(matches!(err, GraphselError::Config(_)), "{err}");
    assert!(store.calls().is_empty());
}
