//! Shared in-memory remote store fake for the integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value, json};

use graphsel::{FieldKind, GraphselError, RemoteStore, Result};

/// One recorded remote round trip.
#[derive(Debug, Clone)]
pub struct Call {
    pub query: String,
    pub variables: Map<String, Value>,
}

/// A scripted remote store: responses are dequeued in call order, every call
/// is recorded, and the custom field catalog counts its fetches.
#[derive(Clone, Default)]
pub struct FakeStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    calls: Mutex<Vec<Call>>,
    responses: Mutex<VecDeque<Value>>,
    catalog: Mutex<HashMap<String, FieldKind>>,
    catalog_fetches: Mutex<usize>,
}

impl FakeStore {
    pub fn new() -> Self {
        // RUST_LOG=graphsel=trace makes failing scenarios readable
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        Self::default()
    }

    pub fn queue(&self, response: Value) -> &Self {
        self.inner.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn custom_field(&self, name: &str, kind: FieldKind) -> &Self {
        self.inner.catalog.lock().unwrap().insert(name.to_owned(), kind);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn catalog_fetches(&self) -> usize {
        *self.inner.catalog_fetches.lock().unwrap()
    }
}

impl RemoteStore for FakeStore {
    fn graphql(&self, query: &str, variables: &Map<String, Value>) -> Result<Value> {
        self.inner.calls.lock().unwrap().push(Call {
            query: query.to_owned(),
            variables: variables.clone(),
        });
        self.inner
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| GraphselError::Remote("no scripted response left".into()))
    }

    fn custom_field_types(&self) -> Result<HashMap<String, FieldKind>> {
        *self.inner.catalog_fetches.lock().unwrap() += 1;
        Ok(self.inner.catalog.lock().unwrap().clone())
    }
}

/// A `{data: {<root>: [{id, name}, ...]}}` payload.
pub fn rows(root: &str, ids: &[&str]) -> Value {
    let entities: Vec<Value> = ids
        .iter()
        .map(|id| json!({"id": id, "name": format!("host-{id}")}))
        .collect();
    json!({"data": {root: entities}})
}

pub fn result_ids(result: &graphsel::ResultSet) -> Vec<String> {
    result
        .iter()
        .map(|e| e["id"].as_str().unwrap().to_owned())
        .collect()
}
