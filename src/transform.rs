//! Post-processing directives applied to a final result set.
//!
//! Transforms are pure functions over the combined result and never influence
//! how the tree is condensed or executed. They run in the order given.

use serde_json::{Map, Value};
use tracing::warn;

use crate::join::{parse_path, resolve_path};
use crate::result::{Entity, ResultSet};

/// Apply a list of transform directives. Unknown directives are skipped with
/// a warning.
pub fn apply(mut data: ResultSet, directives: &[String], select: &[String]) -> ResultSet {
    for directive in directives {
        data = match directive.as_str() {
            "remove_id" => remove_id(data),
            "values_only" => values_only(data, select),
            "flatten" => flatten(data),
            other => {
                warn!(directive = other, "unknown transform directive");
                data
            }
        };
    }
    data
}

/// Strip `id` keys everywhere, including nested objects and lists.
fn remove_id(data: ResultSet) -> ResultSet {
    ResultSet::from_entities(
        data.into_entities()
            .into_iter()
            .map(|mut entity| {
                entity.remove("id");
                for value in entity.values_mut() {
                    remove_key(value, "id");
                }
                entity
            })
            .collect(),
    )
}

fn remove_key(value: &mut Value, key: &str) {
    match value {
        Value::Object(map) => {
            map.remove(key);
            for nested in map.values_mut() {
                remove_key(nested, key);
            }
        }
        Value::Array(items) => {
            for item in items {
                remove_key(item, key);
            }
        }
        _ => (),
    }
}

/// Project each entity down to the selected dotted paths, keyed by the
/// select string itself. Paths without a value are left out of the row.
fn values_only(data: ResultSet, select: &[String]) -> ResultSet {
    let paths: Vec<_> = select
        .iter()
        .filter_map(|s| parse_path(s).ok().map(|p| (s.clone(), p)))
        .collect();
    ResultSet::from_entities(
        data.iter()
            .map(|entity| {
                let mut row = Entity::new();
                for (name, path) in &paths {
                    if let Some(value) = resolve_path(entity, path) {
                        row.insert(name.clone(), value.clone());
                    }
                }
                row
            })
            .collect(),
    )
}

/// Flatten nested objects and lists into `a.b[0].c`-keyed scalar columns,
/// one flat row per entity.
fn flatten(data: ResultSet) -> ResultSet {
    ResultSet::from_entities(
        data.into_entities()
            .into_iter()
            .map(|entity| {
                let mut row = Entity::new();
                flatten_into("", &Value::Object(entity), &mut row);
                row
            })
            .collect(),
    )
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Map<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
                flatten_into(&path, nested, out);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_into(&format!("{prefix}[{index}]"), item, out);
            }
        }
        scalar => {
            out.insert(prefix.to_owned(), scalar.clone());
        }
    }
}
