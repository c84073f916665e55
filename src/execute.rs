//! Post-order execution of the condensed logical tree.
//!
//! Each remaining leaf costs exactly one remote round trip; internal nodes
//! cost none and only combine their children's responses. A parent's response
//! is computed strictly after all of its children's responses are set.
//! Execution is sequential today; sibling leaves are data-independent and
//! could be issued concurrently before combination, but observed behavior is
//! strictly one call at a time.

use serde_json::Value;
use tracing::debug;

use crate::catalog::{TypeResolver, VariableType};
use crate::error::{GraphselError, Result};
use crate::result::ResultSet;
use crate::store::{Binding, Renderer};
use crate::tree::{BindMap, LogicalTree, Operator};

/// Walk the condensed tree and return the root's response.
pub fn execute_tree(
    tree: &mut LogicalTree,
    select: &[String],
    using: &str,
    renderer: &Renderer,
    resolver: &mut TypeResolver,
) -> Result<ResultSet> {
    let select = with_identity(select);
    for id in tree.post_order() {
        if tree.node(id).is_leaf() {
            let values = tree.node(id).values.clone().ok_or_else(|| {
                GraphselError::Invariant(format!("leaf {id} carries no values"))
            })?;
            let bindings = normalize_bindings(&values, resolver)?;
            debug!(id, using, "querying leaf");
            let response = renderer.query(&select, using, &bindings, 0, 0)?;
            tree.node_mut(id).response = Some(response);
        } else {
            let operator = tree.node(id).operator.ok_or_else(|| {
                GraphselError::Invariant(format!("internal node {id} carries no operator"))
            })?;
            let children = tree.node(id).children.clone();
            let mut responses = Vec::with_capacity(children.len());
            for child in children {
                let response = tree.node_mut(child).response.take().ok_or_else(|| {
                    GraphselError::Invariant(format!("child {child} executed after parent {id}"))
                })?;
                responses.push(response);
            }
            debug!(id, ?operator, sets = responses.len(), "combining children");
            tree.node_mut(id).response = Some(match operator {
                Operator::And => ResultSet::intersect(responses),
                Operator::Or => ResultSet::union(responses),
            });
        }
    }
    let root = tree.root();
    tree.node_mut(root)
        .response
        .take()
        .ok_or_else(|| GraphselError::Invariant("root finished without a response".into()))
}

/// Identity is the sole merge and join key, so it is always selected.
pub fn with_identity(select: &[String]) -> Vec<String> {
    let mut select = select.to_vec();
    if !select.iter().any(|s| s == "id") {
        select.push("id".into());
    }
    select
}

/// Turn a leaf's value map into typed bindings: scalar variables take their
/// single value, boolean fields coerce `"true"`/`"false"`, and `[Int]`
/// bindings carry numbers.
pub fn normalize_bindings(values: &BindMap, resolver: &mut TypeResolver) -> Result<Vec<Binding>> {
    let mut bindings = Vec::with_capacity(values.len());
    for (field, raw) in values.iter() {
        let var_type = resolver.resolve(field)?;
        let value = match var_type {
            VariableType::Text => {
                let single = single_value(field, raw)?;
                Value::String(single.to_owned())
            }
            VariableType::Boolean => {
                let single = single_value(field, raw)?;
                Value::Bool(single.to_ascii_lowercase().contains("true"))
            }
            VariableType::TextList => {
                if raw.len() == 1 {
                    Value::String(raw[0].clone())
                } else {
                    Value::Array(raw.iter().map(|v| Value::String(v.clone())).collect())
                }
            }
            VariableType::IntList => {
                let numbers: Vec<Value> = raw
                    .iter()
                    .map(|v| match v.parse::<i64>() {
                        Ok(n) => Value::Number(n.into()),
                        // leave unparsable values to the remote type check
                        Err(_) => Value::String(v.clone()),
                    })
                    .collect();
                if numbers.len() == 1 {
                    numbers.into_iter().next().unwrap_or(Value::Null)
                } else {
                    Value::Array(numbers)
                }
            }
        };
        bindings.push(Binding::new(field, var_type, value));
    }
    Ok(bindings)
}

fn single_value<'v>(field: &str, raw: &'v [String]) -> Result<&'v str> {
    match raw {
        [single] => Ok(single),
        _ => Err(GraphselError::Invariant(format!(
            "field '{field}' binds as a scalar but carries {} values",
            raw.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_injected_once() {
        let select = with_identity(&["name".into()]);
        assert_eq!(select, ["name", "id"]);
        let select = with_identity(&select);
        assert_eq!(select.iter().filter(|s| *s == "id").count(), 1);
    }
}
