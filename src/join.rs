//! Equi-join of two independently executed selections.
//!
//! The join condition names one dotted path per side, e.g.
//! `vlans.link[0].device.id = devices.id`. Paths may traverse list-valued
//! segments: an explicit `[idx]` picks that element, while a missing index
//! scans for the first element that carries the next key. A path that yields
//! nothing for one entity is a non-match; a path that resolves for no entity
//! on a non-empty side is a join path error rather than a silently empty
//! result.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{GraphselError, Result};
use crate::result::{Entity, ResultSet};

lazy_static! {
    static ref SEGMENT: Regex = Regex::new(r"^([A-Za-z0-9_]+)(?:\[(\d+)\])?$").unwrap();
}

/// One segment of a dotted path, with an optional explicit list index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub key: String,
    pub index: Option<usize>,
}

/// Parse a dotted path. Malformed segments are structural errors.
pub fn parse_path(path: &str) -> Result<Vec<Segment>> {
    let path = path.trim();
    if path.is_empty() {
        return Err(GraphselError::JoinPath("empty path".into()));
    }
    path.split('.')
        .map(|segment| {
            let captures = SEGMENT.captures(segment).ok_or_else(|| {
                GraphselError::JoinPath(format!("malformed path segment '{segment}' in '{path}'"))
            })?;
            let index = match captures.get(2) {
                Some(idx) => Some(idx.as_str().parse::<usize>().map_err(|_| {
                    GraphselError::JoinPath(format!("index out of range in '{segment}'"))
                })?),
                None => None,
            };
            Ok(Segment { key: captures[1].to_owned(), index })
        })
        .collect()
}

/// Resolve a parsed path against one entity. `None` means the entity simply
/// has no value there.
pub fn resolve_path<'v>(entity: &'v Entity, segments: &[Segment]) -> Option<&'v Value> {
    let mut current: Option<&'v Value> = None;
    for (position, segment) in segments.iter().enumerate() {
        let value = if position == 0 {
            entity.get(&segment.key)
        } else {
            lookup_key(current?, &segment.key)
        }?;
        current = Some(match segment.index {
            Some(index) => value.as_array()?.get(index)?,
            None => value,
        });
    }
    current
}

fn lookup_key<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(key),
        // list-valued segment without an index: first element carrying the
        // key wins
        Value::Array(items) => items.iter().find_map(|item| item.as_object()?.get(key)),
        _ => None,
    }
}

/// Split a join condition into its left and right path.
pub fn split_condition(on: &str, left_alias: &str, right_alias: &str) -> Result<(String, String)> {
    let condensed: String = on.chars().filter(|c| !c.is_whitespace()).collect();
    let (left, right) = condensed.split_once('=').ok_or_else(|| {
        GraphselError::JoinPath(format!("join condition '{on}' must read 'left = right'"))
    })?;
    let left = left.strip_prefix(&format!("{left_alias}.")).unwrap_or(left);
    let right = right.strip_prefix(&format!("{right_alias}.")).unwrap_or(right);
    Ok((left.to_owned(), right.to_owned()))
}

/// Inner join: each left entity whose resolved path value equals a right
/// entity's resolved value is emitted once per match, with the right entity
/// nested under the right-hand identifier. Unmatched left entities drop out.
pub fn join_results(
    left: ResultSet,
    right: ResultSet,
    left_path: &[Segment],
    right_path: &[Segment],
    right_identifier: &str,
) -> Result<ResultSet> {
    let left_empty = left.is_empty();
    let right_empty = right.is_empty();
    let right_values: Vec<(Option<&Value>, &Entity)> = right
        .iter()
        .map(|entity| (resolve_path(entity, right_path), entity))
        .collect();
    let any_right_resolved = right_values.iter().any(|(value, _)| value.is_some());

    let mut result = ResultSet::new();
    let mut any_left_resolved = false;
    for left_entity in left.iter() {
        let Some(left_value) = resolve_path(left_entity, left_path) else {
            trace!("left entity resolves no join value; non-match");
            continue;
        };
        any_left_resolved = true;
        for (right_value, right_entity) in &right_values {
            if *right_value == Some(left_value) {
                let mut row = left_entity.clone();
                row.insert(
                    right_identifier.to_owned(),
                    Value::Object((*right_entity).clone()),
                );
                result.push(row);
            }
        }
    }

    if !left_empty && !any_left_resolved {
        return Err(GraphselError::JoinPath(format!(
            "left path {} resolves for no entity",
            render_path(left_path)
        )));
    }
    if !right_empty && !any_right_resolved {
        return Err(GraphselError::JoinPath(format!(
            "right path {} resolves for no entity",
            render_path(right_path)
        )));
    }
    debug!(rows = result.len(), "joined result sets");
    Ok(result)
}

fn render_path(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| match s.index {
            Some(i) => format!("{}[{i}]", s.key),
            None => s.key.clone(),
        })
        .collect::<Vec<_>>()
        .join(".")
}
