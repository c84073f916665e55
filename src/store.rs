//! Boundary to the remote graph store, and the renderer that turns one leaf
//! of the logical tree into one remote request.
//!
//! The engine never talks to the network itself: everything goes through the
//! [`RemoteStore`] trait, which a session/transport layer implements. The
//! [`Renderer`] substitutes variable declarations and parameter fragments
//! into the fixed per-entity-type template, performs the call, and unwraps
//! the `{data: {...}}` envelope into a flat [`ResultSet`]. A payload carrying
//! `{errors: [...]}` is surfaced as [`GraphselError::Remote`] and propagates
//! to the caller; it is never degraded to an empty result.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::catalog::{FieldKind, TypeResolver, VariableType};
use crate::error::{GraphselError, Result};
use crate::result::{Entity, ResultSet};
use crate::settings::Settings;

lazy_static! {
    // any parameter slot the template declares but nothing filled
    static ref LEFTOVER_SLOT: Regex = Regex::new(r"__[a-z0-9_]+_params__").unwrap();
}

/// The remote, schema-typed graph store. One call per rendered query; the
/// store enforces one-value-or-typed-list binding per declared variable.
pub trait RemoteStore {
    /// Execute a rendered query with bound variables and return the raw
    /// response payload (`{data: {...}}` or `{errors: [...]}`).
    fn graphql(&self, query: &str, variables: &Map<String, Value>) -> Result<Value>;

    /// Fetch the custom field type catalog.
    fn custom_field_types(&self) -> Result<HashMap<String, FieldKind>>;
}

/// One normalized variable binding of a leaf query.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub var_type: VariableType,
    pub value: Value,
}

impl Binding {
    pub fn new(name: impl Into<String>, var_type: VariableType, value: Value) -> Self {
        Self { name: name.into(), var_type, value }
    }
}

/// Renders and executes remote queries for one entity-type template.
pub struct Renderer<'a> {
    store: &'a dyn RemoteStore,
    settings: &'a Settings,
}

impl<'a> Renderer<'a> {
    pub fn new(store: &'a dyn RemoteStore, settings: &'a Settings) -> Self {
        Self { store, settings }
    }

    /// Issue exactly one remote query for a set of bindings and return the
    /// unwrapped result set.
    pub fn query(
        &self,
        select: &[String],
        using: &str,
        bindings: &[Binding],
        limit: usize,
        offset: usize,
    ) -> Result<ResultSet> {
        let template = self.settings.template(using)?;
        let mut slots: HashMap<&'static str, Vec<String>> = HashMap::new();
        let mut variables = Map::new();
        let mut declarations = Vec::with_capacity(bindings.len());
        for binding in bindings {
            declarations.push(format!("${}: {}", binding.name, binding.var_type.declaration()));
            let (slot, param) = route_parameter(&binding.name, using);
            slots
                .entry(slot)
                .or_default()
                .push(format!("{param}: ${}", binding.name));
            variables.insert(binding.name.clone(), binding.value.clone());
        }
        // pagination is rendered inline rather than bound
        if limit > 0 {
            slots.entry(main_slot_token(using)).or_default().push(format!("limit: {limit}"));
        }
        if offset > 0 {
            slots.entry(main_slot_token(using)).or_default().push(format!("offset: {offset}"));
        }

        let mut query = template.query.clone();
        query = query.replace("__query_vars__", &declarations.join(", "));
        query = query.replace("__select__", &render_select(select));
        for (slot, params) in &slots {
            query = query.replace(slot, &params.join(", "));
        }
        query = LEFTOVER_SLOT.replace_all(&query, "").into_owned();
        query = query.replace("()", "");

        debug!(using, variables = %serde_json::Value::Object(variables.clone()), "remote query");
        trace!(%query, "rendered query");
        let response = self.store.graphql(&query, &variables)?;
        self.unwrap_response(response, using)
    }

    /// Issue one multi-part query from pre-structured parameter groups
    /// (gql mode). Variables of a group other than the template's primary
    /// one are prefixed with the group name.
    pub fn query_grouped(
        &self,
        select: &[String],
        using: &str,
        groups: &Map<String, Value>,
        resolver: &mut TypeResolver,
    ) -> Result<ResultSet> {
        let template = self.settings.template(using)?;
        let main = main_slot(using);
        let mut declarations = Vec::new();
        let mut variables = Map::new();
        let mut query = template.query.clone();
        for (group, params) in groups {
            let Value::Object(params) = params else {
                return Err(GraphselError::Config(format!(
                    "sub-query group '{group}' must be a parameter map"
                )));
            };
            let prefix = if group == &main { String::new() } else { format!("{group}_") };
            let mut fragments = Vec::with_capacity(params.len());
            for (key, value) in params {
                let name = format!("{prefix}{key}");
                declarations.push(format!("${name}: {}", resolver.resolve(key)?.declaration()));
                fragments.push(format!("{key}: ${name}"));
                variables.insert(name, value.clone());
            }
            query = query.replace(&format!("__{group}_params__"), &fragments.join(", "));
        }
        query = query.replace("__query_vars__", &declarations.join(", "));
        query = query.replace("__select__", &render_select(select));
        query = LEFTOVER_SLOT.replace_all(&query, "").into_owned();
        query = query.replace("()", "");

        debug!(using, variables = %serde_json::Value::Object(variables.clone()), "remote grouped query");
        trace!(%query, "rendered query");
        let response = self.store.graphql(&query, &variables)?;
        self.unwrap_response(response, using)
    }

    /// Entity-type-specific unwrapping of the response envelope.
    fn unwrap_response(&self, response: Value, using: &str) -> Result<ResultSet> {
        if let Some(errors) = response.get("errors") {
            warn!(using, %errors, "remote store returned errors");
            return Err(GraphselError::Remote(errors.to_string()));
        }
        let data = response
            .get("data")
            .ok_or_else(|| GraphselError::Remote(format!("response for {using} carries no data")))?;
        let template = self.settings.template(using)?;
        if template.root.is_empty() {
            // the whole data object is one entity
            let Value::Object(entity) = data else {
                return Err(GraphselError::Remote(format!(
                    "response data for {using} is not an object"
                )));
            };
            return Ok(ResultSet::from_entities(vec![entity.clone()]));
        }
        let rows = data.get(&template.root).and_then(Value::as_array).ok_or_else(|| {
            GraphselError::Remote(format!(
                "response for {using} misses the '{}' result list",
                template.root
            ))
        })?;
        let mut entities: Vec<Entity> = Vec::with_capacity(rows.len());
        for row in rows {
            match row {
                Value::Object(entity) => entities.push(entity.clone()),
                other => {
                    return Err(GraphselError::Remote(format!(
                        "entity in {using} response is not an object: {other}"
                    )));
                }
            }
        }
        Ok(ResultSet::from_entities(entities))
    }
}

/// Short name of an entity type: `nb.devices` -> `devices`.
fn main_slot(using: &str) -> String {
    using.rsplit('.').next().unwrap_or(using).to_owned()
}

/// The primary parameter slot of an entity type's template.
fn main_slot_token(using: &str) -> &'static str {
    route_parameter("", using).0
}

/// Decide which template slot a where-key belongs to. Keys carrying a
/// sub-query prefix route into the nested block the template predefines; the
/// bound variable keeps the full, prefixed name.
fn route_parameter<'k>(key: &'k str, using: &str) -> (&'static str, &'k str) {
    if let Some(stripped) = key.strip_prefix("interfaces_") {
        ("__interfaces_params__", stripped)
    } else if let Some(stripped) = key.strip_prefix("pip4for_") {
        ("__primaryip4for_params__", stripped)
    } else if let Some(stripped) = key.strip_prefix("assignments_") {
        ("__assignments_params__", stripped)
    } else {
        let slot: &'static str = match main_slot(using).as_str() {
            "devices" => "__devices_params__",
            "vlans" => "__vlans_params__",
            "ipaddresses" => "__ipaddresses_params__",
            "prefixes" => "__prefixes_params__",
            "changes" => "__changes_params__",
            "vms" => "__vms_params__",
            "locations" => "__locations_params__",
            "tags" => "__tags_params__",
            _ => "__general_params__",
        };
        (slot, key)
    }
}

/// Render the select list as a nested selection set. Dotted selects nest
/// (`platform.name` -> `platform { name }`) and custom fields collapse into
/// the custom field data blob.
fn render_select(select: &[String]) -> String {
    let mut paths: Vec<Vec<&str>> = Vec::new();
    for field in select {
        if field.starts_with(crate::catalog::CUSTOM_PREFIX) {
            if !paths.iter().any(|p| p == &vec!["_custom_field_data"]) {
                paths.push(vec!["_custom_field_data"]);
            }
        } else {
            let path: Vec<&str> = field.split('.').collect();
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    render_paths(&paths)
}

fn render_paths(paths: &[Vec<&str>]) -> String {
    let mut rendered: Vec<String> = Vec::new();
    let mut grouped: Vec<(&str, Vec<Vec<&str>>)> = Vec::new();
    for path in paths {
        let (head, rest) = (path[0], path[1..].to_vec());
        match grouped.iter_mut().find(|(h, _)| *h == head) {
            Some((_, rests)) => {
                if !rest.is_empty() {
                    rests.push(rest);
                }
            }
            None => grouped.push((head, if rest.is_empty() { Vec::new() } else { vec![rest] })),
        }
    }
    for (head, rests) in grouped {
        if rests.is_empty() {
            rendered.push(head.to_owned());
        } else {
            rendered.push(format!("{head} {{ {} }}", render_paths(&rests)));
        }
    }
    rendered.join(" ")
}
