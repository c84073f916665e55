//! Field kinds and the session-scoped variable type resolver.
//!
//! The remote store binds every query variable with a declared type. Fixed
//! fields follow a small static table, while "custom" fields (reserved prefix
//! `cf_`) are typed by a catalog that is fetched from the store at most once
//! per resolver. A resolver is owned by a single query run and is never shared
//! across concurrent queries.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::error::{GraphselError, Result};
use crate::store::RemoteStore;

/// Reserved prefix marking a custom field.
pub const CUSTOM_PREFIX: &str = "cf_";

/// Catalog kind of a custom field, as reported by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text; binds as a scalar `String` and cannot be merged into a list.
    Text,
    /// Binds as a scalar `Boolean`.
    Boolean,
    /// Selection-like field; binds as `[String]`.
    ListCapable,
}

impl FieldKind {
    /// Map the remote catalog's type label onto a kind. Everything that is
    /// neither text nor boolean accepts list bindings.
    pub fn from_remote_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("text") {
            FieldKind::Text
        } else if label.to_ascii_lowercase().starts_with("boolean") {
            FieldKind::Boolean
        } else {
            FieldKind::ListCapable
        }
    }
}

/// Declared type of a bound query variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    Text,
    TextList,
    IntList,
    Boolean,
}

impl VariableType {
    /// Whether several values may be bound to one variable in a single call.
    pub fn is_list_capable(&self) -> bool {
        matches!(self, VariableType::TextList | VariableType::IntList)
    }

    /// The type declaration used in the rendered query.
    pub fn declaration(&self) -> &'static str {
        match self {
            VariableType::Text => "String",
            VariableType::TextList => "[String]",
            VariableType::IntList => "[Int]",
            VariableType::Boolean => "Boolean",
        }
    }
}

/// Resolves field names to variable types, caching the custom field catalog
/// for the duration of one query run.
pub struct TypeResolver<'a> {
    store: &'a dyn RemoteStore,
    catalog: Option<HashMap<String, FieldKind>>,
}

impl<'a> TypeResolver<'a> {
    pub fn new(store: &'a dyn RemoteStore) -> Self {
        Self { store, catalog: None }
    }

    /// Fetch the catalog now if it has not been fetched yet. Called once at
    /// the start of a condensation run so merging never pays per-node calls.
    pub fn refresh(&mut self) -> Result<()> {
        if self.catalog.is_none() {
            debug!("fetching custom field type catalog");
            self.catalog = Some(self.store.custom_field_types()?);
        }
        Ok(())
    }

    /// Resolve the variable type of a field reference. Modifier suffixes such
    /// as `__ne` or `__gt` do not change the type of the underlying field.
    pub fn resolve(&mut self, field: &str) -> Result<VariableType> {
        let base = base_field(field);
        if let Some(custom) = base.strip_prefix(CUSTOM_PREFIX) {
            self.refresh()?;
            let catalog = self.catalog.as_ref().ok_or_else(|| {
                GraphselError::Invariant("type catalog missing after refresh".into())
            })?;
            let kind = catalog
                .get(custom)
                .copied()
                .ok_or_else(|| GraphselError::UnknownField(field.to_owned()))?;
            let var_type = match kind {
                FieldKind::Text => VariableType::Text,
                FieldKind::Boolean => VariableType::Boolean,
                FieldKind::ListCapable => VariableType::TextList,
            };
            trace!(field, ?kind, ?var_type, "resolved custom field");
            return Ok(var_type);
        }
        // fixed fields: a few bind specially, the rest accept string lists
        let var_type = match base {
            "changed_object_type" => VariableType::Text,
            "vid" => VariableType::IntList,
            _ => VariableType::TextList,
        };
        trace!(field, ?var_type, "resolved fixed field");
        Ok(var_type)
    }

}

/// Strip a `__<modifier>` suffix, e.g. `cf_net__ne` refers to `cf_net`.
fn base_field(field: &str) -> &str {
    match field.find("__") {
        Some(pos) => &field[..pos],
        None => field,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_suffix_is_stripped() {
        assert_eq!(base_field("cf_net__ne"), "cf_net");
        assert_eq!(base_field("time__gt"), "time");
        assert_eq!(base_field("name"), "name");
    }

    #[test]
    fn remote_labels_map_to_kinds() {
        assert_eq!(FieldKind::from_remote_label("Text"), FieldKind::Text);
        assert_eq!(FieldKind::from_remote_label("Boolean (true/false)"), FieldKind::Boolean);
        assert_eq!(FieldKind::from_remote_label("Selection"), FieldKind::ListCapable);
    }

    #[test]
    fn fixed_field_table() {
        assert!(!VariableType::Text.is_list_capable());
        assert!(VariableType::IntList.is_list_capable());
        assert_eq!(VariableType::TextList.declaration(), "[String]");
    }
}
