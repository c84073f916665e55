//! Per-entity-type query templates and store settings.
//!
//! Each entity type the remote store knows is queried through a fixed
//! template. A template carries the `__query_vars__` placeholder for variable
//! declarations, one parameter slot per (sub-)query block, and `__select__`
//! for the caller's selection set; `root` names the key under `data` holding
//! the flat result list (an empty root means the whole data object is the
//! result). Built-in defaults cover the known entity types and can be
//! overridden from a `graphsel` config file or `GRAPHSEL_*` environment
//! variables.

use std::collections::HashMap;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{GraphselError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct QueryTemplate {
    pub query: String,
    #[serde(default)]
    pub root: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub templates: HashMap<String, QueryTemplate>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut templates = HashMap::new();
        let mut add = |using: &str, root: &str, query: &str| {
            templates.insert(
                using.to_owned(),
                QueryTemplate { query: query.to_owned(), root: root.to_owned() },
            );
        };
        add(
            "nb.devices",
            "devices",
            "query Devices(__query_vars__) { \
             devices(__devices_params__) { \
             __select__ \
             interfaces(__interfaces_params__) { id name } } }",
        );
        add(
            "nb.vlans",
            "vlans",
            "query Vlans(__query_vars__) { vlans(__vlans_params__) { __select__ } }",
        );
        add(
            "nb.ipaddresses",
            "ip_addresses",
            "query IpAddresses(__query_vars__) { \
             ip_addresses(__ipaddresses_params__) { \
             __select__ \
             primary_ip4_for(__primaryip4for_params__) { id name } \
             interface_assignments(__assignments_params__) { id interface { id name device { id name } } } } }",
        );
        add(
            "nb.prefixes",
            "prefixes",
            "query Prefixes(__query_vars__) { prefixes(__prefixes_params__) { __select__ } }",
        );
        add(
            "nb.changes",
            "object_changes",
            "query Changes(__query_vars__) { object_changes(__changes_params__) { __select__ } }",
        );
        add(
            "nb.vms",
            "virtual_machines",
            "query Vms(__query_vars__) { virtual_machines(__vms_params__) { __select__ } }",
        );
        add(
            "nb.locations",
            "locations",
            "query Locations(__query_vars__) { locations(__locations_params__) { __select__ } }",
        );
        add(
            "nb.tags",
            "tags",
            "query Tags(__query_vars__) { tags(__tags_params__) { __select__ } }",
        );
        add(
            "nb.general",
            "",
            "query General(__query_vars__) { __select__ }",
        );
        Self { templates }
    }
}

impl Settings {
    /// Load settings, layering an optional config file and environment
    /// overrides on top of the built-in templates.
    pub fn load() -> Result<Self> {
        Self::load_from("graphsel")
    }

    pub fn load_from(name: &str) -> Result<Self> {
        let loaded: Settings = Config::builder()
            .add_source(File::with_name(name).required(false))
            .add_source(Environment::with_prefix("GRAPHSEL").separator("__"))
            .build()?
            .try_deserialize()?;
        let mut settings = Settings::default();
        // user templates override the built-in ones per entity type
        settings.templates.extend(loaded.templates);
        Ok(settings)
    }

    pub fn template(&self, using: &str) -> Result<&QueryTemplate> {
        self.templates
            .get(using)
            .ok_or_else(|| GraphselError::Config(format!("no query template for '{using}'")))
    }
}
