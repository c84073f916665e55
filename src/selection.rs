//! The caller-facing selection surface.
//!
//! Queries read like SQL split over a fluent chain: `select` names the fields
//! to retrieve, `using` the entity type, and `where_` the filter criteria;
//! calling `where_` executes the query and returns the result set. Two
//! entity types can be joined on dotted paths via `join`/`on`.
//!
//! ```no_run
//! # fn run(client: &graphsel::Client) -> graphsel::Result<()> {
//! // all hosts of two locations
//! let hosts = client
//!     .select("hostname")
//!     .using("nb.devices")
//!     .where_("location=default-site or location=site_1")?;
//!
//! // vlans with the devices their first link points at
//! let vlans = client
//!     .select("vlans.vid, vlans.name, devices.name")
//!     .using("nb.vlans as vlans")
//!     .join("nb.devices as devices")
//!     .on("vlans.link[0].device.id = devices.id")
//!     .where_("vlans.vid=100")?;
//! # Ok(()) }
//! ```

use serde_json::{Map, Value};
use tracing::debug;

use crate::catalog::TypeResolver;
use crate::error::{GraphselError, Result};
use crate::execute::{execute_tree, normalize_bindings, with_identity};
use crate::expression::parse_expression;
use crate::join;
use crate::result::ResultSet;
use crate::settings::Settings;
use crate::store::{RemoteStore, Renderer};
use crate::transform;
use crate::tree::{BindMap, LogicalTree};

/// Query mode: `Sql` parses a boolean where-expression, `Gql` takes
/// pre-structured sub-query parameter groups for multi-part queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Sql,
    Gql,
}

/// The where clause of a direct [`Client::query`] call.
#[derive(Debug, Clone)]
pub enum WhereClause {
    /// A boolean expression string (`Sql` mode).
    Expression(String),
    /// A flat parameter map issued as one simple query (`Sql` mode).
    Params(Map<String, Value>),
    /// Named sub-query parameter groups (`Gql` mode).
    Groups(Map<String, Value>),
}

/// Client owning the remote store boundary and the query templates.
pub struct Client {
    store: Box<dyn RemoteStore>,
    settings: Settings,
}

impl Client {
    pub fn new(store: Box<dyn RemoteStore>, settings: Settings) -> Self {
        Self { store, settings }
    }

    /// Construct a client with settings loaded from file/environment.
    pub fn open(store: Box<dyn RemoteStore>) -> Result<Self> {
        Ok(Self::new(store, Settings::load()?))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Start a fluent selection; `select` is a comma-separated field list.
    pub fn select(&self, select: &str) -> Selection<'_> {
        Selection::new(self, split_select(select))
    }

    /// Start a fluent selection from an explicit field list.
    pub fn select_fields<S: AsRef<str>>(&self, fields: &[S]) -> Selection<'_> {
        Selection::new(self, fields.iter().map(|f| f.as_ref().to_owned()).collect())
    }

    /// Direct query entry point used by the fluent surface and by callers
    /// that already hold structured parameters.
    pub fn query(
        &self,
        select: &[String],
        using: &str,
        where_clause: &WhereClause,
        mode: Mode,
        transforms: &[String],
        limit: usize,
        offset: usize,
    ) -> Result<ResultSet> {
        debug!(?select, using, ?mode, "query");
        let result = match (mode, where_clause) {
            (Mode::Gql, WhereClause::Groups(groups)) => self.grouped_query(select, using, groups),
            (Mode::Gql, _) => Err(GraphselError::Config(
                "gql mode requires sub-query parameter groups".into(),
            )),
            (Mode::Sql, WhereClause::Expression(expression)) => {
                if expression.trim().is_empty() {
                    self.simple_query(select, using, &default_binding(using), limit, offset)
                } else {
                    self.expression_query(select, using, expression)
                }
            }
            (Mode::Sql, WhereClause::Params(params)) => {
                self.simple_query(select, using, &bindmap_from_params(params), limit, offset)
            }
            (Mode::Sql, WhereClause::Groups(_)) => Err(GraphselError::Config(
                "sub-query parameter groups require gql mode".into(),
            )),
        }?;
        Ok(transform::apply(result, transforms, select))
    }

    /// Full pipeline: parse, build, condense, execute.
    fn expression_query(
        &self,
        select: &[String],
        using: &str,
        expression: &str,
    ) -> Result<ResultSet> {
        let expr = parse_expression(expression)?;
        let mut tree = LogicalTree::from_expression(&expr);
        let mut resolver = TypeResolver::new(self.store.as_ref());
        tree.condense(&mut resolver)?;
        let renderer = Renderer::new(self.store.as_ref(), &self.settings);
        execute_tree(&mut tree, select, using, &renderer, &mut resolver)
    }

    /// One round trip with a flat set of bindings; the only path that honors
    /// limit and offset.
    fn simple_query(
        &self,
        select: &[String],
        using: &str,
        params: &BindMap,
        limit: usize,
        offset: usize,
    ) -> Result<ResultSet> {
        let mut resolver = TypeResolver::new(self.store.as_ref());
        let bindings = normalize_bindings(params, &mut resolver)?;
        let renderer = Renderer::new(self.store.as_ref(), &self.settings);
        renderer.query(&with_identity(select), using, &bindings, limit, offset)
    }

    fn grouped_query(
        &self,
        select: &[String],
        using: &str,
        groups: &Map<String, Value>,
    ) -> Result<ResultSet> {
        let mut resolver = TypeResolver::new(self.store.as_ref());
        let renderer = Renderer::new(self.store.as_ref(), &self.settings);
        renderer.query_grouped(&with_identity(select), using, groups, &mut resolver)
    }
}

/// Fluent builder terminated by `where_` (or one of its variants), which
/// executes the query. Each invocation builds its own tree; trees are never
/// reused or shared.
pub struct Selection<'a> {
    client: &'a Client,
    select: Vec<String>,
    using: String,
    left_alias: String,
    join_table: Option<String>,
    right_alias: Option<String>,
    on: Option<String>,
    mode: Mode,
    transforms: Vec<String>,
    limit: usize,
    offset: usize,
}

impl<'a> Selection<'a> {
    fn new(client: &'a Client, select: Vec<String>) -> Self {
        Self {
            client,
            select,
            using: String::new(),
            left_alias: String::new(),
            join_table: None,
            right_alias: None,
            on: None,
            mode: Mode::Sql,
            transforms: Vec::new(),
            limit: 0,
            offset: 0,
        }
    }

    /// Entity type to select from; `"nb.vlans as vlans"` sets a join alias.
    pub fn using(mut self, schema: &str) -> Self {
        let (table, alias) = split_alias(schema);
        self.using = table;
        self.left_alias = alias;
        self
    }

    /// Entity type to join against, aliased like [`Selection::using`].
    pub fn join(mut self, schema: &str) -> Self {
        let (table, alias) = split_alias(schema);
        self.join_table = Some(table);
        self.right_alias = Some(alias);
        self
    }

    /// Join condition: two dotted paths separated by `=`.
    pub fn on(mut self, condition: &str) -> Self {
        self.on = Some(condition.to_owned());
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Post-processing directives, comma-separated.
    pub fn transform(mut self, transforms: &str) -> Self {
        self.transforms = split_select(transforms);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Execute with a where-expression and return the result set.
    pub fn where_(self, properties: &str) -> Result<ResultSet> {
        if self.join_table.is_some() {
            return self.run_join(properties);
        }
        match self.mode {
            Mode::Sql => self.client.query(
                &self.select,
                &self.using,
                &WhereClause::Expression(properties.to_owned()),
                Mode::Sql,
                &self.transforms,
                self.limit,
                self.offset,
            ),
            Mode::Gql => Err(GraphselError::Config(
                "gql mode requires where_groups with parameter groups".into(),
            )),
        }
    }

    /// Execute with a flat parameter map (one simple query).
    pub fn where_params(self, params: Map<String, Value>) -> Result<ResultSet> {
        self.client.query(
            &self.select,
            &self.using,
            &WhereClause::Params(params),
            Mode::Sql,
            &self.transforms,
            self.limit,
            self.offset,
        )
    }

    /// Execute a gql-mode query from sub-query parameter groups.
    pub fn where_groups(self, groups: Map<String, Value>) -> Result<ResultSet> {
        self.client.query(
            &self.select,
            &self.using,
            &WhereClause::Groups(groups),
            Mode::Gql,
            &self.transforms,
            self.limit,
            self.offset,
        )
    }

    /// Join execution: both sides run their own full pipeline with deferred
    /// transforms, then the equi-join merges them.
    fn run_join(self, properties: &str) -> Result<ResultSet> {
        let right_table = self
            .join_table
            .as_deref()
            .ok_or_else(|| GraphselError::Config("join without a joined entity type".into()))?;
        let right_alias = self
            .right_alias
            .as_deref()
            .ok_or_else(|| GraphselError::Config("join without a right-hand alias".into()))?;
        let on = self
            .on
            .as_deref()
            .ok_or_else(|| GraphselError::Config("join requires an on(...) condition".into()))?;

        let (left_on, right_on) = join::split_condition(on, &self.left_alias, right_alias)?;
        let left_path = join::parse_path(&left_on)?;
        let right_path = join::parse_path(&right_on)?;

        // each side selects its own fields plus the join path root and id
        let left_select = side_select(&self.select, &self.left_alias, &left_path[0].key);
        let right_select = side_select(&self.select, right_alias, &right_path[0].key);
        let left_where = side_where(properties, &self.left_alias);
        let right_where = side_where(properties, right_alias);
        debug!(
            left = %self.using, right = %right_table,
            left_where, right_where, "executing join sides"
        );

        let left_result = self.side_query(&left_select, &self.using, &left_where)?;
        let right_result = self.side_query(&right_select, right_table, &right_where)?;

        let joined =
            join::join_results(left_result, right_result, &left_path, &right_path, right_alias)?;

        // transforms see the caller's field names without the left alias
        let select: Vec<String> = self
            .select
            .iter()
            .map(|s| s.strip_prefix(&format!("{}.", self.left_alias)).unwrap_or(s).to_owned())
            .collect();
        Ok(transform::apply(joined, &self.transforms, &select))
    }

    fn side_query(&self, select: &[String], using: &str, where_: &str) -> Result<ResultSet> {
        self.client.query(
            select,
            using,
            &WhereClause::Expression(where_.to_owned()),
            Mode::Sql,
            &[],
            0,
            0,
        )
    }
}

fn split_select(select: &str) -> Vec<String> {
    select
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Split a `"table as alias"` schema reference; without `as`, the alias is
/// the table itself.
fn split_alias(schema: &str) -> (String, String) {
    match schema.split_once(" as ") {
        Some((table, alias)) => (table.trim().to_owned(), alias.trim().to_owned()),
        None => (schema.trim().to_owned(), schema.trim().to_owned()),
    }
}

/// Fields one join side selects: the alias-prefixed user fields, the join
/// path root, and id.
fn side_select(select: &[String], alias: &str, join_root: &str) -> Vec<String> {
    let prefix = format!("{alias}.");
    let mut side: Vec<String> = vec!["id".into()];
    if join_root != "id" {
        side.push(join_root.to_owned());
    }
    for field in select {
        if let Some(stripped) = field.strip_prefix(&prefix) {
            if !side.iter().any(|s| s == stripped) {
                side.push(stripped.to_owned());
            }
        }
    }
    side
}

/// Clauses of a comma-separated join where-string belonging to one side,
/// stitched back into a single boolean expression.
fn side_where(properties: &str, alias: &str) -> String {
    let prefix = format!("{alias}.");
    properties
        .split(',')
        .map(str::trim)
        .filter_map(|clause| clause.strip_prefix(&prefix))
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Simple queries with an empty where clause fall back to a per-entity-type
/// default binding.
fn default_binding(using: &str) -> BindMap {
    let field = if using.contains("nb.ipaddresses") {
        "address"
    } else if using.contains("nb.changes") {
        "time__gt"
    } else if using.contains("nb.prefixes") {
        "prefix"
    } else {
        "name"
    };
    BindMap::single(field.to_owned(), String::new())
}

/// Lift a caller-provided parameter map into the leaf value representation.
fn bindmap_from_params(params: &Map<String, Value>) -> BindMap {
    let mut map = BindMap::new();
    for (key, value) in params {
        let values: Vec<String> = match value {
            Value::Array(items) => items.iter().map(render_param).collect(),
            other => vec![render_param(other)],
        };
        let mut entry = BindMap::new();
        for v in values {
            entry.merge(&BindMap::single(key.clone(), v));
        }
        map.merge(&entry);
    }
    map
}

fn render_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
