//! Graphsel – a selection engine that turns SQL-like where-expressions into
//! a minimal number of remote graph queries.
//!
//! A caller writes filters the way they would in SQL:
//!
//! ```text
//! select hostname using nb.devices where location=site_1 or location=site_2
//! ```
//!
//! and graphsel parses the expression, builds a logical tree of AND/OR nodes
//! over comparison leaves, *condenses* the tree by merging sibling leaves
//! that the remote store can answer in one request, executes the remaining
//! leaves bottom-up (one remote call each), and combines the partial results
//! by entity identity.
//!
//! ## Modules
//! * [`expression`] – pest grammar and parser for where-expressions.
//! * [`tree`] – the arena-allocated [`tree::LogicalTree`] and the condenser.
//! * [`catalog`] – field typing: fixed system fields plus the lazily fetched
//!   custom field catalog (`cf_` prefix).
//! * [`store`] – the [`store::RemoteStore`] boundary and the query renderer.
//! * [`settings`] – per-entity-type query templates, file/env overridable.
//! * [`execute`] – post-order tree execution and binding normalization.
//! * [`result`] – identity-keyed [`result::ResultSet`] combination.
//! * [`join`] – equi-joins of two selections on dotted, list-capable paths.
//! * [`transform`] – post-processing directives (`remove_id`, `values_only`,
//!   `flatten`).
//! * [`selection`] – the fluent [`Client`]/[`Selection`] caller surface.
//!
//! ## Condensation
//! Merging is driven by field types. An AND of sibling leaves always merges,
//! since the remote store applies conjunctive semantics to a parameter map.
//! An OR of sibling leaves merges only when the merged map has a single field
//! and that field's type can carry a list of alternatives; anything else
//! stays split and is unioned client-side after execution.
//!
//! ## Quick Start
//! ```no_run
//! use graphsel::{Client, Settings};
//! # fn run(store: Box<dyn graphsel::RemoteStore>) -> graphsel::Result<()> {
//! let client = Client::new(store, Settings::default());
//! let devices = client
//!     .select("name, platform.name")
//!     .using("nb.devices")
//!     .where_("location=site_1 and role=edge")?;
//! for device in &devices {
//!     println!("{:?}", device.get("name"));
//! }
//! # Ok(()) }
//! ```
//!
//! ## License
//! Dual licensed under Apache-2.0 and MIT.

pub mod catalog;
pub mod error;
pub mod execute;
pub mod expression;
pub mod join;
pub mod result;
pub mod selection;
pub mod settings;
pub mod store;
pub mod transform;
pub mod tree;

pub use catalog::{FieldKind, TypeResolver, VariableType};
pub use error::{GraphselError, Result};
pub use expression::{Cmp, Expr};
pub use result::{Entity, ResultSet};
pub use selection::{Client, Mode, Selection, WhereClause};
pub use settings::Settings;
pub use store::{Binding, RemoteStore, Renderer};
pub use tree::LogicalTree;
