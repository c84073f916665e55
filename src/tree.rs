//! The logical query tree: an arena of AND/OR/leaf nodes built from a parsed
//! where clause, plus the condenser that merges sibling leaves to shrink the
//! number of remote round trips.
//!
//! Nodes are addressed by index into the arena, so the tree owns no cyclic
//! references and can be inspected cheaply in tests. A node is a leaf iff it
//! carries no operator; every leaf holds an insertion-ordered `field ->
//! [values]` map with at least one key. A tree is built fresh per query run,
//! mutated in place and discarded afterwards.

use tracing::{debug, trace};

use crate::catalog::TypeResolver;
use crate::error::Result;
use crate::expression::{Cmp, Expr};
use crate::result::ResultSet;

/// Index of a node in the arena.
pub type NodeId = usize;

/// Key suffix encoding a `!=` comparison. Inequality bindings are treated as
/// a field of their own, so equality and inequality values never merge.
pub const NEGATION_SUFFIX: &str = "__ne";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
}

/// Insertion-ordered `field -> [values]` map carried by a leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindMap {
    entries: Vec<(String, Vec<String>)>,
}

impl BindMap {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn single(field: String, value: String) -> Self {
        Self { entries: vec![(field, vec![value])] }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == field)
            .map(|(_, v)| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Union of keys; value lists of shared keys are concatenated in order.
    pub fn merge(&mut self, other: &BindMap) {
        for (key, values) in &other.entries {
            match self.entries.iter_mut().find(|(k, _)| k == key) {
                Some((_, existing)) => existing.extend(values.iter().cloned()),
                None => self.entries.push((key.clone(), values.clone())),
            }
        }
    }
}

#[derive(Debug)]
pub struct Node {
    pub id: NodeId,
    pub operator: Option<Operator>,
    pub values: Option<BindMap>,
    pub children: Vec<NodeId>,
    pub response: Option<ResultSet>,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.operator.is_none()
    }
}

/// Arena-indexed logical tree with exactly one root.
#[derive(Debug)]
pub struct LogicalTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl LogicalTree {
    /// Build a tree from a parsed expression. The traversal is iterative with
    /// an explicit stack, so arbitrarily deep expressions cannot overflow the
    /// call stack; ids increase monotonically in visit order.
    pub fn from_expression(expr: &Expr) -> Self {
        let mut nodes: Vec<Node> = Vec::new();
        let mut stack: Vec<(&Expr, Option<NodeId>)> = vec![(expr, None)];
        while let Some((current, parent)) = stack.pop() {
            let id = nodes.len();
            let node = match current {
                Expr::And(_) => Node {
                    id,
                    operator: Some(Operator::And),
                    values: None,
                    children: Vec::new(),
                    response: None,
                },
                Expr::Or(_) => Node {
                    id,
                    operator: Some(Operator::Or),
                    values: None,
                    children: Vec::new(),
                    response: None,
                },
                Expr::Leaf { field, op, value } => {
                    let key = match op {
                        Cmp::Eq => field.clone(),
                        Cmp::Ne => format!("{field}{NEGATION_SUFFIX}"),
                    };
                    Node {
                        id,
                        operator: None,
                        values: Some(BindMap::single(key, value.clone())),
                        children: Vec::new(),
                        response: None,
                    }
                }
            };
            trace!(id, parent = ?parent, operator = ?node.operator, "tree node");
            nodes.push(node);
            if let Some(parent) = parent {
                nodes[parent].children.push(id);
            }
            if let Expr::And(children) | Expr::Or(children) = current {
                // pushed in reverse so siblings pop (and get ids) in order
                for child in children.iter().rev() {
                    stack.push((child, Some(id)));
                }
            }
        }
        Self { nodes, root: 0 }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Leaves in arena order. Detached nodes (merged away) are not counted.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.post_order()
            .into_iter()
            .filter(|&id| self.nodes[id].is_leaf())
            .collect()
    }

    /// Whether any leaf references a custom field.
    pub fn references_custom_fields(&self) -> bool {
        self.nodes.iter().any(|n| {
            n.values
                .as_ref()
                .is_some_and(|v| v.fields().any(|f| f.starts_with(crate::catalog::CUSTOM_PREFIX)))
        })
    }

    /// Post-order traversal from the root: children strictly before parents.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(NodeId, bool)> = vec![(self.root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
            } else {
                stack.push((id, true));
                for &child in self.nodes[id].children.iter().rev() {
                    stack.push((child, false));
                }
            }
        }
        order
    }

    /// Condense the tree to a fixed point: repeatedly merge sibling leaves
    /// under a common operator until a full pass performs no merge. The type
    /// catalog is primed once up front (when custom fields occur at all), not
    /// per node.
    pub fn condense(&mut self, resolver: &mut TypeResolver) -> Result<()> {
        if self.references_custom_fields() {
            resolver.refresh()?;
        }
        let mut run = 1;
        debug!(run, "condense pass");
        while self.merge_pass(resolver)? {
            run += 1;
            debug!(run, "condense pass");
        }
        Ok(())
    }

    /// One merge scan. Returns true if anything was merged, since a freshly
    /// created leaf may enable a merge one level up.
    fn merge_pass(&mut self, resolver: &mut TypeResolver) -> Result<bool> {
        let mut merged_any = false;
        for id in 0..self.nodes.len() {
            let Some(operator) = self.nodes[id].operator else { continue };
            let children = self.nodes[id].children.clone();
            if children.is_empty() || !children.iter().all(|&c| self.nodes[c].is_leaf()) {
                continue;
            }
            match operator {
                Operator::Or => {
                    // values for one field can be merged into a single list
                    // binding only if the field's variable type accepts lists
                    let mut merged = BindMap::new();
                    let mut list_capable = true;
                    for &child in &children {
                        let Some(values) = self.nodes[child].values.as_ref() else { continue };
                        for field in values.fields() {
                            if !resolver.resolve(field)?.is_list_capable() {
                                list_capable = false;
                            }
                        }
                        merged.merge(values);
                    }
                    if merged.len() == 1 && list_capable {
                        debug!(id, ?merged, "or-merged sibling leaves");
                        let node = &mut self.nodes[id];
                        node.values = Some(merged);
                        node.children.clear();
                        node.operator = None;
                        merged_any = true;
                    } else {
                        trace!(
                            id,
                            fields = merged.len(),
                            list_capable,
                            "or siblings not mergeable"
                        );
                    }
                }
                Operator::And => {
                    // distinct fields each keep their own binding, so an AND
                    // merge succeeds regardless of variable types
                    let mut merged = BindMap::new();
                    for &child in &children {
                        if let Some(values) = self.nodes[child].values.as_ref() {
                            merged.merge(values);
                        }
                    }
                    debug!(id, ?merged, "and-merged sibling leaves");
                    let node = &mut self.nodes[id];
                    node.values = Some(merged);
                    node.children.clear();
                    node.operator = None;
                    merged_any = true;
                }
            }
        }
        Ok(merged_any)
    }
}
