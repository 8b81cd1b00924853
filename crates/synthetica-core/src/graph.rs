use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::schema::Schema;

/// Directed foreign-key edge `child.column -> parent.column`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct Relationship {
    pub child_table: String,
    pub child_column: String,
    pub parent_table: String,
    pub parent_column: String,
}

impl Relationship {
    pub fn new(
        child_table: impl Into<String>,
        child_column: impl Into<String>,
        parent_table: impl Into<String>,
        parent_column: impl Into<String>,
    ) -> Self {
        Self {
            child_table: child_table.into(),
            child_column: child_column.into(),
            parent_table: parent_table.into(),
            parent_column: parent_column.into(),
        }
    }

    pub fn is_self_reference(&self) -> bool {
        self.child_table == self.parent_table
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.child_table, self.child_column, self.parent_table, self.parent_column
        )
    }
}

/// Duplicate-free relationship edges in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RelationshipSet {
    edges: Vec<Relationship>,
}

impl RelationshipSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an edge, returning false when it was already present.
    pub fn insert(&mut self, edge: Relationship) -> bool {
        if self.edges.contains(&edge) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Relationship> {
        self.edges.iter()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Edges where `table` is the child.
    pub fn parents_of<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.edges.iter().filter(move |edge| edge.child_table == table)
    }

    /// Find the edge that constrains `table.column`, if any.
    pub fn edge_for(&self, table: &str, column: &str) -> Option<&Relationship> {
        self.edges
            .iter()
            .find(|edge| edge.child_table == table && edge.child_column == column)
    }
}

impl FromIterator<Relationship> for RelationshipSet {
    fn from_iter<I: IntoIterator<Item = Relationship>>(iter: I) -> Self {
        let mut set = RelationshipSet::new();
        for edge in iter {
            set.insert(edge);
        }
        set
    }
}

impl<'a> IntoIterator for &'a RelationshipSet {
    type Item = &'a Relationship;
    type IntoIter = std::slice::Iter<'a, Relationship>;

    fn into_iter(self) -> Self::IntoIter {
        self.edges.iter()
    }
}

/// Summary of the relationship graph structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Dependency report: a parent-first table order, or the tables left on a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GraphReport {
    pub summary: GraphSummary,
    pub topo_order: Option<Vec<String>>,
    pub cycle: Option<Vec<String>>,
}

/// Build a deterministic dependency report for the schema's tables.
///
/// Self-referencing edges do not constrain ordering and are skipped.
pub fn build_graph_report(schema: &Schema, relationships: &RelationshipSet) -> GraphReport {
    let graph = build_adjacency(schema, relationships);
    let nodes = graph.len();
    let edges = relationships
        .iter()
        .filter(|edge| !edge.is_self_reference())
        .count();
    let summary = GraphSummary { nodes, edges };

    match toposort(&graph) {
        Ok(order) => GraphReport {
            summary,
            topo_order: Some(order),
            cycle: None,
        },
        Err(cycle) => GraphReport {
            summary,
            topo_order: None,
            cycle: Some(cycle),
        },
    }
}

fn build_adjacency(
    schema: &Schema,
    relationships: &RelationshipSet,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for table in &schema.tables {
        graph.entry(table.name.clone()).or_default();
    }

    for edge in relationships {
        graph.entry(edge.child_table.clone()).or_default();
        if edge.is_self_reference() {
            continue;
        }
        graph
            .entry(edge.parent_table.clone())
            .or_default()
            .insert(edge.child_table.clone());
    }

    graph
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<&str, usize> = graph.keys().map(|node| (node.as_str(), 0)).collect();

    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.as_str()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<&str> = indegree
        .iter()
        .filter_map(|(node, count)| (*count == 0).then_some(*node))
        .collect();

    let mut order = Vec::with_capacity(graph.len());

    while let Some(node) = ready.pop_first() {
        order.push(node.to_string());

        if let Some(targets) = graph.get(node) {
            for target in targets {
                if let Some(count) = indegree.get_mut(target.as_str()) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(target.as_str());
                    }
                }
            }
        }
    }

    if order.len() == indegree.len() {
        Ok(order)
    } else {
        Err(indegree
            .into_iter()
            .filter_map(|(node, count)| (count > 0).then(|| node.to_string()))
            .collect())
    }
}
