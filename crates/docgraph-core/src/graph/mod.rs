//! In-memory property graph built by a conversion run.
//!
//! The graph owns a node table keyed by identity (kept in insertion order so
//! output is deterministic) and an append-only edge list. Nodes that resolve
//! to the same identity are merged additively; edges are never merged.

pub mod identity;

use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

/// A single property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    /// Plain text rendering (strings unquoted).
    pub fn as_text(&self) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => s.clone(),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// A property: one scalar, or an ordered list when a key repeats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl PropertyValue {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Scalar]> {
        match self {
            Self::Scalar(_) => None,
            Self::List(items) => Some(items),
        }
    }
}

impl From<Scalar> for PropertyValue {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.into())
    }
}

pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Add a value under `key`, turning the property into a list on repetition.
pub fn append_property(map: &mut PropertyMap, key: String, value: Scalar) {
    match map.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(PropertyValue::Scalar(value));
        }
        Entry::Occupied(mut slot) => match slot.get_mut() {
            PropertyValue::List(items) => items.push(value),
            PropertyValue::Scalar(first) => {
                let first = std::mem::replace(first, Scalar::Boolean(false));
                slot.insert(PropertyValue::List(vec![first, value]));
            }
        },
    }
}

/// A node of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub identity: String,
    pub label: String,
    pub qname: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: PropertyMap,
}

impl GraphNode {
    pub fn new(identity: impl Into<String>, label: impl Into<String>, qname: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            label: label.into(),
            qname: qname.into(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties = properties;
        self
    }
}

/// Classes of edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Parent object → nested child object.
    Containment,
    /// First endpoint → second endpoint of an association element.
    Association,
    /// Owning object → referenced object.
    Reference,
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Containment => write!(f, "containment"),
            Self::Association => write!(f, "association"),
            Self::Reference => write!(f, "reference"),
        }
    }
}

/// One end of an edge: identity plus label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeEnd {
    pub identity: String,
    pub label: String,
}

impl EdgeEnd {
    pub fn new(identity: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            label: label.into(),
        }
    }
}

/// A directed, typed edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: EdgeEnd,
    pub target: EdgeEnd,
    pub rel_type: String,
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: PropertyMap,
}

impl GraphEdge {
    pub fn new(kind: EdgeKind, rel_type: impl Into<String>, source: EdgeEnd, target: EdgeEnd) -> Self {
        Self {
            source,
            target,
            rel_type: rel_type.into(),
            kind,
            properties: PropertyMap::new(),
        }
    }

    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties = properties;
        self
    }
}

/// What to do when a merged node brings a different value for an existing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Keep the value already on the node.
    KeepFirst,
    /// Replace it with the incoming value.
    #[default]
    LastWriteWins,
}

/// A key that two sources of the same identity disagree on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub identity: String,
    pub key: String,
    pub kept: PropertyValue,
    pub discarded: PropertyValue,
}

#[derive(Deserialize)]
struct GraphParts {
    #[serde(default)]
    nodes: Vec<GraphNode>,
    #[serde(default)]
    edges: Vec<GraphEdge>,
}

impl From<GraphParts> for PropertyGraph {
    fn from(parts: GraphParts) -> Self {
        let mut graph = PropertyGraph {
            nodes: parts.nodes,
            edges: parts.edges,
            index: HashMap::new(),
        };
        graph.reindex();
        graph
    }
}

/// Nodes and edges produced by one or more conversions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "GraphParts")]
pub struct PropertyGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl PropertyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, or merge it into the node with the same identity.
    ///
    /// Previously absent keys are added. Keys present on both sides with
    /// different values are reported and resolved by `policy`.
    pub fn upsert_node(&mut self, node: GraphNode, policy: ConflictPolicy) -> Vec<MergeConflict> {
        let Some(&position) = self.index.get(&node.identity) else {
            self.index.insert(node.identity.clone(), self.nodes.len());
            self.nodes.push(node);
            return Vec::new();
        };

        let existing = &mut self.nodes[position];
        if existing.label != node.label {
            tracing::debug!(
                identity = %node.identity,
                kept = %existing.label,
                discarded = %node.label,
                "identity seen under two labels, keeping the first"
            );
        }

        let mut conflicts = Vec::new();
        for (key, value) in node.properties {
            match existing.properties.get_mut(&key) {
                None => {
                    existing.properties.insert(key, value);
                }
                Some(current) if *current == value => {}
                Some(current) => {
                    let (kept, discarded) = match policy {
                        ConflictPolicy::KeepFirst => (current.clone(), value),
                        ConflictPolicy::LastWriteWins => {
                            let previous = std::mem::replace(current, value);
                            (current.clone(), previous)
                        }
                    };
                    conflicts.push(MergeConflict {
                        identity: node.identity.clone(),
                        key,
                        kept,
                        discarded,
                    });
                }
            }
        }
        conflicts
    }

    /// Append an edge.
    pub fn push_edge(&mut self, edge: GraphEdge) {
        self.edges.push(edge);
    }

    /// Merge another graph into this one: nodes by identity, edges appended.
    pub fn absorb(&mut self, other: PropertyGraph, policy: ConflictPolicy) -> Vec<MergeConflict> {
        let mut conflicts = Vec::new();
        for node in other.nodes {
            conflicts.extend(self.upsert_node(node, policy));
        }
        self.edges.extend(other.edges);
        conflicts
    }

    /// Replace fallback endpoint labels with the label of the node now known
    /// under that identity. Returns the number of labels replaced.
    pub fn resolve_fallback_labels(&mut self) -> usize {
        let mut resolved = 0;
        for edge in &mut self.edges {
            for end in [&mut edge.source, &mut edge.target] {
                if end.label != crate::namespace::naming::FALLBACK_LABEL {
                    continue;
                }
                if let Some(&i) = self.index.get(&end.identity) {
                    end.label = self.nodes[i].label.clone();
                    resolved += 1;
                }
            }
        }
        resolved
    }

    pub fn node(&self, identity: &str) -> Option<&GraphNode> {
        self.index.get(identity).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.index.contains_key(identity)
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Edges of one kind pointing at `identity`.
    pub fn incoming(&self, identity: &str, kind: EdgeKind) -> impl Iterator<Item = &GraphEdge> {
        let identity = identity.to_string();
        self.edges
            .iter()
            .filter(move |e| e.kind == kind && e.target.identity == identity)
    }

    /// Edges whose target identity is not a node of this graph.
    pub fn dangling_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(|e| !self.contains(&e.target.identity))
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            nodes: self.nodes.len(),
            ..Default::default()
        };
        for edge in &self.edges {
            match edge.kind {
                EdgeKind::Containment => stats.containment += 1,
                EdgeKind::Association => stats.association += 1,
                EdgeKind::Reference => stats.reference += 1,
            }
        }
        stats.dangling = self.dangling_edges().count();
        stats
    }

    fn reindex(&mut self) {
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.identity.clone(), i))
            .collect();
    }
}

/// Counts over a graph.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub containment: usize,
    pub association: usize,
    pub reference: usize,
    pub dangling: usize,
}

impl std::fmt::Display for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Nodes:        {}", self.nodes)?;
        writeln!(f, "Edges:")?;
        writeln!(f, "  Contains:   {}", self.containment)?;
        writeln!(f, "  Associates: {}", self.association)?;
        writeln!(f, "  References: {}", self.reference)?;
        if self.dangling > 0 {
            writeln!(f, "Dangling:     {}", self.dangling)?;
        }
        Ok(())
    }
}
