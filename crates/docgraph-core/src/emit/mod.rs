//! Graph-store statements from a property graph.
//!
//! Two dialects are supported. Both are idempotent: applying the same
//! statements twice leaves the store as after the first time, and node
//! properties already present in the store are kept.

mod cypher;
mod surreal;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::DEFAULT_ID_PROPERTY;
use crate::graph::{GraphEdge, GraphNode, PropertyGraph};

/// Statement language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Dialect {
    /// Neo4j / openCypher.
    #[default]
    #[serde(rename = "cypher")]
    Cypher,
    /// SurrealDB.
    #[serde(rename = "surrealql")]
    SurrealQl,
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cypher" | "neo4j" => Ok(Self::Cypher),
            "surrealql" | "surreal" | "surrealdb" => Ok(Self::SurrealQl),
            other => Err(format!("unknown dialect: {}", other)),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cypher => write!(f, "cypher"),
            Self::SurrealQl => write!(f, "surrealql"),
        }
    }
}

/// One statement, terminated with `;`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Statement(String);

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitOptions {
    pub dialect: Dialect,
    /// Node property holding the identity.
    pub id_property: String,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            id_property: DEFAULT_ID_PROPERTY.to_string(),
        }
    }
}

impl EmitOptions {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    pub fn with_id_property(mut self, property: impl Into<String>) -> Self {
        self.id_property = property.into();
        self
    }
}

/// Per-dialect statement builder.
trait StatementWriter {
    fn node(&self, node: &GraphNode) -> Statement;
    /// Stand-in for an edge target that is not in the graph.
    fn placeholder(&self, identity: &str, label: &str) -> Statement;
    fn edge(&self, edge: &GraphEdge) -> Statement;
}

/// Statements for a whole graph: nodes in table order, then edges in list
/// order, each dangling target preceded by a placeholder node.
pub fn emit(graph: &PropertyGraph, options: &EmitOptions) -> Vec<Statement> {
    match options.dialect {
        Dialect::Cypher => write_all(graph, &cypher::CypherWriter::new(&options.id_property)),
        Dialect::SurrealQl => write_all(graph, &surreal::SurrealWriter::new(&options.id_property)),
    }
}

fn write_all(graph: &PropertyGraph, writer: &impl StatementWriter) -> Vec<Statement> {
    let mut statements: Vec<Statement> = graph.nodes().iter().map(|n| writer.node(n)).collect();

    let mut placed = HashSet::new();
    for edge in graph.edges() {
        for end in [&edge.source, &edge.target] {
            if !graph.contains(&end.identity) && placed.insert(end.identity.as_str()) {
                statements.push(writer.placeholder(&end.identity, &end.label));
            }
        }
        statements.push(writer.edge(edge));
    }

    statements
}

/// Statements joined into a script, one per line.
pub fn render_script(statements: &[Statement]) -> String {
    let mut script = String::new();
    for statement in statements {
        script.push_str(statement.as_str());
        script.push('\n');
    }
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConflictPolicy, EdgeEnd, EdgeKind};

    fn graph() -> PropertyGraph {
        let mut graph = PropertyGraph::new();
        graph.upsert_node(GraphNode::new("P1", "nc_Person", "nc:Person"), ConflictPolicy::KeepFirst);
        graph.push_edge(GraphEdge::new(
            EdgeKind::Reference,
            "OWNER",
            EdgeEnd::new("P1", "nc_Person"),
            EdgeEnd::new("V9", "Unknown"),
        ));
        graph.push_edge(GraphEdge::new(
            EdgeKind::Reference,
            "DRIVER",
            EdgeEnd::new("P1", "nc_Person"),
            EdgeEnd::new("V9", "Unknown"),
        ));
        graph
    }

    #[test]
    fn test_dialect_parse() {
        assert_eq!("surreal".parse::<Dialect>().unwrap(), Dialect::SurrealQl);
        assert_eq!("Cypher".parse::<Dialect>().unwrap(), Dialect::Cypher);
        assert!("sql".parse::<Dialect>().is_err());
        assert_eq!(Dialect::SurrealQl.to_string(), "surrealql");
    }

    #[test]
    fn test_order_and_single_placeholder() {
        for dialect in [Dialect::Cypher, Dialect::SurrealQl] {
            let statements = emit(&graph(), &EmitOptions::new(dialect));
            // node, placeholder, edge, edge
            assert_eq!(statements.len(), 4, "{dialect}");
            assert!(statements.iter().all(|s| s.as_str().ends_with(';')));
        }
    }

    #[test]
    fn test_render_script() {
        let script = render_script(&[Statement::new("A;"), Statement::new("B;")]);
        assert_eq!(script, "A;\nB;\n");
    }
}
