//! Cypher statements (Neo4j, Memgraph, any openCypher store with MERGE).

use super::{Statement, StatementWriter};
use crate::graph::{GraphEdge, GraphNode, PropertyMap, PropertyValue, Scalar};

pub(super) struct CypherWriter<'a> {
    id_property: &'a str,
}

impl<'a> CypherWriter<'a> {
    pub(super) fn new(id_property: &'a str) -> Self {
        Self { id_property }
    }

    fn pattern(&self, var: &str, identity: &str, label: &str) -> String {
        format!(
            "({}:{} {{{}: {}}})",
            var,
            ident(label),
            ident(self.id_property),
            string(identity)
        )
    }
}

impl StatementWriter for CypherWriter<'_> {
    fn node(&self, node: &GraphNode) -> Statement {
        let mut sets = vec![coalesce("n", "qname", &string(&node.qname))];
        for (key, value) in &node.properties {
            sets.push(coalesce("n", key, &value_literal(value)));
        }
        Statement::new(format!(
            "MERGE {} SET {};",
            self.pattern("n", &node.identity, &node.label),
            sets.join(", ")
        ))
    }

    fn placeholder(&self, identity: &str, label: &str) -> Statement {
        Statement::new(format!("MERGE {};", self.pattern("n", identity, label)))
    }

    fn edge(&self, edge: &GraphEdge) -> Statement {
        let mut text = format!(
            "MERGE {} MERGE {} MERGE (a)-[r:{}]->(b)",
            self.pattern("a", &edge.source.identity, &edge.source.label),
            self.pattern("b", &edge.target.identity, &edge.target.label),
            ident(&edge.rel_type)
        );
        if !edge.properties.is_empty() {
            text.push_str(" SET ");
            text.push_str(&assignments("r", &edge.properties).join(", "));
        }
        text.push(';');
        Statement::new(text)
    }
}

/// `var.key = coalesce(var.key, value)`: keeps a value already stored.
fn coalesce(var: &str, key: &str, literal: &str) -> String {
    let target = format!("{}.{}", var, ident(key));
    format!("{} = coalesce({}, {})", target, target, literal)
}

fn assignments(var: &str, properties: &PropertyMap) -> Vec<String> {
    properties
        .iter()
        .map(|(key, value)| format!("{}.{} = {}", var, ident(key), value_literal(value)))
        .collect()
}

/// Backtick-quoted identifier.
pub(super) fn ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Single-quoted string literal.
pub(super) fn string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn scalar_literal(value: &Scalar) -> String {
    match value {
        Scalar::Boolean(b) => b.to_string(),
        Scalar::Integer(i) => i.to_string(),
        Scalar::Float(f) if f.is_finite() => format!("{:?}", f),
        Scalar::Float(f) => string(&f.to_string()),
        Scalar::String(s) => string(s),
    }
}

fn value_literal(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Scalar(s) => scalar_literal(s),
        PropertyValue::List(items) => {
            // property arrays must be homogeneous; mixed lists are stored as text
            let mixed = items
                .windows(2)
                .any(|pair| std::mem::discriminant(&pair[0]) != std::mem::discriminant(&pair[1]));
            let items: Vec<String> = if mixed {
                items.iter().map(|s| string(&s.as_text())).collect()
            } else {
                items.iter().map(scalar_literal).collect()
            };
            format!("[{}]", items.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeEnd, EdgeKind};

    #[test]
    fn test_quoting() {
        assert_eq!(ident("nc:Person"), "`nc:Person`");
        assert_eq!(ident("a`b"), "`a``b`");
        assert_eq!(string("O'Brien\\x\n"), r"'O\'Brien\\x\n'");
    }

    #[test]
    fn test_node_statement() {
        let mut properties = PropertyMap::new();
        properties.insert("Name__Given".into(), PropertyValue::from("John"));
        properties.insert(
            "alias".into(),
            PropertyValue::List(vec![Scalar::from("J"), Scalar::Integer(7), Scalar::Float(1.5)]),
        );
        properties.insert(
            "scores".into(),
            PropertyValue::List(vec![Scalar::Integer(1), Scalar::Integer(2)]),
        );
        let node = GraphNode::new("P1", "Person", "Person").with_properties(properties);

        let statement = CypherWriter::new("id").node(&node);
        assert_eq!(
            statement.as_str(),
            "MERGE (n:`Person` {`id`: 'P1'}) SET n.`qname` = coalesce(n.`qname`, 'Person'), \
             n.`Name__Given` = coalesce(n.`Name__Given`, 'John'), \
             n.`alias` = coalesce(n.`alias`, ['J', '7', '1.5']), \
             n.`scores` = coalesce(n.`scores`, [1, 2]);"
        );
    }

    #[test]
    fn test_edge_statement() {
        let mut properties = PropertyMap::new();
        properties.insert("j:Since".into(), PropertyValue::from("2020"));
        let edge = GraphEdge::new(
            EdgeKind::Association,
            "J_OWNS",
            EdgeEnd::new("P1", "nc_Person"),
            EdgeEnd::new("V1", "nc_Vehicle"),
        )
        .with_properties(properties);

        let statement = CypherWriter::new("uid").edge(&edge);
        assert_eq!(
            statement.as_str(),
            "MERGE (a:`nc_Person` {`uid`: 'P1'}) MERGE (b:`nc_Vehicle` {`uid`: 'V1'}) \
             MERGE (a)-[r:`J_OWNS`]->(b) SET r.`j:Since` = '2020';"
        );
    }
}
