//! SurrealQL statements.
//!
//! Nodes become records in a table named after their label, keyed by
//! identity. Edges become `RELATE` records whose id is derived from the edge
//! itself, so re-applying a script does not duplicate them.

use sha2::{Digest, Sha256};

use super::{Statement, StatementWriter};
use crate::graph::{GraphEdge, GraphNode, PropertyMap, PropertyValue};

pub(super) struct SurrealWriter<'a> {
    id_property: &'a str,
}

impl<'a> SurrealWriter<'a> {
    pub(super) fn new(id_property: &'a str) -> Self {
        Self { id_property }
    }

    /// Identity stored as a field too, unless it is the record id itself.
    fn id_field(&self, identity: &str) -> Option<String> {
        (self.id_property != "id").then(|| additive(self.id_property, &json_string(identity)))
    }
}

impl StatementWriter for SurrealWriter<'_> {
    fn node(&self, node: &GraphNode) -> Statement {
        let mut sets: Vec<String> = self.id_field(&node.identity).into_iter().collect();
        sets.push(additive("qname", &json_string(&node.qname)));
        for (key, value) in &node.properties {
            sets.push(additive(key, &json_value(value)));
        }
        Statement::new(format!(
            "UPSERT {} SET {} RETURN NONE;",
            record(&node.label, &node.identity),
            sets.join(", ")
        ))
    }

    fn placeholder(&self, identity: &str, label: &str) -> Statement {
        match self.id_field(identity) {
            Some(set) => Statement::new(format!(
                "UPSERT {} SET {} RETURN NONE;",
                record(label, identity),
                set
            )),
            None => Statement::new(format!("UPSERT {} RETURN NONE;", record(label, identity))),
        }
    }

    fn edge(&self, edge: &GraphEdge) -> Statement {
        let mut content = vec![format!("kind: {}", json_string(&edge.kind.to_string()))];
        content.extend(fields(&edge.properties));
        Statement::new(format!(
            "RELATE {}->{}->{} CONTENT {{ {} }} RETURN NONE;",
            record(&edge.source.label, &edge.source.identity),
            record(&edge.rel_type, &edge_key(edge)),
            record(&edge.target.label, &edge.target.identity),
            content.join(", ")
        ))
    }
}

/// `` `key` = `key` ?? value ``: only fills a field that is still unset.
fn additive(key: &str, literal: &str) -> String {
    let field = ident(key);
    format!("{} = {} ?? {}", field, field, literal)
}

fn fields(properties: &PropertyMap) -> impl Iterator<Item = String> + '_ {
    properties
        .iter()
        .map(|(key, value)| format!("{}: {}", ident(key), json_value(value)))
}

/// `` `table`:⟨id⟩ ``
fn record(table: &str, id: &str) -> String {
    let id = id.replace('\\', "\\\\").replace('⟩', "\\⟩");
    format!("{}:⟨{}⟩", ident(table), id)
}

fn ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "\\`"))
}

/// `h` + first 16 hex digits of the edge digest.
fn edge_key(edge: &GraphEdge) -> String {
    let mut hasher = Sha256::new();
    for part in [
        edge.source.identity.as_str(),
        edge.rel_type.as_str(),
        edge.target.identity.as_str(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    hasher.update(edge.kind.to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("h{}", &digest[..16])
}

fn json_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".into())
}

fn json_value(value: &PropertyValue) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "NONE".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeEnd, EdgeKind, Scalar};

    fn edge() -> GraphEdge {
        GraphEdge::new(
            EdgeKind::Containment,
            "HAS_NAME",
            EdgeEnd::new("P1", "Person"),
            EdgeEnd::new("ab12", "Name"),
        )
    }

    #[test]
    fn test_node_statement() {
        let mut properties = PropertyMap::new();
        properties.insert("age".into(), PropertyValue::Scalar(Scalar::Integer(40)));
        properties.insert("Name__Given".into(), PropertyValue::from("Jo\"hn"));
        let node = GraphNode::new("P1", "nc_Person", "nc:Person").with_properties(properties);

        let statement = SurrealWriter::new("id").node(&node);
        assert_eq!(
            statement.as_str(),
            r#"UPSERT `nc_Person`:⟨P1⟩ SET `qname` = `qname` ?? "nc:Person", `Name__Given` = `Name__Given` ?? "Jo\"hn", `age` = `age` ?? 40 RETURN NONE;"#
        );
    }

    #[test]
    fn test_custom_id_property_is_set() {
        let statement = SurrealWriter::new("uid").placeholder("V⟩9", "Unknown");
        assert_eq!(
            statement.as_str(),
            r#"UPSERT `Unknown`:⟨V\⟩9⟩ SET `uid` = `uid` ?? "V⟩9" RETURN NONE;"#
        );
        let bare = SurrealWriter::new("id").placeholder("V9", "Unknown");
        assert_eq!(bare.as_str(), "UPSERT `Unknown`:⟨V9⟩ RETURN NONE;");
    }

    #[test]
    fn test_record_escapes_backslash_before_bracket() {
        assert_eq!(record("L", "a\\"), r"`L`:⟨a\\⟩");
        assert_eq!(record("L", r"x\⟩y"), r"`L`:⟨x\\\⟩y⟩");
        let statement = SurrealWriter::new("id").placeholder("a\\", "Unknown");
        assert_eq!(statement.as_str(), r"UPSERT `Unknown`:⟨a\\⟩ RETURN NONE;");
    }

    #[test]
    fn test_edge_id_is_stable() {
        let writer = SurrealWriter::new("id");
        let first = writer.edge(&edge());
        let second = writer.edge(&edge());
        assert_eq!(first, second);
        assert!(first.as_str().starts_with("RELATE `Person`:⟨P1⟩->`HAS_NAME`:⟨h"));
        assert!(first.as_str().contains(r#"CONTENT { kind: "containment" }"#));

        let mut other = edge();
        other.target.identity = "cd34".into();
        assert_ne!(edge_key(&edge()), edge_key(&other));
        assert_eq!(edge_key(&edge()).len(), 17);
    }
}
