//! JSON loading.
//!
//! JSON records map onto the element model like this:
//!
//! - `@context` (object of prefix → URI strings) declares namespaces
//! - `@id` becomes the structures identifier attribute
//! - an object whose only member is `@id` is a reference (structures `ref`)
//! - `@type` becomes `xsi:type`; other `@name` members become plain attributes
//! - arrays become repeated sibling elements, scalars become leaf text

use serde_json::{Map, Value};

use super::{Element, ParseError, XName, STRUCTURES_NAMESPACE, XSI_NAMESPACE};
use crate::namespace::NamespaceMap;

/// Name of the synthetic root element when the top-level object has several members.
pub const JSON_ROOT_NAME: &str = "Document";

/// Parse a JSON record into a root element and its declared namespaces.
pub fn parse_json(text: &str) -> Result<(Element, NamespaceMap), ParseError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(top) = value else {
        return Err(ParseError::Structure("top-level JSON value must be an object".to_string()));
    };

    let mut namespaces = NamespaceMap::new();
    if let Some(Value::Object(context)) = top.get("@context") {
        for (prefix, uri) in context {
            if let Value::String(uri) = uri {
                namespaces.insert_if_absent(prefix, uri);
            }
        }
    }

    let members: Vec<(&String, &Value)> = top.iter().filter(|(k, _)| !k.starts_with('@')).collect();

    let root = match members.as_slice() {
        [(key, Value::Object(body))] => object_element(name_for(key, &namespaces), body, &namespaces),
        _ => object_element(XName::local(JSON_ROOT_NAME), &top, &namespaces),
    };

    Ok((root, namespaces))
}

fn name_for(key: &str, namespaces: &NamespaceMap) -> XName {
    match key.split_once(':') {
        Some((prefix, local)) => XName {
            prefix: Some(prefix.to_string()),
            local: local.to_string(),
            namespace: namespaces.uri(prefix).map(str::to_string),
        },
        None => XName::local(key),
    }
}

fn structures(local: &str) -> XName {
    XName::qualified("structures", local, STRUCTURES_NAMESPACE)
}

fn object_element(name: XName, body: &Map<String, Value>, namespaces: &NamespaceMap) -> Element {
    let mut element = Element::new(name);

    let only_id = body.len() == 1 && body.contains_key("@id");

    for (key, value) in body {
        match key.as_str() {
            "@context" => {}
            "@id" => {
                let local = if only_id { "ref" } else { "id" };
                element = element.with_attribute(structures(local), scalar_text(value));
            }
            "@type" => {
                element = element.with_attribute(XName::qualified("xsi", "type", XSI_NAMESPACE), scalar_text(value));
            }
            attr if attr.starts_with('@') => {
                element = element.with_attribute(name_for(&attr[1..], namespaces), scalar_text(value));
            }
            _ => push_members(&mut element, key, value, namespaces),
        }
    }

    element
}

fn push_members(parent: &mut Element, key: &str, value: &Value, namespaces: &NamespaceMap) {
    match value {
        Value::Array(items) => {
            for item in items {
                push_members(parent, key, item, namespaces);
            }
        }
        Value::Object(body) => parent.children.push(object_element(name_for(key, namespaces), body, namespaces)),
        Value::Null => parent.children.push(Element::new(name_for(key, namespaces))),
        scalar => parent
            .children
            .push(Element::new(name_for(key, namespaces)).with_text(scalar_text(scalar))),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
