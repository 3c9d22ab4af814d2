//! CMF (common model format) XML reader.
//!
//! Only the parts of CMF that feed descriptor generation are read: namespaces,
//! classes with `SubClassOf` and `ChildPropertyAssociation`, object and data
//! properties, and datatypes. Components are linked by `structures:id` /
//! `structures:ref`; a component's qname is its namespace prefix plus `Name`,
//! or its id with the first `.` read as `:` when either is missing.

use std::collections::HashMap;

use super::{ChildProperty, ClassDef, ClassModel, PropertyDef, PropertyKind, SchemaError};
use crate::document::{Document, DocumentFormat, Element};
use crate::namespace::{join_qname, NamespaceMap};

const MODEL: &str = "Model";
const COMPONENTS: [&str; 4] = ["Class", "ObjectProperty", "DataProperty", "Datatype"];

/// Parse a CMF document into a class model.
pub fn parse_cmf(bytes: &[u8]) -> Result<ClassModel, SchemaError> {
    let document = Document::parse_as("model.cmf", bytes, DocumentFormat::Xml)?;
    let root = &document.root;
    if root.name.local != MODEL {
        return Err(SchemaError::malformed(
            "/",
            format!("expected <{}>, found <{}>", MODEL, root.name.local),
        ));
    }

    let (namespaces, prefixes) = read_namespaces(root)?;
    let qnames = read_qnames(root, &prefixes)?;
    let resolve = |id: &str| qnames.get(id).cloned().unwrap_or_else(|| fallback_qname(id));

    let mut classes = Vec::new();
    let mut properties = Vec::new();

    for element in &root.children {
        let Some(id) = id_of(element) else { continue };
        match element.name.local.as_str() {
            "Class" => classes.push(read_class(element, id, &resolve)?),
            "ObjectProperty" => properties.push(PropertyDef {
                qname: resolve(id),
                kind: PropertyKind::Object {
                    class: child_ref(element, "Class").map(&resolve),
                },
                attribute: false,
            }),
            "DataProperty" => properties.push(PropertyDef {
                qname: resolve(id),
                kind: PropertyKind::Data {
                    datatype: child_ref(element, "Datatype").map(&resolve),
                },
                attribute: child_text(element, "AttributeIndicator") == Some("true"),
            }),
            _ => {}
        }
    }

    tracing::debug!(
        namespaces = namespaces.len(),
        classes = classes.len(),
        properties = properties.len(),
        "read CMF model"
    );

    Ok(ClassModel {
        namespaces,
        classes,
        properties,
    })
}

/// Namespace table plus namespace id → prefix.
fn read_namespaces(root: &Element) -> Result<(NamespaceMap, HashMap<String, String>), SchemaError> {
    let mut namespaces = NamespaceMap::new();
    let mut prefixes = HashMap::new();

    for (i, ns) in children(root, "Namespace").enumerate() {
        let location = format!("Namespace[{}]", i);
        let uri = child_text(ns, "NamespaceURI")
            .ok_or_else(|| SchemaError::malformed(&location, "missing NamespaceURI"))?;
        let prefix = child_text(ns, "NamespacePrefixText")
            .or_else(|| id_of(ns))
            .ok_or_else(|| SchemaError::malformed(&location, "missing NamespacePrefixText"))?;

        if !namespaces.insert_if_absent(prefix, uri) {
            tracing::warn!(prefix, uri, "duplicate namespace prefix in model, keeping the first");
        }
        prefixes.insert(id_of(ns).unwrap_or(prefix).to_string(), prefix.to_string());
    }

    Ok((namespaces, prefixes))
}

/// Component id → qname.
fn read_qnames(root: &Element, prefixes: &HashMap<String, String>) -> Result<HashMap<String, String>, SchemaError> {
    let mut qnames = HashMap::new();

    for kind in COMPONENTS {
        for (i, component) in children(root, kind).enumerate() {
            let id = id_of(component)
                .ok_or_else(|| SchemaError::malformed(format!("{}[{}]", kind, i), "missing structures:id"))?;

            let prefix = child_ref(component, "Namespace").and_then(|r| prefixes.get(r));
            let qname = match (child_text(component, "Name"), prefix) {
                (Some(name), Some(prefix)) => join_qname(Some(prefix), name),
                _ => fallback_qname(id),
            };
            qnames.insert(id.to_string(), qname);
        }
    }

    Ok(qnames)
}

fn read_class(element: &Element, id: &str, resolve: &impl Fn(&str) -> String) -> Result<ClassDef, SchemaError> {
    let mut class = ClassDef::new(resolve(id));
    class.parent = child_ref(element, "SubClassOf").map(resolve);

    for (j, assoc) in children(element, "ChildPropertyAssociation").enumerate() {
        let property = child_ref(assoc, "ObjectProperty")
            .or_else(|| child_ref(assoc, "DataProperty"))
            .ok_or_else(|| {
                SchemaError::malformed(
                    format!("Class {}/ChildPropertyAssociation[{}]", id, j),
                    "no ObjectProperty or DataProperty reference",
                )
            })?;

        class.children.push(ChildProperty {
            property: resolve(property),
            min: child_text(assoc, "MinOccursQuantity").map(str::to_string),
            max: child_text(assoc, "MaxOccursQuantity").map(str::to_string),
        });
    }

    Ok(class)
}

fn fallback_qname(id: &str) -> String {
    id.replacen('.', ":", 1)
}

fn children<'a>(element: &'a Element, local: &'a str) -> impl Iterator<Item = &'a Element> {
    element.children.iter().filter(move |c| c.name.local == local)
}

fn child_text<'a>(element: &'a Element, local: &'a str) -> Option<&'a str> {
    children(element, local).next().and_then(Element::text)
}

fn child_ref<'a>(element: &'a Element, local: &'a str) -> Option<&'a str> {
    children(element, local)
        .next()
        .and_then(|c| c.find_attribute(|name| name.local == "ref"))
}

fn id_of(element: &Element) -> Option<&str> {
    element.find_attribute(|name| name.local == "id")
}
