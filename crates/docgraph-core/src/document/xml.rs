//! XML loading via quick-xml.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{Attribute, Element, ParseError, XName};
use crate::namespace::NamespaceMap;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Namespace bindings declared on one element; `None` is the default namespace.
type Scope = Vec<(Option<String>, String)>;

/// Parse an XML document into its root element and the prefixed namespaces it declares.
pub fn parse_xml(text: &str) -> Result<(Element, NamespaceMap), ParseError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut scopes: Vec<Scope> = Vec::new();
    let mut open: Vec<Element> = Vec::new();
    let mut namespaces = NamespaceMap::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position();
        let event = reader.read_event().map_err(|e| ParseError::Xml {
            position,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(start) => {
                let element = open_element(&start, position, &mut scopes, &mut namespaces)?;
                open.push(element);
            }
            Event::Empty(start) => {
                let element = open_element(&start, position, &mut scopes, &mut namespaces)?;
                scopes.pop();
                attach(element, &mut open, &mut root)?;
            }
            Event::End(_) => {
                let element = open.pop().ok_or_else(|| ParseError::Xml {
                    position,
                    message: "unexpected closing tag".to_string(),
                })?;
                scopes.pop();
                attach(element, &mut open, &mut root)?;
            }
            Event::Text(t) => {
                let value = t.unescape().map_err(|e| ParseError::Xml {
                    position,
                    message: e.to_string(),
                })?;
                append_text(&mut open, &value);
            }
            Event::CData(c) => {
                let raw = c.into_inner();
                let value = String::from_utf8_lossy(&raw);
                append_text(&mut open, &value);
            }
            Event::Eof => break,
            // declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if !open.is_empty() {
        return Err(ParseError::Xml {
            position: text.len(),
            message: format!("unclosed element <{}>", open[open.len() - 1].name.local),
        });
    }

    let root = root.ok_or_else(|| ParseError::Structure("document has no root element".to_string()))?;
    Ok((root, namespaces))
}

fn open_element(
    start: &BytesStart<'_>,
    position: usize,
    scopes: &mut Vec<Scope>,
    namespaces: &mut NamespaceMap,
) -> Result<Element, ParseError> {
    let xml_err = |message: String| ParseError::Xml { position, message };

    let mut scope = Scope::new();
    let mut raw_attributes = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| xml_err(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(|e| xml_err(e.to_string()))?;
        let value = attr.unescape_value().map_err(|e| xml_err(e.to_string()))?.into_owned();

        if key == "xmlns" {
            scope.push((None, value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            namespaces.insert_if_absent(prefix, &value);
            scope.push((Some(prefix.to_string()), value));
        } else {
            raw_attributes.push((key.to_string(), value));
        }
    }
    scopes.push(scope);

    let raw_name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| xml_err(e.to_string()))?
        .to_string();
    let mut element = Element::new(expand(&raw_name, scopes, true));

    for (key, value) in raw_attributes {
        element.attributes.push(Attribute {
            name: expand(&key, scopes, false),
            value,
        });
    }

    Ok(element)
}

/// Expand a raw `prefix:local` name against the open scopes.
///
/// Unprefixed attributes are in no namespace; unprefixed elements take the
/// innermost default namespace. An unbound prefix keeps its prefix with no URI.
fn expand(raw: &str, scopes: &[Scope], is_element: bool) -> XName {
    let (prefix, local) = match raw.split_once(':') {
        Some((p, l)) => (Some(p), l),
        None => (None, raw),
    };

    let namespace = match prefix {
        Some("xml") => Some(XML_NAMESPACE.to_string()),
        Some(p) => lookup(scopes, Some(p)),
        None if is_element => lookup(scopes, None).filter(|uri| !uri.is_empty()),
        None => None,
    };

    XName {
        prefix: prefix.map(str::to_string),
        local: local.to_string(),
        namespace,
    }
}

fn lookup(scopes: &[Scope], prefix: Option<&str>) -> Option<String> {
    scopes.iter().rev().find_map(|scope| {
        scope
            .iter()
            .rev()
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, uri)| uri.clone())
    })
}

fn attach(element: Element, open: &mut [Element], root: &mut Option<Element>) -> Result<(), ParseError> {
    if let Some(parent) = open.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(ParseError::Structure("document has more than one root element".to_string()));
    }
    *root = Some(element);
    Ok(())
}

fn append_text(open: &mut [Element], value: &str) {
    if let Some(current) = open.last_mut() {
        current.text.push_str(value.trim());
    }
}
