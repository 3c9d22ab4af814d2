//! Document trees for conversion.
//!
//! Both XML and JSON inputs are loaded into the same [`Element`] tree with
//! expanded names, so the traversal engine never sees the wire format.

mod json;
mod xml;

pub use json::{parse_json, JSON_ROOT_NAME};
pub use xml::parse_xml;

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::graph::identity::digest_hex;
use crate::namespace::NamespaceMap;

/// Namespace URI of the structures vocabulary (identifier/reference attributes).
pub const STRUCTURES_NAMESPACE: &str =
    "https://docs.oasis-open.org/niemopen/ns/model/structures/6.0/";

/// Namespace URI of XML Schema instance attributes (`xsi:type`).
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Errors raised while loading a document tree.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Input is not valid UTF-8.
    #[error("invalid UTF-8 at byte {0}")]
    Encoding(usize),

    /// Malformed XML.
    #[error("XML error at byte {position}: {message}")]
    Xml { position: usize, message: String },

    /// Malformed JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed input that does not describe a single element tree.
    #[error("{0}")]
    Structure(String),
}

/// An expanded name: the prefix as written, the local part, and the bound URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct XName {
    pub prefix: Option<String>,
    pub local: String,
    pub namespace: Option<String>,
}

impl XName {
    /// A name in no namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
            namespace: None,
        }
    }

    /// A prefixed name bound to a namespace.
    pub fn qualified(prefix: impl Into<String>, local: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            local: local.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// Check whether this is the `xsi:type` attribute.
    pub fn is_xsi_type(&self) -> bool {
        self.local == "type"
            && (self.namespace.as_deref() == Some(XSI_NAMESPACE) || self.prefix.as_deref() == Some("xsi"))
    }
}

/// An attribute with its unescaped value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: XName,
    pub value: String,
}

/// An element of a document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub name: XName,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Element>,
    /// Character data directly inside this element, trimmed.
    pub text: String,
}

impl Element {
    pub fn new(name: XName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
            text: String::new(),
        }
    }

    pub fn with_attribute(mut self, name: XName, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            name,
            value: value.into(),
        });
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Whether the element has any child elements.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Non-empty text content.
    pub fn text(&self) -> Option<&str> {
        let text = self.text.trim();
        (!text.is_empty()).then_some(text)
    }

    /// Value of the first attribute whose name satisfies `matches`.
    pub fn find_attribute(&self, matches: impl Fn(&XName) -> bool) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| matches(&a.name))
            .map(|a| a.value.as_str())
    }
}

/// Input format of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Xml,
    Json,
}

impl DocumentFormat {
    /// Guess the format from the key's extension, then from the first byte.
    pub fn detect(key: &str, bytes: &[u8]) -> Self {
        let ext = Path::new(key)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("json") | Some("jsonld") => Self::Json,
            Some("xml") => Self::Xml,
            _ => match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
                Some(b'{') | Some(b'[') => Self::Json,
                _ => Self::Xml,
            },
        }
    }
}

/// A loaded document ready for conversion.
#[derive(Debug, Clone)]
pub struct Document {
    /// Storage key or path the document was read from.
    pub key: String,
    pub root: Element,
    /// Every prefixed namespace declaration in the document (first binding wins).
    pub namespaces: NamespaceMap,
    /// SHA-256 of the raw bytes, hex encoded.
    pub digest: String,
}

impl Document {
    /// Parse a document, detecting the format from the key and content.
    pub fn parse(key: impl Into<String>, bytes: &[u8]) -> Result<Self, ParseError> {
        let key = key.into();
        let format = DocumentFormat::detect(&key, bytes);
        Self::parse_as(key, bytes, format)
    }

    /// Parse a document in a known format.
    pub fn parse_as(key: impl Into<String>, bytes: &[u8], format: DocumentFormat) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(bytes).map_err(|e| ParseError::Encoding(e.valid_up_to()))?;
        let (root, namespaces) = match format {
            DocumentFormat::Xml => parse_xml(text)?,
            DocumentFormat::Json => parse_json(text)?,
        };

        Ok(Self {
            key: key.into(),
            root,
            namespaces,
            digest: digest_hex(bytes),
        })
    }
}
