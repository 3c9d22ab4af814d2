//! Class models and descriptor generation.
//!
//! A [`ClassModel`] is the neutral form of a schema: namespaces, classes with
//! their parent and child properties, and property definitions. It can be read
//! from a CMF XML file ([`cmf`]) or from its own JSON/YAML serialization, and
//! is turned into a mapping descriptor by [`generator`].

pub mod cmf;
mod error;
pub mod generator;

pub use error::SchemaError;
pub use generator::{generate, Generation, GeneratorOptions};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::namespace::NamespaceMap;

/// A child property of a class, with its occurrence bounds as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildProperty {
    pub property: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
}

impl ChildProperty {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            min: None,
            max: None,
        }
    }

    pub fn with_bounds(mut self, min: &str, max: &str) -> Self {
        self.min = Some(min.to_string());
        self.max = Some(max.to_string());
        self
    }
}

/// A class of the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    pub qname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub children: Vec<ChildProperty>,
}

impl ClassDef {
    pub fn new(qname: impl Into<String>) -> Self {
        Self {
            qname: qname.into(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_child(mut self, child: ChildProperty) -> Self {
        self.children.push(child);
        self
    }
}

/// What a property holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyKind {
    /// An object of the bound class (unbound if `None`).
    Object {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class: Option<String>,
    },
    /// A literal of the given datatype.
    Data {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        datatype: Option<String>,
    },
}

/// A property definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub qname: String,
    #[serde(flatten)]
    pub kind: PropertyKind,
    /// Data property carried as an attribute rather than an element.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub attribute: bool,
}

impl PropertyDef {
    pub fn object(qname: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            qname: qname.into(),
            kind: PropertyKind::Object {
                class: Some(class.into()),
            },
            attribute: false,
        }
    }

    pub fn data(qname: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            qname: qname.into(),
            kind: PropertyKind::Data {
                datatype: Some(datatype.into()),
            },
            attribute: false,
        }
    }

    pub fn as_attribute(mut self) -> Self {
        self.attribute = true;
        self
    }

    /// Class bound to an object property.
    pub fn class(&self) -> Option<&str> {
        match &self.kind {
            PropertyKind::Object { class } => class.as_deref(),
            PropertyKind::Data { .. } => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, PropertyKind::Object { .. })
    }
}

/// Class/property model of a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassModel {
    #[serde(default)]
    pub namespaces: NamespaceMap,
    #[serde(default)]
    pub classes: Vec<ClassDef>,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
}

impl ClassModel {
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self, SchemaError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load a model file: `.xml`/`.cmf` as CMF, `.json`, `.yaml`/`.yml` as serialized models.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let read = || std::fs::read(path).map_err(|e| SchemaError::io(path, e));

        match ext.as_deref() {
            Some("xml") | Some("cmf") => cmf::parse_cmf(&read()?),
            Some("json") => Self::from_json(&String::from_utf8_lossy(&read()?)),
            Some("yaml") | Some("yml") => Self::from_yaml(&String::from_utf8_lossy(&read()?)),
            _ => Err(SchemaError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Lookup tables by qname; the first definition of a qname wins.
    pub fn index(&self) -> ModelIndex<'_> {
        let mut classes = HashMap::new();
        for class in &self.classes {
            classes.entry(class.qname.as_str()).or_insert(class);
        }
        let mut properties = HashMap::new();
        for property in &self.properties {
            properties.entry(property.qname.as_str()).or_insert(property);
        }
        ModelIndex { classes, properties }
    }
}

/// Borrowed lookup tables over a [`ClassModel`].
#[derive(Debug)]
pub struct ModelIndex<'a> {
    classes: HashMap<&'a str, &'a ClassDef>,
    properties: HashMap<&'a str, &'a PropertyDef>,
}

impl<'a> ModelIndex<'a> {
    pub fn class(&self, qname: &str) -> Option<&'a ClassDef> {
        self.classes.get(qname).copied()
    }

    pub fn property(&self, qname: &str) -> Option<&'a PropertyDef> {
        self.properties.get(qname).copied()
    }
}
