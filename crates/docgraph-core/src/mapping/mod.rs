//! Mapping descriptors.
//!
//! A descriptor tells the conversion engine which elements become nodes,
//! which become edges, and how leaf values are named and typed. Descriptors
//! are produced by [`crate::schema::generator`] and stored as JSON or YAML.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::graph::Scalar;
use crate::namespace::naming::FALLBACK_LABEL;
use crate::namespace::NamespaceMap;

/// Errors raised while reading or writing a descriptor.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("failed to access descriptor {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid descriptor JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid descriptor YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported descriptor format: {0} (expected .json, .yaml or .yml)")]
    UnsupportedFormat(PathBuf),
}

impl MappingError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Serialization format of a descriptor file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorFormat {
    #[default]
    Json,
    Yaml,
}

impl DescriptorFormat {
    /// Format implied by a file extension.
    pub fn from_path(path: &Path) -> Result<Self, MappingError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            _ => Err(MappingError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

impl std::str::FromStr for DescriptorFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(format!("unknown descriptor format: {}", other)),
        }
    }
}

/// How the actual type of a polymorphic element is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolymorphismPolicy {
    /// Ignore `xsi:type`; the node keeps only its declared type.
    DeclaredOnly,
    /// Record the `xsi:type` value as a property.
    #[default]
    ActualTypeProperty,
}

/// Property key holding the actual type under [`PolymorphismPolicy::ActualTypeProperty`].
pub const ACTUAL_TYPE_KEY: &str = "@xsi:type";

/// Occurrence bounds, kept verbatim from the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cardinality {
    pub min: String,
    pub max: String,
}

impl Cardinality {
    pub const DEFAULT_MIN: &'static str = "0";
    pub const DEFAULT_MAX: &'static str = "*";

    /// Bounds with defaults substituted for missing values.
    pub fn from_bounds(min: Option<&str>, max: Option<&str>) -> Self {
        let pick = |v: Option<&str>, default: &str| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(default)
                .to_string()
        };
        Self {
            min: pick(min, Self::DEFAULT_MIN),
            max: pick(max, Self::DEFAULT_MAX),
        }
    }
}

impl Default for Cardinality {
    fn default() -> Self {
        Self::from_bounds(None, None)
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.min, self.max)
    }
}

/// Value type of a scalar property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[default]
    String,
    Integer,
    Decimal,
    Boolean,
}

impl ValueKind {
    /// Kind for a datatype qname such as `xs:int` or `niem-xs:boolean`.
    pub fn from_datatype(datatype: &str) -> Self {
        let local = crate::namespace::local_name(datatype).to_ascii_lowercase();
        let base = local
            .strip_suffix("simpletype")
            .or_else(|| local.strip_suffix("type"))
            .unwrap_or(&local);

        match base {
            "boolean" => Self::Boolean,
            "integer" | "int" | "long" | "short" | "byte" | "nonnegativeinteger" | "positiveinteger"
            | "negativeinteger" | "nonpositiveinteger" | "unsignedint" | "unsignedlong"
            | "unsignedshort" | "unsignedbyte" => Self::Integer,
            "decimal" | "double" | "float" => Self::Decimal,
            _ => Self::String,
        }
    }

    /// Convert leaf text; text that does not parse stays a string.
    pub fn coerce(self, text: &str) -> Scalar {
        let trimmed = text.trim();
        let coerced = match self {
            Self::String => None,
            Self::Integer => trimmed.parse::<i64>().ok().map(Scalar::Integer),
            Self::Decimal => trimmed.parse::<f64>().ok().map(Scalar::Float),
            Self::Boolean => match trimmed {
                "true" | "1" => Some(Scalar::Boolean(true)),
                "false" | "0" => Some(Scalar::Boolean(false)),
                _ => None,
            },
        };
        coerced.unwrap_or_else(|| Scalar::String(text.to_string()))
    }
}

/// A typed, renamed leaf value of an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarProp {
    /// Element path relative to the object, segments joined with `/`;
    /// attribute paths start with `@`.
    pub path: String,
    /// Property key on the node.
    pub key: String,
    #[serde(default)]
    pub kind: ValueKind,
}

/// Elements of this class become nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRule {
    pub qname: String,
    pub label: String,
    #[serde(default = "default_true")]
    pub carries_id: bool,
    /// Element qnames typed by this class.
    #[serde(default)]
    pub elements: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scalar_props: Vec<ScalarProp>,
}

fn default_true() -> bool {
    true
}

impl ObjectRule {
    pub fn new(qname: impl Into<String>) -> Self {
        let qname = qname.into();
        Self {
            label: crate::namespace::naming::label(&qname),
            elements: vec![qname.clone()],
            qname,
            carries_id: true,
            scalar_props: Vec::new(),
        }
    }

    pub fn with_elements(mut self, elements: impl IntoIterator<Item = String>) -> Self {
        for element in elements {
            if !self.elements.contains(&element) {
                self.elements.push(element);
            }
        }
        self
    }

    pub fn with_scalar_prop(mut self, prop: ScalarProp) -> Self {
        self.scalar_props.push(prop);
        self
    }

    pub fn without_carried_id(mut self) -> Self {
        self.carries_id = false;
        self
    }
}

/// One role of an association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub role_qname: String,
    pub target_label: String,
    #[serde(default)]
    pub cardinality: Cardinality,
}

/// Elements of this class become a single edge between their first two roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationRule {
    pub qname: String,
    pub rel_type: String,
    #[serde(default)]
    pub elements: Vec<String>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

impl AssociationRule {
    pub fn new(qname: impl Into<String>) -> Self {
        let qname = qname.into();
        Self {
            rel_type: crate::namespace::naming::rel_type(&qname),
            elements: vec![qname.clone()],
            qname,
            endpoints: Vec::new(),
        }
    }

    pub fn with_elements(mut self, elements: impl IntoIterator<Item = String>) -> Self {
        for element in elements {
            if !self.elements.contains(&element) {
                self.elements.push(element);
            }
        }
        self
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }
}

/// A reference-valued field of an object class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRule {
    pub owner: String,
    pub field_qname: String,
    pub target_label: String,
    pub rel_type: String,
    #[serde(default)]
    pub cardinality: Cardinality,
}

/// Elements of this class are always flattened into the enclosing node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AugmentationRule {
    pub qname: String,
    #[serde(default)]
    pub elements: Vec<String>,
}

/// The full mapping descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingDescriptor {
    #[serde(default)]
    pub namespaces: NamespaceMap,
    #[serde(default)]
    pub objects: Vec<ObjectRule>,
    #[serde(default)]
    pub associations: Vec<AssociationRule>,
    #[serde(default)]
    pub references: Vec<ReferenceRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub augmentations: Vec<AugmentationRule>,
    #[serde(default)]
    pub polymorphism: PolymorphismPolicy,
}

impl MappingDescriptor {
    /// The minimal descriptor used in dynamic mode: no rules at all.
    pub fn dynamic() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.associations.is_empty() && self.references.is_empty()
    }

    pub fn from_json(text: &str) -> Result<Self, MappingError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self, MappingError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, MappingError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String, MappingError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Serialize in the given format.
    pub fn render(&self, format: DescriptorFormat) -> Result<String, MappingError> {
        match format {
            DescriptorFormat::Json => self.to_json(),
            DescriptorFormat::Yaml => self.to_yaml(),
        }
    }

    /// Load a descriptor, choosing the format from the file extension.
    pub fn load(path: &Path) -> Result<Self, MappingError> {
        let format = DescriptorFormat::from_path(path)?;
        let text = std::fs::read_to_string(path).map_err(|e| MappingError::io(path, e))?;
        match format {
            DescriptorFormat::Json => Self::from_json(&text),
            DescriptorFormat::Yaml => Self::from_yaml(&text),
        }
    }

    /// Write a descriptor, choosing the format from the file extension.
    pub fn save(&self, path: &Path) -> Result<(), MappingError> {
        let text = self.render(DescriptorFormat::from_path(path)?)?;
        std::fs::write(path, text).map_err(|e| MappingError::io(path, e))
    }

    /// Endpoint and reference target labels that name no object rule.
    ///
    /// The fallback label is always accepted.
    pub fn unresolved_targets(&self) -> BTreeSet<String> {
        let labels: BTreeSet<&str> = self.objects.iter().map(|o| o.label.as_str()).collect();
        let targets = self
            .associations
            .iter()
            .flat_map(|a| a.endpoints.iter().map(|e| e.target_label.as_str()))
            .chain(self.references.iter().map(|r| r.target_label.as_str()));

        targets
            .filter(|t| *t != FALLBACK_LABEL && !labels.contains(t))
            .map(str::to_string)
            .collect()
    }
}

/// A descriptor with lookup tables from element qname to rule.
///
/// When several rules claim the same element qname the first one wins.
#[derive(Debug, Clone, Default)]
pub struct DescriptorIndex {
    descriptor: MappingDescriptor,
    objects: HashMap<String, usize>,
    associations: HashMap<String, usize>,
    augmentations: HashMap<String, usize>,
    references: HashMap<(String, String), usize>,
    /// Rule qname → (rule position, scalar prop path → prop position).
    scalar_props: HashMap<String, (usize, HashMap<String, usize>)>,
}

impl DescriptorIndex {
    pub fn new(descriptor: MappingDescriptor) -> Self {
        fn by_element<'a>(rules: impl Iterator<Item = &'a Vec<String>>) -> HashMap<String, usize> {
            let mut table = HashMap::new();
            for (i, elements) in rules.enumerate() {
                for element in elements {
                    table.entry(element.clone()).or_insert(i);
                }
            }
            table
        }

        let objects = by_element(descriptor.objects.iter().map(|o| &o.elements));
        let associations = by_element(descriptor.associations.iter().map(|a| &a.elements));
        let augmentations = by_element(descriptor.augmentations.iter().map(|a| &a.elements));

        let mut references = HashMap::new();
        for (i, rule) in descriptor.references.iter().enumerate() {
            references
                .entry((rule.owner.clone(), rule.field_qname.clone()))
                .or_insert(i);
        }

        let mut scalar_props = HashMap::new();
        for (position, rule) in descriptor.objects.iter().enumerate() {
            let mut table = HashMap::new();
            for (i, prop) in rule.scalar_props.iter().enumerate() {
                table.entry(prop.path.clone()).or_insert(i);
            }
            scalar_props.entry(rule.qname.clone()).or_insert((position, table));
        }

        Self {
            descriptor,
            objects,
            associations,
            augmentations,
            references,
            scalar_props,
        }
    }

    pub fn descriptor(&self) -> &MappingDescriptor {
        &self.descriptor
    }

    pub fn namespaces(&self) -> &NamespaceMap {
        &self.descriptor.namespaces
    }

    pub fn polymorphism(&self) -> PolymorphismPolicy {
        self.descriptor.polymorphism
    }

    pub fn object(&self, element: &str) -> Option<&ObjectRule> {
        self.objects.get(element).map(|&i| &self.descriptor.objects[i])
    }

    pub fn association(&self, element: &str) -> Option<&AssociationRule> {
        self.associations
            .get(element)
            .map(|&i| &self.descriptor.associations[i])
    }

    pub fn augmentation(&self, element: &str) -> Option<&AugmentationRule> {
        self.augmentations
            .get(element)
            .map(|&i| &self.descriptor.augmentations[i])
    }

    pub fn reference(&self, owner: &str, field: &str) -> Option<&ReferenceRule> {
        self.references
            .get(&(owner.to_string(), field.to_string()))
            .map(|&i| &self.descriptor.references[i])
    }

    /// Scalar property of an object rule addressed by a relative path.
    pub fn scalar_prop(&self, rule: &ObjectRule, path: &str) -> Option<&ScalarProp> {
        let (position, table) = self.scalar_props.get(&rule.qname)?;
        table.get(path).map(|&i| &self.descriptor.objects[*position].scalar_props[i])
    }
}

impl From<MappingDescriptor> for DescriptorIndex {
    fn from(descriptor: MappingDescriptor) -> Self {
        Self::new(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> MappingDescriptor {
        let mut namespaces = NamespaceMap::new();
        namespaces.insert("nc", "urn:nc");
        MappingDescriptor {
            namespaces,
            objects: vec![ObjectRule::new("nc:PersonType")
                .with_elements(["nc:Person".to_string()])
                .with_scalar_prop(ScalarProp {
                    path: "nc:PersonAge".into(),
                    key: "age".into(),
                    kind: ValueKind::Integer,
                })],
            associations: vec![AssociationRule::new("nc:PersonVehicleAssociationType")
                .with_elements(["nc:PersonVehicleAssociation".to_string()])],
            references: vec![ReferenceRule {
                owner: "nc:PersonType".into(),
                field_qname: "nc:PersonVehicle".into(),
                target_label: "nc_VehicleType".into(),
                rel_type: "NC_PERSONVEHICLE".into(),
                cardinality: Cardinality::default(),
            }],
            augmentations: Vec::new(),
            polymorphism: PolymorphismPolicy::default(),
        }
    }

    #[test]
    fn test_cardinality_defaults() {
        let c = Cardinality::from_bounds(None, Some("unbounded"));
        assert_eq!(c.min, "0");
        assert_eq!(c.max, "unbounded");
        assert_eq!(Cardinality::default().to_string(), "0..*");
        assert_eq!(Cardinality::from_bounds(Some(" "), None).min, "0");
    }

    #[test]
    fn test_value_kind_from_datatype() {
        assert_eq!(ValueKind::from_datatype("xs:int"), ValueKind::Integer);
        assert_eq!(ValueKind::from_datatype("niem-xs:boolean"), ValueKind::Boolean);
        assert_eq!(ValueKind::from_datatype("nc:DecimalType"), ValueKind::Decimal);
        assert_eq!(ValueKind::from_datatype("nc:PointType"), ValueKind::String);
        assert_eq!(ValueKind::from_datatype("xs:string"), ValueKind::String);
    }

    #[test]
    fn test_coerce_falls_back_to_string() {
        assert_eq!(ValueKind::Integer.coerce(" 42 "), Scalar::Integer(42));
        assert_eq!(ValueKind::Integer.coerce("forty"), Scalar::String("forty".into()));
        assert_eq!(ValueKind::Boolean.coerce("1"), Scalar::Boolean(true));
        assert_eq!(ValueKind::Decimal.coerce("2.5"), Scalar::Float(2.5));
    }

    #[test]
    fn test_index_lookups() {
        let index = DescriptorIndex::new(descriptor());
        let person = index.object("nc:Person").unwrap();
        assert_eq!(person.label, "nc_PersonType");
        assert!(index.object("nc:PersonType").is_some());
        assert!(index.association("nc:PersonVehicleAssociation").is_some());
        assert!(index.reference("nc:PersonType", "nc:PersonVehicle").is_some());
        assert!(index.reference("nc:VehicleType", "nc:PersonVehicle").is_none());
        assert_eq!(index.scalar_prop(person, "nc:PersonAge").unwrap().key, "age");
    }

    #[test]
    fn test_unresolved_targets() {
        let mut d = descriptor();
        assert_eq!(d.unresolved_targets().into_iter().collect::<Vec<_>>(), vec!["nc_VehicleType"]);
        d.references[0].target_label = FALLBACK_LABEL.to_string();
        assert!(d.unresolved_targets().is_empty());
    }

    #[test]
    fn test_json_and_yaml_agree() {
        let d = descriptor();
        let from_json = MappingDescriptor::from_json(&d.to_json().unwrap()).unwrap();
        let from_yaml = MappingDescriptor::from_yaml(&d.to_yaml().unwrap()).unwrap();
        assert_eq!(from_json, d);
        assert_eq!(from_yaml, d);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(DescriptorFormat::from_path(Path::new("m.yml")).unwrap(), DescriptorFormat::Yaml);
        assert!(matches!(
            DescriptorFormat::from_path(Path::new("m.txt")),
            Err(MappingError::UnsupportedFormat(_))
        ));
    }
}
