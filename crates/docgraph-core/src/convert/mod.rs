//! Document-to-graph conversion.
//!
//! A [`Converter`] holds an indexed mapping descriptor and the conversion
//! options. Converting one document is synchronous and side-effect free: it
//! returns a fresh [`PropertyGraph`] plus a [`ConversionReport`]. Batches
//! ([`batch`]) convert documents in parallel and merge the graphs afterwards.

pub mod batch;
mod context;
pub mod decision;
mod traverse;

pub use batch::{BatchConverter, BatchOutcome, CancellationToken, DocumentFailure};
pub use decision::{decide, Decision, ElementShape};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConversionConfig;
use crate::document::{Document, ParseError};
use crate::graph::{ConflictPolicy, MergeConflict, PropertyGraph};
use crate::mapping::{DescriptorIndex, MappingDescriptor};
use crate::namespace::NamespaceMap;

/// Errors that stop the conversion of one document.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The document could not be loaded.
    #[error("failed to parse {key}: {source}")]
    Parse {
        key: String,
        #[source]
        source: ParseError,
    },

    /// The conformance validator rejected the document.
    #[error("{key} failed conformance validation: {}", violations.join("; "))]
    Rejected { key: String, violations: Vec<String> },

    /// The conformance validator itself failed.
    #[error("validator error on {key}: {message}")]
    Validator { key: String, message: String },

    /// The batch was cancelled before this document started.
    #[error("conversion of {0} cancelled")]
    Cancelled(String),
}

impl ConvertError {
    /// Key of the document the error belongs to.
    pub fn key(&self) -> &str {
        match self {
            Self::Parse { key, .. } | Self::Rejected { key, .. } | Self::Validator { key, .. } => key,
            Self::Cancelled(key) => key,
        }
    }
}

/// Where promotion rules come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionMode {
    /// Rules from the mapping descriptor only.
    #[default]
    Descriptor,
    /// Descriptor rules plus structural ones: identifier-carrying elements
    /// are nodes, `…Association` elements with two references are edges.
    Dynamic,
}

impl std::str::FromStr for ConversionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "descriptor" => Ok(Self::Descriptor),
            "dynamic" => Ok(Self::Dynamic),
            other => Err(format!("unknown conversion mode: {}", other)),
        }
    }
}

impl std::fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Descriptor => write!(f, "descriptor"),
            Self::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// Options of a conversion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    pub mode: ConversionMode,
    pub batch_tag: Option<String>,
    /// Identifier attribute names, e.g. `structures:id` or `id`.
    pub id_attributes: Vec<String>,
    /// Reference attribute names, e.g. `structures:ref` or `ref`.
    pub ref_attributes: Vec<String>,
    pub conflict_policy: ConflictPolicy,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConversionConfig::default().options()
    }
}

impl ConvertOptions {
    pub fn dynamic() -> Self {
        Self {
            mode: ConversionMode::Dynamic,
            ..Self::default()
        }
    }

    pub fn with_batch_tag(mut self, tag: impl Into<String>) -> Self {
        self.batch_tag = Some(tag.into());
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }
}

/// Counters and findings of one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionReport {
    pub documents: usize,
    pub nodes: usize,
    pub containment_edges: usize,
    pub association_edges: usize,
    pub reference_edges: usize,
    /// Association elements with fewer than two resolvable endpoints.
    pub skipped_associations: usize,
    /// Reference edges whose target never appeared as a node.
    pub dangling_references: usize,
    /// Prefixes invented for namespaces the document and descriptor left unnamed.
    pub synthetic_namespaces: NamespaceMap,
    pub conflicts: Vec<MergeConflict>,
}

impl ConversionReport {
    /// Fold another report into this one.
    pub fn absorb(&mut self, other: ConversionReport) {
        self.documents += other.documents;
        self.nodes += other.nodes;
        self.containment_edges += other.containment_edges;
        self.association_edges += other.association_edges;
        self.reference_edges += other.reference_edges;
        self.skipped_associations += other.skipped_associations;
        self.dangling_references += other.dangling_references;
        for (prefix, uri) in other.synthetic_namespaces.iter() {
            self.synthetic_namespaces.insert_if_absent(prefix, uri);
        }
        self.conflicts.extend(other.conflicts);
    }
}

impl std::fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Documents:    {}", self.documents)?;
        writeln!(f, "Nodes:        {}", self.nodes)?;
        writeln!(f, "Edges:")?;
        writeln!(f, "  Contains:   {}", self.containment_edges)?;
        writeln!(f, "  Associates: {}", self.association_edges)?;
        writeln!(f, "  References: {}", self.reference_edges)?;
        if self.skipped_associations > 0 {
            writeln!(f, "Skipped associations: {}", self.skipped_associations)?;
        }
        if self.dangling_references > 0 {
            writeln!(f, "Dangling references:  {}", self.dangling_references)?;
        }
        if !self.conflicts.is_empty() {
            writeln!(f, "Merge conflicts:      {}", self.conflicts.len())?;
        }
        Ok(())
    }
}

/// Graph and report of one conversion.
#[derive(Debug, Clone, Default)]
pub struct ConversionOutcome {
    pub graph: PropertyGraph,
    pub report: ConversionReport,
}

/// Converts documents into property graphs.
#[derive(Debug, Clone)]
pub struct Converter {
    index: DescriptorIndex,
    options: ConvertOptions,
}

impl Converter {
    pub fn new(descriptor: MappingDescriptor, options: ConvertOptions) -> Self {
        let unresolved = descriptor.unresolved_targets();
        if !unresolved.is_empty() {
            tracing::warn!(?unresolved, "descriptor targets labels with no object rule");
        }
        Self {
            index: DescriptorIndex::new(descriptor),
            options,
        }
    }

    /// Converter with no descriptor rules, in dynamic mode.
    pub fn dynamic() -> Self {
        Self::new(MappingDescriptor::dynamic(), ConvertOptions::dynamic())
    }

    pub fn index(&self) -> &DescriptorIndex {
        &self.index
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Convert a loaded document.
    pub fn convert(&self, document: &Document) -> ConversionOutcome {
        traverse::Walker::new(self, document).run()
    }

    /// Parse and convert raw bytes.
    pub fn convert_bytes(&self, key: &str, bytes: &[u8]) -> Result<ConversionOutcome, ConvertError> {
        let document = Document::parse(key, bytes).map_err(|source| ConvertError::Parse {
            key: key.to_string(),
            source,
        })?;
        Ok(self.convert(&document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!("Dynamic".parse::<ConversionMode>().unwrap(), ConversionMode::Dynamic);
        assert!("fuzzy".parse::<ConversionMode>().is_err());
        assert_eq!(ConversionMode::Descriptor.to_string(), "descriptor");
    }

    #[test]
    fn test_parse_error_carries_key() {
        let err = Converter::dynamic().convert_bytes("broken.xml", b"<a><b></a>").unwrap_err();
        assert_eq!(err.key(), "broken.xml");
        assert!(err.to_string().contains("broken.xml"));
    }

    #[test]
    fn test_report_absorb() {
        let mut total = ConversionReport::default();
        let mut one = ConversionReport {
            documents: 1,
            nodes: 3,
            ..Default::default()
        };
        one.synthetic_namespaces.insert("ns0", "urn:x");
        total.absorb(one.clone());
        total.absorb(one);
        assert_eq!(total.documents, 2);
        assert_eq!(total.nodes, 6);
        assert_eq!(total.synthetic_namespaces.len(), 1);
    }
}
