//! Conformance validation hook.
//!
//! Batch conversion asks a [`ConformanceValidator`] about every parsed
//! document before converting it. Semantic validation against a schema is
//! left to external validators behind this trait; the crate ships a validator
//! that accepts everything and one that checks namespace hygiene.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{Document, Element};

/// The validator could not reach a verdict.
#[derive(Debug, Error)]
#[error("validation failed to run: {0}")]
pub struct ValidationError(pub String);

/// Verdict on one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    #[serde(default)]
    pub violations: Vec<String>,
}

impl ValidationReport {
    pub fn passed() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    pub fn failed(violations: Vec<String>) -> Self {
        Self {
            passed: false,
            violations,
        }
    }

    /// Passed exactly when there are no violations.
    pub fn from_violations(violations: Vec<String>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }
}

/// Decides whether a document may be converted.
pub trait ConformanceValidator: Send + Sync {
    fn validate(&self, document: &Document) -> Result<ValidationReport, ValidationError>;
}

/// Accepts every document.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ConformanceValidator for AcceptAll {
    fn validate(&self, _document: &Document) -> Result<ValidationReport, ValidationError> {
        Ok(ValidationReport::passed())
    }
}

/// Rejects documents that use a prefix they never declare.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredPrefixes;

impl ConformanceValidator for DeclaredPrefixes {
    fn validate(&self, document: &Document) -> Result<ValidationReport, ValidationError> {
        let mut violations = Vec::new();
        collect_unbound(&document.root, "", &mut violations);
        Ok(ValidationReport::from_violations(violations))
    }
}

fn collect_unbound(element: &Element, parent_path: &str, violations: &mut Vec<String>) {
    let path = format!("{}/{}", parent_path, element.name.local);

    let unbound = |prefix: &Option<String>, namespace: &Option<String>| {
        prefix.as_deref().filter(|_| namespace.is_none()).map(str::to_string)
    };

    if let Some(prefix) = unbound(&element.name.prefix, &element.name.namespace) {
        violations.push(format!("{}: element prefix '{}' is not declared", path, prefix));
    }
    for attr in &element.attributes {
        if let Some(prefix) = unbound(&attr.name.prefix, &attr.name.namespace) {
            violations.push(format!(
                "{}/@{}: attribute prefix '{}' is not declared",
                path, attr.name.local, prefix
            ));
        }
    }
    for child in &element.children {
        collect_unbound(child, &path, violations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_all() {
        let doc = Document::parse("a.xml", b"<a/>").unwrap();
        assert!(AcceptAll.validate(&doc).unwrap().passed);
    }

    #[test]
    fn test_declared_prefixes() {
        let ok = Document::parse("ok.xml", br#"<nc:a xmlns:nc="urn:nc"><nc:b/></nc:a>"#).unwrap();
        assert!(DeclaredPrefixes.validate(&ok).unwrap().passed);

        let bad = Document::parse("bad.xml", br#"<a><j:b x:c="1"/></a>"#).unwrap();
        let report = DeclaredPrefixes.validate(&bad).unwrap();
        assert!(!report.passed);
        assert_eq!(report.violations.len(), 2);
        assert!(report.violations[0].starts_with("/a/b"));
    }
}
