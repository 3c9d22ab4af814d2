//! Namespace prefix resolution for class models and documents.
//!
//! Qualified names are carried as plain `prefix:local` strings everywhere in
//! the crate. This module owns the two directions of lookup:
//!
//! - [`NamespaceMap`] - a prefix → URI table with unique prefixes, used by the
//!   class model and the mapping descriptor.
//! - [`QNameResolver`] - turns the expanded names found in a document into
//!   qualified names using the *document's own* prefixes, falling back to the
//!   descriptor's prefix for a URI and finally to a synthetic `nsN` prefix.

pub mod naming;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::document::XName;

/// Prefix of synthetic namespace bindings (`ns0`, `ns1`, ...).
pub const SYNTHETIC_PREFIX: &str = "ns";

/// Split a qualified name into its optional prefix and local part.
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

/// Local part of a qualified name.
pub fn local_name(qname: &str) -> &str {
    split_qname(qname).1
}

/// Prefix of a qualified name, if any.
pub fn prefix_of(qname: &str) -> Option<&str> {
    split_qname(qname).0
}

/// Join a prefix and a local name into a qualified name.
pub fn join_qname(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{}:{}", p, local),
        _ => local.to_string(),
    }
}

/// Prefix → URI table. Prefixes are unique; iteration order is sorted by prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceMap {
    prefixes: BTreeMap<String, String>,
}

impl NamespaceMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a prefix, returning the URI it was previously bound to.
    pub fn insert(&mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Option<String> {
        self.prefixes.insert(prefix.into(), uri.into())
    }

    /// Bind a prefix only if it is not bound yet. Returns true if inserted.
    pub fn insert_if_absent(&mut self, prefix: &str, uri: &str) -> bool {
        if self.prefixes.contains_key(prefix) {
            return false;
        }
        self.prefixes.insert(prefix.to_string(), uri.to_string());
        true
    }

    /// URI bound to a prefix.
    pub fn uri(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    /// First prefix (in sorted order) bound to a URI.
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|(_, u)| u.as_str() == uri)
            .map(|(p, _)| p.as_str())
    }

    /// Expand a qualified name into `(uri, local)`.
    ///
    /// Returns `None` for unprefixed names and for unbound prefixes.
    pub fn expand<'a>(&'a self, qname: &'a str) -> Option<(&'a str, &'a str)> {
        let (prefix, local) = split_qname(qname);
        let uri = self.uri(prefix?)?;
        Some((uri, local))
    }

    /// Check whether a qualified name's prefix is bound (unprefixed names always are).
    pub fn is_resolvable(&self, qname: &str) -> bool {
        match prefix_of(qname) {
            Some(prefix) => self.prefixes.contains_key(prefix),
            None => true,
        }
    }

    /// Drop every binding whose prefix is not in `used`.
    pub fn retain_prefixes(&mut self, used: &BTreeSet<String>) {
        self.prefixes.retain(|prefix, _| used.contains(prefix));
    }

    /// Iterate `(prefix, uri)` pairs in prefix order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

impl FromIterator<(String, String)> for NamespaceMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = NamespaceMap::new();
        for (prefix, uri) in iter {
            map.insert_if_absent(&prefix, &uri);
        }
        map
    }
}

/// Resolves expanded document names into qualified names.
///
/// One resolver lives for one document conversion; synthetic prefixes are
/// numbered in first-seen order so the same document always resolves the
/// same way.
#[derive(Debug)]
pub struct QNameResolver<'a> {
    document: &'a NamespaceMap,
    descriptor: &'a NamespaceMap,
    synthetic: BTreeMap<String, String>,
}

impl<'a> QNameResolver<'a> {
    pub fn new(document: &'a NamespaceMap, descriptor: &'a NamespaceMap) -> Self {
        Self {
            document,
            descriptor,
            synthetic: BTreeMap::new(),
        }
    }

    /// Qualified name for an element or attribute name.
    pub fn qualify(&mut self, name: &XName) -> String {
        if let Some(prefix) = name.prefix.as_deref() {
            return join_qname(Some(prefix), &name.local);
        }

        let Some(uri) = name.namespace.as_deref() else {
            return name.local.clone();
        };

        if let Some(prefix) = self.document.prefix_for(uri) {
            return join_qname(Some(prefix), &name.local);
        }
        if let Some(prefix) = self.descriptor.prefix_for(uri) {
            return join_qname(Some(prefix), &name.local);
        }

        let prefix = self.synthetic_prefix(uri);
        join_qname(Some(&prefix), &name.local)
    }

    /// Synthetic bindings handed out so far, as `(prefix, uri)` pairs.
    pub fn synthetic_bindings(&self) -> NamespaceMap {
        self.synthetic
            .iter()
            .map(|(uri, prefix)| (prefix.clone(), uri.clone()))
            .collect()
    }

    fn synthetic_prefix(&mut self, uri: &str) -> String {
        if let Some(prefix) = self.synthetic.get(uri) {
            return prefix.clone();
        }
        let mut n = self.synthetic.len();
        let prefix = loop {
            let candidate = format!("{}{}", SYNTHETIC_PREFIX, n);
            if self.document.uri(&candidate).is_none() && self.descriptor.uri(&candidate).is_none() {
                break candidate;
            }
            n += 1;
        };
        tracing::debug!(uri, prefix = %prefix, "assigned synthetic namespace prefix");
        self.synthetic.insert(uri.to_string(), prefix.clone());
        prefix
    }
}
