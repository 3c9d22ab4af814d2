//! Positional bookkeeping for identity synthesis and property keys.

use std::collections::HashMap;

use crate::config::FLATTEN_DELIMITER;

/// Sibling ordinals per qualified name within one parent element.
#[derive(Debug, Default)]
pub(crate) struct OrdinalScope {
    counts: HashMap<String, usize>,
}

impl OrdinalScope {
    /// Ordinal of the next sibling named `qname`, starting at zero.
    pub(crate) fn next(&mut self, qname: &str) -> usize {
        let slot = self.counts.entry(qname.to_string()).or_insert(0);
        let ordinal = *slot;
        *slot += 1;
        ordinal
    }
}

/// Path from the owning node down to the current element.
///
/// The full path (with ordinals) feeds identity synthesis. The key path
/// starts at `key_start` so association edges can collect their own leaves
/// without resetting the positions used for identities.
#[derive(Debug, Default)]
pub(crate) struct ConversionContext {
    segments: Vec<(String, usize)>,
    key_start: usize,
}

impl ConversionContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, qname: &str, ordinal: usize) {
        self.segments.push((qname.to_string(), ordinal));
    }

    pub(crate) fn pop(&mut self) {
        self.segments.pop();
        self.key_start = self.key_start.min(self.segments.len());
    }

    /// Number of segments below the owner.
    pub(crate) fn depth(&self) -> usize {
        self.segments.len()
    }

    /// `a[0]/b[2]` form used as hashing input.
    pub(crate) fn ordinal_path(&self) -> String {
        self.segments
            .iter()
            .map(|(q, i)| format!("{}[{}]", q, i))
            .collect::<Vec<_>>()
            .join("/")
    }

    fn key_segments(&self) -> impl Iterator<Item = &str> {
        self.segments[self.key_start..].iter().map(|(q, _)| q.as_str())
    }

    /// Flattened property key of the current element, or of one of its attributes.
    pub(crate) fn property_key(&self, attribute: Option<&str>) -> String {
        let mut parts: Vec<String> = self.key_segments().map(str::to_string).collect();
        if let Some(attr) = attribute {
            parts.push(format!("{}{}", crate::config::ATTRIBUTE_KEY_PREFIX, attr));
        }
        parts.join(FLATTEN_DELIMITER)
    }

    /// Relative `/`-joined path, as used by scalar property rules.
    pub(crate) fn relative_path(&self, attribute: Option<&str>) -> String {
        let mut parts: Vec<String> = self.key_segments().map(str::to_string).collect();
        if let Some(attr) = attribute {
            parts.push(format!("{}{}", crate::config::ATTRIBUTE_KEY_PREFIX, attr));
        }
        parts.join("/")
    }

    /// Start key paths at the current depth; returns the previous start.
    pub(crate) fn rebase(&mut self) -> usize {
        std::mem::replace(&mut self.key_start, self.segments.len())
    }

    pub(crate) fn restore(&mut self, key_start: usize) {
        self.key_start = key_start;
    }
}
