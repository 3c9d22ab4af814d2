//! Parallel conversion of many documents.
//!
//! Each document is parsed, validated and converted on the rayon pool with
//! its own walker. Graphs are merged afterwards in input order, so the merged
//! graph does not depend on scheduling.

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{ConversionOutcome, ConversionReport, ConvertError, Converter};
use crate::document::Document;
use crate::graph::{EdgeKind, PropertyGraph};
use crate::validate::{AcceptAll, ConformanceValidator};

/// Shared flag checked before each document starts.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One input document: storage key plus raw bytes.
#[derive(Debug, Clone)]
pub struct BatchInput {
    pub key: String,
    pub bytes: Vec<u8>,
}

impl BatchInput {
    pub fn new(key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            bytes: bytes.into(),
        }
    }
}

/// A document that produced no graph.
#[derive(Debug)]
pub struct DocumentFailure {
    pub key: String,
    pub error: ConvertError,
}

/// Merged result of a batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Union of the graphs of every converted document.
    pub graph: PropertyGraph,
    /// Totals over the converted documents, recomputed on the merged graph.
    pub report: ConversionReport,
    pub failures: Vec<DocumentFailure>,
}

impl BatchOutcome {
    pub fn converted(&self) -> usize {
        self.report.documents
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

type Progress<'a> = dyn Fn(&str) + Sync + 'a;

/// Runs a [`Converter`] over a batch of documents.
pub struct BatchConverter<'a> {
    converter: &'a Converter,
    validator: &'a dyn ConformanceValidator,
    cancel: CancellationToken,
    progress: Option<&'a Progress<'a>>,
}

impl<'a> BatchConverter<'a> {
    pub fn new(converter: &'a Converter) -> Self {
        Self {
            converter,
            validator: &AcceptAll,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    pub fn with_validator(mut self, validator: &'a dyn ConformanceValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Called with each document key once it is finished, in completion order.
    pub fn on_progress(mut self, progress: &'a Progress<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn run(&self, inputs: &[BatchInput]) -> BatchOutcome {
        tracing::info!(documents = inputs.len(), "converting batch");

        let results: Vec<Result<ConversionOutcome, ConvertError>> = inputs
            .par_iter()
            .map(|input| {
                let result = self.convert_one(input);
                if let Some(progress) = self.progress {
                    progress(&input.key);
                }
                result
            })
            .collect();

        let policy = self.converter.options().conflict_policy;
        let mut outcome = BatchOutcome::default();

        for (input, result) in inputs.iter().zip(results) {
            match result {
                Ok(converted) => {
                    let conflicts = outcome.graph.absorb(converted.graph, policy);
                    outcome.report.absorb(converted.report);
                    outcome.report.conflicts.extend(conflicts);
                }
                Err(error) => {
                    tracing::warn!(key = %input.key, %error, "document not converted");
                    outcome.failures.push(DocumentFailure {
                        key: input.key.clone(),
                        error,
                    });
                }
            }
        }

        // cross-document references resolve only on the merged graph
        outcome.graph.resolve_fallback_labels();
        let stats = outcome.graph.stats();
        outcome.report.nodes = stats.nodes;
        outcome.report.dangling_references = outcome
            .graph
            .dangling_edges()
            .filter(|e| e.kind == EdgeKind::Reference)
            .count();

        tracing::info!(
            converted = outcome.report.documents,
            failed = outcome.failures.len(),
            nodes = stats.nodes,
            "batch finished"
        );
        outcome
    }

    fn convert_one(&self, input: &BatchInput) -> Result<ConversionOutcome, ConvertError> {
        if self.cancel.is_cancelled() {
            return Err(ConvertError::Cancelled(input.key.clone()));
        }

        let document = Document::parse(input.key.as_str(), &input.bytes).map_err(|source| ConvertError::Parse {
            key: input.key.clone(),
            source,
        })?;

        let report = self
            .validator
            .validate(&document)
            .map_err(|e| ConvertError::Validator {
                key: input.key.clone(),
                message: e.to_string(),
            })?;
        if !report.passed {
            return Err(ConvertError::Rejected {
                key: input.key.clone(),
                violations: report.violations,
            });
        }

        Ok(self.converter.convert(&document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{ValidationError, ValidationReport};
    use std::sync::atomic::AtomicUsize;

    struct RejectNamed(&'static str);

    impl ConformanceValidator for RejectNamed {
        fn validate(&self, document: &Document) -> Result<ValidationReport, ValidationError> {
            if document.root.name.local == self.0 {
                Ok(ValidationReport::failed(vec![format!("{} is not allowed", self.0)]))
            } else {
                Ok(ValidationReport::passed())
            }
        }
    }

    fn inputs() -> Vec<BatchInput> {
        vec![
            BatchInput::new("a.xml", r#"<Doc><Person id="P1"><Name>Ann</Name></Person></Doc>"#),
            BatchInput::new("b.xml", "<Doc><Person"),
            BatchInput::new("c.xml", r#"<Doc><Owner ref="P1"/><Person id="P2"/></Doc>"#),
        ]
    }

    #[test]
    fn test_failures_do_not_block_other_documents() {
        let converter = Converter::dynamic();
        let outcome = BatchConverter::new(&converter).run(&inputs());

        assert_eq!(outcome.converted(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].key, "b.xml");
        assert!(matches!(outcome.failures[0].error, ConvertError::Parse { .. }));
        assert!(outcome.graph.contains("P1"));
        assert!(outcome.graph.contains("P2"));
    }

    #[test]
    fn test_cross_document_reference_resolves_after_merge() {
        let converter = Converter::dynamic();
        let outcome = BatchConverter::new(&converter).run(&inputs());

        let reference = outcome
            .graph
            .edges()
            .iter()
            .find(|e| e.kind == EdgeKind::Reference)
            .unwrap();
        assert_eq!(reference.target.identity, "P1");
        assert_eq!(reference.target.label, "Person");
        assert_eq!(outcome.report.dangling_references, 0);
    }

    #[test]
    fn test_validator_rejects() {
        let converter = Converter::dynamic();
        let validator = RejectNamed("Doc");
        let outcome = BatchConverter::new(&converter)
            .with_validator(&validator)
            .run(&inputs()[..1]);
        assert_eq!(outcome.converted(), 0);
        assert!(matches!(outcome.failures[0].error, ConvertError::Rejected { .. }));
        assert!(outcome.graph.nodes().is_empty());
    }

    #[test]
    fn test_cancelled_batch() {
        let converter = Converter::dynamic();
        let token = CancellationToken::new();
        token.cancel();
        let outcome = BatchConverter::new(&converter).with_cancellation(token).run(&inputs());
        assert_eq!(outcome.failures.len(), 3);
        assert!(outcome
            .failures
            .iter()
            .all(|f| matches!(f.error, ConvertError::Cancelled(_))));
    }

    #[test]
    fn test_progress_called_per_document() {
        let converter = Converter::dynamic();
        let seen = AtomicUsize::new(0);
        let progress = |_: &str| {
            seen.fetch_add(1, Ordering::SeqCst);
        };
        BatchConverter::new(&converter).on_progress(&progress).run(&inputs());
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_merge_order_is_input_order() {
        let converter = Converter::dynamic();
        let docs: Vec<BatchInput> = (0..16)
            .map(|i| BatchInput::new(format!("{i}.xml"), format!(r#"<Doc><Item id="I{i}"/></Doc>"#)))
            .collect();
        let outcome = BatchConverter::new(&converter).run(&docs);
        let items: Vec<&str> = outcome
            .graph
            .nodes()
            .iter()
            .filter(|n| n.label == "Item")
            .map(|n| n.identity.as_str())
            .collect();
        let expected: Vec<String> = (0..16).map(|i| format!("I{i}")).collect();
        assert_eq!(items, expected);
    }
}
