//! End-to-end runs: class model to descriptor, documents to graph, graph to
//! statements.

use chrono::{DateTime, Utc};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::convert::batch::BatchInput;
use crate::convert::{BatchConverter, BatchOutcome, CancellationToken, ConversionMode, ConversionReport, Converter};
use crate::emit::{emit, EmitOptions, Statement};
use crate::graph::{GraphStats, PropertyGraph};
use crate::mapping::{MappingDescriptor, MappingError};
use crate::schema::{generate, ClassModel, Generation, SchemaError};
use crate::storage::{ArtifactStore, StorageError};
use crate::store::{ApplySummary, GraphStore, StoreError};
use crate::validate::{AcceptAll, ConformanceValidator};

/// Errors that can occur in pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Descriptor mode needs a mapping descriptor (or use dynamic mode)")]
    MissingDescriptor,

    #[error("No documents found under {}", .0.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    NoDocuments(Vec<PathBuf>),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Summary of one conversion run, stored next to its outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub mode: ConversionMode,
    pub batch_tag: Option<String>,
    pub documents: usize,
    pub failed: Vec<String>,
    pub stats: GraphStats,
    pub report: ConversionReport,
}

/// High-level API over the configured components.
pub struct Pipeline {
    config: Config,
    validator: Box<dyn ConformanceValidator>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Creates a pipeline that accepts every document.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            validator: Box::new(AcceptAll),
            cancel: CancellationToken::new(),
        }
    }

    /// Consults `validator` before converting each document.
    pub fn with_validator(mut self, validator: impl ConformanceValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token that stops documents not yet started.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Loads a class model and generates its mapping descriptor.
    pub fn generate_descriptor(&self, model_path: &Path) -> Result<Generation, PipelineError> {
        let model = ClassModel::load(model_path)?;
        tracing::info!(
            classes = model.classes.len(),
            properties = model.properties.len(),
            "loaded class model"
        );

        let generation = generate(&model, &self.config.schema.generator_options());
        for warning in &generation.warnings {
            tracing::warn!("{}", warning);
        }
        Ok(generation)
    }

    /// Builds a converter from the configured mode and an optional descriptor.
    pub fn converter(&self, descriptor: Option<MappingDescriptor>) -> Result<Converter, PipelineError> {
        let options = self.config.conversion.options();
        let descriptor = match (descriptor, options.mode) {
            (Some(descriptor), _) => descriptor,
            (None, ConversionMode::Dynamic) => MappingDescriptor::dynamic(),
            (None, ConversionMode::Descriptor) => return Err(PipelineError::MissingDescriptor),
        };
        Ok(Converter::new(descriptor, options))
    }

    /// Expands files and directories into document paths, in walk order.
    pub fn collect_documents(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>, PipelineError> {
        let conversion = &self.config.conversion;
        let mut documents = Vec::new();

        for root in paths {
            if root.is_file() {
                documents.push(root.clone());
                continue;
            }
            if !root.exists() {
                return Err(PipelineError::io(
                    root,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
                ));
            }

            let walker = WalkBuilder::new(root)
                .hidden(true)
                .git_ignore(true)
                .sort_by_file_path(|a, b| a.cmp(b))
                .build();

            for entry in walker.flatten() {
                let path = entry.path();

                // Skip directories
                if path.is_dir() {
                    continue;
                }

                let extension = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_ascii_lowercase();
                if !conversion.document_extensions.iter().any(|e| *e == extension) {
                    continue;
                }

                let relative = path.strip_prefix(root).unwrap_or(path);
                let excluded = relative.components().any(|c| {
                    conversion
                        .exclude_dirs
                        .iter()
                        .any(|d| c.as_os_str() == d.as_str())
                });
                if excluded {
                    continue;
                }

                documents.push(path.to_path_buf());
            }
        }

        if documents.is_empty() {
            return Err(PipelineError::NoDocuments(paths.to_vec()));
        }
        tracing::debug!(documents = documents.len(), "collected documents");
        Ok(documents)
    }

    /// Reads documents into batch inputs keyed by path.
    pub fn read_inputs(&self, paths: &[PathBuf]) -> Result<Vec<BatchInput>, PipelineError> {
        paths
            .iter()
            .map(|path| {
                let bytes = std::fs::read(path).map_err(|e| PipelineError::io(path, e))?;
                Ok(BatchInput::new(path.to_string_lossy(), bytes))
            })
            .collect()
    }

    /// Converts a batch, reporting each finished document to `progress`.
    pub fn convert(
        &self,
        converter: &Converter,
        inputs: &[BatchInput],
        progress: Option<&(dyn Fn(&str) + Sync)>,
    ) -> BatchOutcome {
        let batch = BatchConverter::new(converter)
            .with_validator(self.validator.as_ref())
            .with_cancellation(self.cancel.clone());
        match progress {
            Some(progress) => batch.on_progress(progress).run(inputs),
            None => batch.run(inputs),
        }
    }

    /// Collects, reads and converts in one step.
    pub fn convert_paths(&self, converter: &Converter, paths: &[PathBuf]) -> Result<BatchOutcome, PipelineError> {
        let documents = self.collect_documents(paths)?;
        let inputs = self.read_inputs(&documents)?;
        Ok(self.convert(converter, &inputs, None))
    }

    /// Statements for a graph in the configured dialect.
    pub fn emit(&self, graph: &PropertyGraph) -> Vec<Statement> {
        let options = EmitOptions::new(self.config.emit.dialect).with_id_property(&self.config.emit.id_property);
        emit(graph, &options)
    }

    /// Runs statements against a graph store of the configured dialect.
    pub async fn apply(
        &self,
        store: &dyn GraphStore,
        statements: &[Statement],
    ) -> Result<ApplySummary, PipelineError> {
        store.expect_dialect(self.config.emit.dialect)?;
        let summary = store.apply(statements).await?;
        tracing::info!(statements = summary.statements, "applied statements");
        Ok(summary)
    }

    /// Writes the graph, statements and run record under `graphs/{run id}`.
    pub fn save_run(
        &self,
        artifacts: &impl ArtifactStore,
        started_at: DateTime<Utc>,
        outcome: &BatchOutcome,
        statements: &[Statement],
    ) -> Result<RunRecord, PipelineError> {
        let record = RunRecord {
            id: uuid::Uuid::new_v4().to_string(),
            started_at,
            finished_at: Utc::now(),
            mode: self.config.conversion.mode,
            batch_tag: self.config.conversion.batch_tag.clone(),
            documents: outcome.converted(),
            failed: outcome.failures.iter().map(|f| f.key.clone()).collect(),
            stats: outcome.graph.stats(),
            report: outcome.report.clone(),
        };

        let graphs = &self.config.storage.graphs_dir;
        let extension = match self.config.emit.dialect {
            crate::emit::Dialect::Cypher => "cypher",
            crate::emit::Dialect::SurrealQl => "surql",
        };
        artifacts.write_json(&format!("{}/{}/graph.json", graphs, record.id), &outcome.graph)?;
        artifacts.write(
            &format!("{}/{}/statements.{}", graphs, record.id, extension),
            crate::emit::render_script(statements).as_bytes(),
        )?;
        artifacts.write_json(&format!("{}/{}/run.json", graphs, record.id), &record)?;

        tracing::info!(run = %record.id, "saved run");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileArtifactStore;
    use std::fs;
    use tempfile::TempDir;

    fn dynamic_config() -> Config {
        let mut config = Config::default();
        config.conversion.mode = ConversionMode::Dynamic;
        config
    }

    #[test]
    fn test_descriptor_mode_needs_descriptor() {
        let pipeline = Pipeline::new(Config::default());
        assert!(matches!(pipeline.converter(None), Err(PipelineError::MissingDescriptor)));
        assert!(Pipeline::new(dynamic_config()).converter(None).is_ok());
    }

    #[test]
    fn test_collect_documents_filters() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::create_dir_all(root.join("target")).unwrap();
        fs::write(root.join("b.xml"), "<a/>").unwrap();
        fs::write(root.join("sub/a.json"), "{}").unwrap();
        fs::write(root.join("notes.txt"), "x").unwrap();
        fs::write(root.join("target/c.xml"), "<a/>").unwrap();

        let pipeline = Pipeline::new(dynamic_config());
        let found = pipeline.collect_documents(&[root.to_path_buf()]).unwrap();

        let names: Vec<String> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["b.xml", "sub/a.json"]);
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let temp = TempDir::new().unwrap();
        let pipeline = Pipeline::new(dynamic_config());
        let err = pipeline.collect_documents(&[temp.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, PipelineError::NoDocuments(_)));
    }

    #[test]
    fn test_convert_and_save_run() {
        let temp = TempDir::new().unwrap();
        let doc = temp.path().join("person.xml");
        fs::write(&doc, r#"<Person id="P1"><Name>Ann</Name></Person>"#).unwrap();

        let pipeline = Pipeline::new(dynamic_config());
        let converter = pipeline.converter(None).unwrap();
        let outcome = pipeline.convert_paths(&converter, &[doc]).unwrap();
        assert!(outcome.is_complete());
        assert!(outcome.graph.contains("P1"));

        let statements = pipeline.emit(&outcome.graph);
        assert_eq!(statements.len(), 1);

        let artifacts = FileArtifactStore::new(temp.path().join(".docgraph"));
        let record = pipeline.save_run(&artifacts, Utc::now(), &outcome, &statements).unwrap();
        assert_eq!(record.documents, 1);

        let keys = artifacts.list("graphs/").unwrap();
        assert_eq!(keys.len(), 3);
        let saved: PropertyGraph = artifacts
            .read_json(&format!("graphs/{}/graph.json", record.id))
            .unwrap();
        assert_eq!(saved.nodes().len(), 1);
    }
}
