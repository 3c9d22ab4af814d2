pub mod config;
pub mod convert;
pub mod document;
pub mod emit;
pub mod graph;
pub mod mapping;
pub mod namespace;
pub mod pipeline;
pub mod schema;
pub mod storage;
pub mod store;
pub mod validate;

pub use config::{Config, ConfigError, StorageConfig};
pub use convert::batch::BatchInput;
pub use convert::{
    BatchConverter, BatchOutcome, CancellationToken, ConversionMode, ConversionOutcome, ConversionReport,
    ConvertError, ConvertOptions, Converter, DocumentFailure,
};
pub use document::{Document, DocumentFormat, Element, ParseError};
pub use emit::{emit, render_script, Dialect, EmitOptions, Statement};
pub use graph::{
    ConflictPolicy, EdgeEnd, EdgeKind, GraphEdge, GraphNode, GraphStats, MergeConflict, PropertyGraph, PropertyValue,
    Scalar,
};
pub use mapping::{DescriptorFormat, DescriptorIndex, MappingDescriptor, MappingError};
pub use namespace::NamespaceMap;
pub use pipeline::{Pipeline, PipelineError, RunRecord};
pub use schema::{generate, ClassModel, Generation, GeneratorOptions, SchemaError};
pub use storage::{ArtifactStore, FileArtifactStore, StorageError};
pub use store::{ApplySummary, GraphStore, RecordingStore, StoreError};
pub use validate::{AcceptAll, ConformanceValidator, DeclaredPrefixes, ValidationReport};

#[cfg(feature = "surreal")]
pub use store::SurrealStore;
