//! Class-model error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::document::ParseError;

/// Errors raised while loading a class model.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// IO error.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CMF file is not well-formed XML.
    #[error("Malformed model XML: {0}")]
    Xml(#[from] ParseError),

    /// JSON class model could not be decoded.
    #[error("Malformed model JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML class model could not be decoded.
    #[error("Malformed model YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Well-formed input with a structural problem.
    #[error("Malformed model at {location}: {message}")]
    Malformed { location: String, message: String },

    /// File extension not recognized.
    #[error("Unsupported model format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
}

impl SchemaError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SchemaError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(location: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaError::Malformed {
            location: location.into(),
            message: message.into(),
        }
    }
}
