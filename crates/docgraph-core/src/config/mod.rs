//! Configuration management for docgraph.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `docgraph.toml` file
//! 3. User config `~/.config/docgraph/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod defaults;

pub use defaults::*;

use crate::convert::{ConversionMode, ConvertOptions};
use crate::emit::Dialect;
use crate::graph::ConflictPolicy;
use crate::mapping::PolymorphismPolicy;
use crate::schema::GeneratorOptions;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Document conversion configuration.
    pub conversion: ConversionConfig,

    /// Descriptor generation configuration.
    pub schema: SchemaConfig,

    /// Statement emission configuration.
    pub emit: EmitConfig,

    /// Storage configuration.
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./docgraph.toml` (project local)
    /// 2. `~/.config/docgraph/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new("docgraph.toml").exists() {
            return Self::from_file("docgraph.toml");
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("docgraph").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any `DOCGRAPH_*` lookup.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        // Conversion overrides
        if let Some(mode) = var("DOCGRAPH_MODE") {
            self.conversion.mode = mode.parse().map_err(ConfigError::Invalid)?;
        }
        if let Some(tag) = var("DOCGRAPH_BATCH_TAG") {
            self.conversion.batch_tag = Some(tag).filter(|t| !t.is_empty());
        }
        if let Some(policy) = var("DOCGRAPH_CONFLICT_POLICY") {
            self.conversion.conflict_policy = match policy.as_str() {
                "keep_first" => ConflictPolicy::KeepFirst,
                "last_write_wins" => ConflictPolicy::LastWriteWins,
                other => return Err(ConfigError::Invalid(format!("unknown conflict policy: {}", other))),
            };
        }

        // Emit overrides
        if let Some(dialect) = var("DOCGRAPH_DIALECT") {
            self.emit.dialect = dialect.parse().map_err(ConfigError::Invalid)?;
        }
        if let Some(property) = var("DOCGRAPH_ID_PROPERTY") {
            self.emit.id_property = property;
        }

        // Storage overrides
        if let Some(dir) = var("DOCGRAPH_DATA_DIR") {
            self.storage.data_dir = dir;
        }

        Ok(())
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Document conversion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// "descriptor" (rules from a mapping file) or "dynamic" (structure only).
    pub mode: ConversionMode,

    /// Prefix mixed into synthetic identities of every document in a batch.
    pub batch_tag: Option<String>,

    /// Attribute names carrying an element's identifier.
    pub id_attributes: Vec<String>,

    /// Attribute names carrying a reference.
    pub ref_attributes: Vec<String>,

    /// How conflicting values on a merged node are resolved.
    pub conflict_policy: ConflictPolicy,

    /// File extensions picked up from input directories.
    pub document_extensions: Vec<String>,

    /// Directories skipped when walking input directories.
    pub exclude_dirs: Vec<String>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            mode: ConversionMode::default(),
            batch_tag: None,
            id_attributes: DEFAULT_ID_ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
            ref_attributes: DEFAULT_REF_ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
            conflict_policy: ConflictPolicy::default(),
            document_extensions: DEFAULT_DOCUMENT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ConversionConfig {
    /// Engine options for this configuration.
    pub fn options(&self) -> ConvertOptions {
        ConvertOptions {
            mode: self.mode,
            batch_tag: self.batch_tag.clone(),
            id_attributes: self.id_attributes.clone(),
            ref_attributes: self.ref_attributes.clone(),
            conflict_policy: self.conflict_policy,
        }
    }
}

/// Descriptor generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Classes whose descendants are associations.
    pub association_bases: Vec<String>,

    /// Local-name suffix of augmentation classes.
    pub augmentation_suffix: String,

    /// How `xsi:type` is recorded on nodes.
    pub polymorphism: PolymorphismPolicy,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            association_bases: DEFAULT_ASSOCIATION_BASES.iter().map(|s| s.to_string()).collect(),
            augmentation_suffix: DEFAULT_AUGMENTATION_SUFFIX.to_string(),
            polymorphism: PolymorphismPolicy::default(),
        }
    }
}

impl SchemaConfig {
    /// Generator options for this configuration.
    pub fn generator_options(&self) -> GeneratorOptions {
        GeneratorOptions {
            association_bases: self.association_bases.clone(),
            augmentation_suffix: self.augmentation_suffix.clone(),
            polymorphism: self.polymorphism,
        }
    }
}

/// Statement emission configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitConfig {
    /// "cypher" or "surrealql".
    pub dialect: Dialect,

    /// Node property holding the identity.
    pub id_property: String,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            id_property: DEFAULT_ID_PROPERTY.to_string(),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for docgraph data (default: ".docgraph").
    pub data_dir: String,

    /// Mapping descriptor subdirectory name.
    pub mappings_dir: String,

    /// Graph output subdirectory name.
    pub graphs_dir: String,

    /// Embedded database directory name.
    pub database_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
            mappings_dir: DEFAULT_MAPPINGS_DIR.to_string(),
            graphs_dir: DEFAULT_GRAPHS_DIR.to_string(),
            database_dir: DEFAULT_DATABASE_DIR.to_string(),
        }
    }
}

impl StorageConfig {
    /// Get the full path to the data directory.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    /// Get the full path to the mapping descriptor directory.
    pub fn mappings_path(&self) -> PathBuf {
        self.data_path().join(&self.mappings_dir)
    }

    /// Get the full path to the graph output directory.
    pub fn graphs_path(&self) -> PathBuf {
        self.data_path().join(&self.graphs_dir)
    }

    /// Get the full path to the embedded database.
    pub fn database_path(&self) -> PathBuf {
        self.data_path().join(&self.database_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.conversion.mode, ConversionMode::Descriptor);
        assert_eq!(config.conversion.id_attributes, vec!["structures:id", "id"]);
        assert_eq!(config.emit.id_property, DEFAULT_ID_PROPERTY);
        assert_eq!(config.storage.data_dir, DEFAULT_DATA_DIR);
        assert_eq!(config.conversion.conflict_policy, ConflictPolicy::LastWriteWins);
    }

    #[test]
    fn test_config_to_toml() {
        let toml_str = Config::default_config_string();
        assert!(toml_str.contains("[conversion]"));
        assert!(toml_str.contains("[schema]"));
        assert!(toml_str.contains("[emit]"));
        assert!(toml_str.contains("[storage]"));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[conversion]
mode = "dynamic"
batch_tag = "nightly"
conflict_policy = "keep_first"

[schema]
association_bases = ["my:LinkType"]

[emit]
dialect = "surrealql"
id_property = "uid"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.conversion.mode, ConversionMode::Dynamic);
        assert_eq!(config.conversion.batch_tag.as_deref(), Some("nightly"));
        assert_eq!(config.conversion.conflict_policy, ConflictPolicy::KeepFirst);
        assert_eq!(config.schema.association_bases, vec!["my:LinkType"]);
        assert_eq!(config.schema.augmentation_suffix, DEFAULT_AUGMENTATION_SUFFIX);
        assert_eq!(config.emit.dialect, Dialect::SurrealQl);
        assert_eq!(config.emit.id_property, "uid");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DOCGRAPH_MODE", "dynamic"),
            ("DOCGRAPH_DIALECT", "cypher"),
            ("DOCGRAPH_DATA_DIR", "/tmp/dg"),
            ("DOCGRAPH_BATCH_TAG", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.conversion.batch_tag = Some("old".into());
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.conversion.mode, ConversionMode::Dynamic);
        assert_eq!(config.emit.dialect, Dialect::Cypher);
        assert_eq!(config.storage.data_dir, "/tmp/dg");
        assert_eq!(config.conversion.batch_tag, None);
    }

    #[test]
    fn test_invalid_override() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|k| (k == "DOCGRAPH_CONFLICT_POLICY").then(|| "newest".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
