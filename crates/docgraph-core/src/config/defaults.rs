//! Default values for docgraph configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Conversion Defaults
// ============================================================================

/// Attribute names carrying an element's own identifier.
pub const DEFAULT_ID_ATTRIBUTES: &[&str] = &["structures:id", "id"];

/// Attribute names carrying a reference to another element's identifier.
pub const DEFAULT_REF_ATTRIBUTES: &[&str] = &["structures:ref", "ref"];

/// File extensions picked up when a directory is given as input.
pub const DEFAULT_DOCUMENT_EXTENSIONS: &[&str] = &["xml", "json", "jsonld"];

/// Directories skipped when walking input directories.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[".git", ".docgraph", "target", "node_modules"];

/// Joins the element names of a flattened property key.
pub const FLATTEN_DELIMITER: &str = "__";

/// Prefix of property keys that come from attributes.
pub const ATTRIBUTE_KEY_PREFIX: &str = "@";

/// Property key holding a node element's own character data.
pub const TEXT_PROPERTY_KEY: &str = "#text";

/// Local-name suffix of association elements recognized in dynamic mode.
pub const DYNAMIC_ASSOCIATION_SUFFIX: &str = "Association";

// ============================================================================
// Schema Defaults
// ============================================================================

/// Classes whose descendants are associations.
pub const DEFAULT_ASSOCIATION_BASES: &[&str] = &["nc:AssociationType", "structures:AssociationType"];

/// Local-name suffix of augmentation classes.
pub const DEFAULT_AUGMENTATION_SUFFIX: &str = "AugmentationType";

// ============================================================================
// Emit Defaults
// ============================================================================

/// Node property holding the identity in emitted statements.
pub const DEFAULT_ID_PROPERTY: &str = "id";

// ============================================================================
// Storage Defaults
// ============================================================================

/// Default data directory.
pub const DEFAULT_DATA_DIR: &str = ".docgraph";

/// Subdirectory for generated mapping descriptors.
pub const DEFAULT_MAPPINGS_DIR: &str = "mappings";

/// Subdirectory for converted graphs and emitted statements.
pub const DEFAULT_GRAPHS_DIR: &str = "graphs";

/// Embedded graph database directory, relative to the data directory.
pub const DEFAULT_DATABASE_DIR: &str = "graph.db";

/// SurrealDB namespace used by the graph store.
pub const DEFAULT_DB_NAMESPACE: &str = "docgraph";

/// SurrealDB database used by the graph store.
pub const DEFAULT_DB_NAME: &str = "graph";
