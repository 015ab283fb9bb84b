//! Query configuration knobs and the on-disk configuration file.
//!
//! Knob names are snake_case in TOML; the camelCase spellings
//! (`defaultSize`, `includeMaxDepth`, ...) are accepted as aliases.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::LinkagePolicy;
use crate::query::metadata::{InMemoryMetadata, ResourceMetadata, ResourceSchema, ID_FIELD};
use crate::query::operators::MAX_LIST_OPERANDS;

/// Pagination bounds.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size used when the request omits `page[size]`.
    #[serde(alias = "defaultSize")]
    pub default_size: u64,
    /// Ceiling applied to `page[size]`.
    #[serde(alias = "maxSize")]
    pub max_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_size: 20,
            max_size: 100,
        }
    }
}

/// Sort allow-lists.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    /// Resource type → sortable fields. Types without an entry allow `id`
    /// and every declared attribute.
    #[serde(alias = "whitelistPerType")]
    pub whitelist_per_type: BTreeMap<String, Vec<String>>,
}

/// Per-component weights of the complexity score.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityWeights {
    /// Weight applied to each include segment.
    pub include: usize,
    /// Weight applied to each requested sparse field.
    pub field: usize,
    /// Weight applied to each filter node.
    pub filter: usize,
}

impl Default for ComplexityWeights {
    fn default() -> Self {
        Self {
            include: 1,
            field: 1,
            filter: 1,
        }
    }
}

/// Request size limits.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum include path depth.
    #[serde(alias = "includeMaxDepth")]
    pub include_max_depth: usize,
    /// Maximum number of distinct include paths.
    #[serde(alias = "includeMaxPaths")]
    pub include_max_paths: usize,
    /// Maximum number of sparse fields across all types.
    #[serde(alias = "fieldsMaxTotal")]
    pub fields_max_total: usize,
    /// Maximum filter tree depth.
    #[serde(alias = "filterMaxDepth")]
    pub filter_max_depth: usize,
    /// Maximum operands per list operator.
    #[serde(alias = "filterMaxOperands")]
    pub filter_max_operands: usize,
    /// Ceiling on the weighted complexity score.
    #[serde(alias = "complexityBudget")]
    pub complexity_budget: usize,
    /// Score weights.
    pub weights: ComplexityWeights,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            include_max_depth: 3,
            include_max_paths: 10,
            fields_max_total: 50,
            filter_max_depth: 8,
            filter_max_operands: MAX_LIST_OPERANDS,
            complexity_budget: 100,
            weights: ComplexityWeights::default(),
        }
    }
}

/// Relationship rendering options.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipsConfig {
    /// When resource objects carry relationship linkage.
    #[serde(alias = "linkageInResource")]
    pub linkage_in_resource: LinkagePolicy,
}

/// All knobs consumed by the query builder and document assembler.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Pagination bounds.
    pub pagination: PaginationConfig,
    /// Sort allow-lists.
    pub sort: SortConfig,
    /// Request size limits.
    pub limits: LimitsConfig,
    /// Relationship rendering.
    pub relationships: RelationshipsConfig,
}

impl QueryConfig {
    /// Parses knobs from a TOML string and validates them.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: QueryConfig =
            toml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects knob combinations that cannot produce a valid request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pagination.max_size == 0 {
            return Err(ConfigError::invalid("pagination.max_size", "must be >= 1"));
        }
        if self.pagination.default_size == 0
            || self.pagination.default_size > self.pagination.max_size
        {
            return Err(ConfigError::invalid(
                "pagination.default_size",
                format!("must be within [1, {}]", self.pagination.max_size),
            ));
        }
        if self.limits.include_max_depth == 0 {
            return Err(ConfigError::invalid("limits.include_max_depth", "must be >= 1"));
        }
        if self.limits.filter_max_depth == 0 {
            return Err(ConfigError::invalid("limits.filter_max_depth", "must be >= 1"));
        }
        if self.limits.filter_max_operands == 0 {
            return Err(ConfigError::invalid(
                "limits.filter_max_operands",
                "must be >= 1",
            ));
        }
        Ok(())
    }

    /// Checks sort allow-lists against declared metadata.
    pub fn validate_against(&self, metadata: &dyn ResourceMetadata) -> Result<(), ConfigError> {
        for (ty, fields) in &self.sort.whitelist_per_type {
            if !metadata.has_type(ty) {
                return Err(ConfigError::invalid(
                    format!("sort.whitelist_per_type.{ty}"),
                    "names an undeclared resource type",
                ));
            }
            for field in fields {
                let root = field.split('.').next().unwrap_or(field);
                let known = field == ID_FIELD
                    || metadata.has_attribute(ty, field)
                    || metadata.relationship(ty, root).is_some();
                if !known {
                    return Err(ConfigError::invalid(
                        format!("sort.whitelist_per_type.{ty}"),
                        format!("'{field}' is not a field of '{ty}'"),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Configuration file: knobs plus the resource schema.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Pagination bounds.
    pub pagination: PaginationConfig,
    /// Sort allow-lists.
    pub sort: SortConfig,
    /// Request size limits.
    pub limits: LimitsConfig,
    /// Relationship rendering.
    pub relationships: RelationshipsConfig,
    /// Resource type → declared shape.
    pub resources: BTreeMap<String, ResourceSchema>,
}

impl ConfigFile {
    /// Reads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        file.validate()?;
        Ok(file)
    }

    /// Parses and validates a configuration file from a string.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        file.validate()?;
        Ok(file)
    }

    /// Validates knobs and schema consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (query, metadata) = self.clone().into_parts();
        query.validate()?;
        if let Some((ty, name, target)) = metadata.dangling_relationships().into_iter().next() {
            return Err(ConfigError::invalid(
                format!("resources.{ty}.relationships.{name}"),
                format!("targets undeclared type '{target}'"),
            ));
        }
        query.validate_against(&metadata)
    }

    /// Splits the file into query knobs and a metadata provider.
    pub fn into_parts(self) -> (QueryConfig, InMemoryMetadata) {
        let query = QueryConfig {
            pagination: self.pagination,
            sort: self.sort,
            limits: self.limits,
            relationships: self.relationships,
        };
        (query, InMemoryMetadata::from_schemas(self.resources))
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// File is not valid TOML for the expected shape.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Offending path.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// A knob holds an unusable value.
    #[error("invalid config value for {key}: {reason}")]
    Invalid {
        /// Dotted knob name.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
    /// No explicit path and no platform config directory.
    #[error("no config directory found; pass --config or set JSONAPI_QUERY_CONFIG")]
    NoConfigPath,
}

impl ConfigError {
    fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Platform default location of the configuration file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("jsonapi-query").join("config.toml"))
}
