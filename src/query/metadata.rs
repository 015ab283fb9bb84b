//! Resource metadata bridging JSON:API type names to their declared shape.
//!
//! Resolvers and the document assembler only ever consult metadata through
//! [`ResourceMetadata`]. Providers are populated once at startup and then
//! shared read-only, so lookups never take locks.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Identifier pseudo-field accepted by sorting and filtering.
pub const ID_FIELD: &str = "id";

/// Declared relationship between two resource types.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMeta {
    /// Resource type on the other end of the relationship.
    pub target: String,
    /// Whether the relationship holds a list of resources.
    #[serde(default)]
    pub to_many: bool,
}

impl RelationshipMeta {
    /// Declares a to-one relationship.
    pub fn to_one(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            to_many: false,
        }
    }

    /// Declares a to-many relationship.
    pub fn to_many(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            to_many: true,
        }
    }
}

/// Provides per-type attribute and relationship declarations.
pub trait ResourceMetadata: Send + Sync {
    /// Returns `true` if `resource_type` is declared.
    fn has_type(&self, resource_type: &str) -> bool;
    /// Every declared type name.
    fn type_names(&self) -> Vec<&str>;
    /// Attribute names declared for `resource_type`.
    fn attributes_of(&self, resource_type: &str) -> Option<&BTreeSet<String>>;
    /// Relationship declarations for `resource_type`.
    fn relationships_of(&self, resource_type: &str) -> Option<&BTreeMap<String, RelationshipMeta>>;

    /// Looks up one relationship declaration.
    fn relationship(&self, resource_type: &str, name: &str) -> Option<&RelationshipMeta> {
        self.relationships_of(resource_type)
            .and_then(|rels| rels.get(name))
    }

    /// Returns `true` if `name` is a declared attribute of `resource_type`.
    fn has_attribute(&self, resource_type: &str, name: &str) -> bool {
        self.attributes_of(resource_type)
            .is_some_and(|attrs| attrs.contains(name))
    }
}

/// Declared shape of one resource type.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResourceSchema {
    /// Attribute names.
    #[serde(default)]
    pub attributes: BTreeSet<String>,
    /// Relationship name → declaration.
    #[serde(default)]
    pub relationships: BTreeMap<String, RelationshipMeta>,
}

/// Simple in-memory metadata provider, built from configuration or code.
#[derive(Clone, Debug, Default)]
pub struct InMemoryMetadata {
    types: BTreeMap<String, ResourceSchema>,
}

impl InMemoryMetadata {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps already-declared schemas.
    pub fn from_schemas(types: BTreeMap<String, ResourceSchema>) -> Self {
        Self { types }
    }

    /// Declares a resource type with the given attributes.
    pub fn with_type<I, S>(mut self, resource_type: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.types.entry(resource_type.into()).or_default();
        entry
            .attributes
            .extend(attributes.into_iter().map(Into::into));
        self
    }

    /// Declares a relationship on `resource_type`, creating the type if needed.
    pub fn with_relationship(
        mut self,
        resource_type: impl Into<String>,
        name: impl Into<String>,
        meta: RelationshipMeta,
    ) -> Self {
        self.types
            .entry(resource_type.into())
            .or_default()
            .relationships
            .insert(name.into(), meta);
        self
    }

    /// Relationship declarations whose target type is not declared.
    pub fn dangling_relationships(&self) -> Vec<(String, String, String)> {
        let mut out = Vec::new();
        for (ty, schema) in &self.types {
            for (name, rel) in &schema.relationships {
                if !self.types.contains_key(&rel.target) {
                    out.push((ty.clone(), name.clone(), rel.target.clone()));
                }
            }
        }
        out
    }
}

impl ResourceMetadata for InMemoryMetadata {
    fn has_type(&self, resource_type: &str) -> bool {
        self.types.contains_key(resource_type)
    }

    fn type_names(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    fn attributes_of(&self, resource_type: &str) -> Option<&BTreeSet<String>> {
        self.types.get(resource_type).map(|s| &s.attributes)
    }

    fn relationships_of(&self, resource_type: &str) -> Option<&BTreeMap<String, RelationshipMeta>> {
        self.types.get(resource_type).map(|s| &s.relationships)
    }
}
