//! JSON-fixture-backed store implementing every collaborator interface.
//!
//! Fixture shape:
//!
//! ```json
//! {
//!   "articles": [
//!     {"id": "1", "attributes": {"title": "Dune"}, "relationships": {"author": "9", "tags": ["1", "2"]}}
//!   ],
//!   "people": [{"id": "9", "attributes": {"name": "Frank Herbert"}}]
//! }
//! ```
//!
//! Relationship values are an identifier for to-one relationships, a list of
//! identifiers for to-many ones, or `null`; target type and cardinality come
//! from resource metadata. Declared relationships missing from a record load
//! as empty, and so does every declared type missing from the fixture.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::{Map, Value as Json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::query::{
    compiler::{FilterCompiler, HandlerRegistry},
    errors::CompileError,
    memory::{compare_json, MemoryBackend},
    metadata::{ResourceMetadata, ID_FIELD},
    spec::{QuerySpecification, SortKey},
};
use crate::repository::{AccessorError, CollectionSlice, ObjectReader, Related, RelationshipAccessor, Repository};

/// Shared handle to a stored record.
pub type StoredRef = Arc<StoredResource>;

/// Identifiers held by one relationship.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoredLink {
    /// To-one identifier, `None` when empty.
    One(Option<String>),
    /// To-many identifiers in fixture order.
    Many(Vec<String>),
}

/// One relationship of a stored record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredRelationship {
    /// Target resource type.
    pub target: String,
    /// Linked identifiers.
    pub link: StoredLink,
}

/// Record loaded from a fixture.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredResource {
    /// Resource type.
    pub resource_type: String,
    /// Identifier.
    pub id: String,
    /// Attribute values.
    pub attributes: Map<String, Json>,
    /// Relationship name → linked identifiers.
    pub relationships: BTreeMap<String, StoredRelationship>,
}

/// Errors raised by [`MemoryStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Fixture file could not be read.
    #[error("failed to read fixture {path}: {source}")]
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Fixture is not valid JSON of the expected shape.
    #[error("failed to parse fixture: {0}")]
    Parse(#[from] serde_json::Error),
    /// Fixture content contradicts metadata.
    #[error("invalid fixture: {0}")]
    InvalidFixture(String),
    /// Type not present in the store.
    #[error("unknown resource type '{0}'")]
    UnknownResourceType(String),
    /// Relationship not declared on the type.
    #[error("'{relationship}' is not a relationship of '{resource_type}'")]
    UnknownRelationship {
        /// Resource type.
        resource_type: String,
        /// Relationship name.
        relationship: String,
    },
    /// Filter could not be compiled for the in-memory backend.
    #[error(transparent)]
    Compile(#[from] CompileError),
}

#[derive(Deserialize)]
struct FixtureRecord {
    id: Json,
    #[serde(default)]
    attributes: Map<String, Json>,
    #[serde(default)]
    relationships: BTreeMap<String, Json>,
}

/// In-memory store keyed by `(type, id)`.
#[derive(Debug)]
pub struct MemoryStore {
    collections: BTreeMap<String, Vec<StoredRef>>,
    index: FxHashMap<(String, String), StoredRef>,
    handlers: HandlerRegistry<MemoryBackend>,
}

impl MemoryStore {
    /// Loads a fixture file.
    pub fn from_path(path: &Path, metadata: &dyn ResourceMetadata) -> Result<Self, StoreError> {
        let contents = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents, metadata)
    }

    /// Loads a fixture from a JSON string.
    pub fn from_json_str(contents: &str, metadata: &dyn ResourceMetadata) -> Result<Self, StoreError> {
        let fixture: BTreeMap<String, Vec<FixtureRecord>> = serde_json::from_str(contents)?;
        Self::from_fixture(fixture, metadata)
    }

    /// Loads a fixture from an already parsed JSON value.
    pub fn from_value(value: Json, metadata: &dyn ResourceMetadata) -> Result<Self, StoreError> {
        let fixture: BTreeMap<String, Vec<FixtureRecord>> = serde_json::from_value(value)?;
        Self::from_fixture(fixture, metadata)
    }

    fn from_fixture(
        fixture: BTreeMap<String, Vec<FixtureRecord>>,
        metadata: &dyn ResourceMetadata,
    ) -> Result<Self, StoreError> {
        let mut collections = BTreeMap::new();
        let mut index = FxHashMap::default();
        for (resource_type, records) in fixture {
            if !metadata.has_type(&resource_type) {
                return Err(StoreError::InvalidFixture(format!(
                    "resource type '{resource_type}' is not declared"
                )));
            }
            let mut stored = Vec::with_capacity(records.len());
            for record in records {
                let resource = Arc::new(load_record(&resource_type, record, metadata)?);
                let key = (resource_type.clone(), resource.id.clone());
                if index.insert(key, Arc::clone(&resource)).is_some() {
                    return Err(StoreError::InvalidFixture(format!(
                        "duplicate record {resource_type}/{}",
                        resource.id
                    )));
                }
                stored.push(resource);
            }
            collections.insert(resource_type, stored);
        }
        for resource_type in metadata.type_names() {
            collections.entry(resource_type.to_owned()).or_default();
        }
        let store = Self {
            collections,
            index,
            handlers: MemoryBackend::handlers(),
        };
        store.warn_dangling();
        debug!(records = store.index.len(), "loaded memory store");
        Ok(store)
    }

    fn warn_dangling(&self) {
        for resource in self.index.values() {
            for (name, rel) in &resource.relationships {
                let ids: Vec<&String> = match &rel.link {
                    StoredLink::One(id) => id.iter().collect(),
                    StoredLink::Many(ids) => ids.iter().collect(),
                };
                for id in ids {
                    if !self.index.contains_key(&(rel.target.clone(), id.clone())) {
                        warn!(
                            resource_type = %resource.resource_type,
                            id = %resource.id,
                            relationship = %name,
                            target = %format!("{}/{id}", rel.target),
                            "relationship points at a missing record"
                        );
                    }
                }
            }
        }
    }

    /// Looks up one record.
    pub fn get(&self, resource_type: &str, id: &str) -> Option<&StoredRef> {
        self.index.get(&(resource_type.to_owned(), id.to_owned()))
    }

    /// Number of records of `resource_type`.
    pub fn len_of(&self, resource_type: &str) -> usize {
        self.collections.get(resource_type).map_or(0, Vec::len)
    }

    fn related(&self, rel: &StoredRelationship) -> Related<StoredRef> {
        match &rel.link {
            StoredLink::One(id) => Related::ToOne(
                id.as_ref()
                    .and_then(|id| self.get(&rel.target, id))
                    .cloned(),
            ),
            StoredLink::Many(ids) => Related::ToMany(
                ids.iter()
                    .filter_map(|id| self.get(&rel.target, id))
                    .cloned()
                    .collect(),
            ),
        }
    }

    /// Values reached by a dotted field path from `resource`.
    fn field_values(&self, resource: &StoredResource, path: &str) -> Vec<Json> {
        let mut current: Vec<&StoredResource> = vec![resource];
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                return current
                    .iter()
                    .filter_map(|r| read_field(r, segment))
                    .collect();
            }
            let mut next = Vec::new();
            for r in &current {
                let Some(rel) = r.relationships.get(segment) else {
                    continue;
                };
                let ids: Vec<&String> = match &rel.link {
                    StoredLink::One(id) => id.iter().collect(),
                    StoredLink::Many(ids) => ids.iter().collect(),
                };
                next.extend(
                    ids.into_iter()
                        .filter_map(|id| self.get(&rel.target, id))
                        .map(|stored| stored.as_ref()),
                );
            }
            current = next;
        }
        Vec::new()
    }
}

fn read_field(resource: &StoredResource, name: &str) -> Option<Json> {
    if name == ID_FIELD {
        return Some(Json::String(resource.id.clone()));
    }
    resource.attributes.get(name).cloned()
}

fn load_record(
    resource_type: &str,
    record: FixtureRecord,
    metadata: &dyn ResourceMetadata,
) -> Result<StoredResource, StoreError> {
    let id = identifier(&record.id).ok_or_else(|| {
        StoreError::InvalidFixture(format!(
            "{resource_type} record has a non-scalar id: {}",
            record.id
        ))
    })?;
    let mut relationships = BTreeMap::new();
    if let Some(declared) = metadata.relationships_of(resource_type) {
        for (name, meta) in declared {
            let link = if meta.to_many {
                StoredLink::Many(Vec::new())
            } else {
                StoredLink::One(None)
            };
            relationships.insert(
                name.clone(),
                StoredRelationship {
                    target: meta.target.clone(),
                    link,
                },
            );
        }
    }
    for (name, value) in record.relationships {
        let Some(entry) = relationships.get_mut(&name) else {
            return Err(StoreError::UnknownRelationship {
                resource_type: resource_type.to_owned(),
                relationship: name,
            });
        };
        let to_many = matches!(entry.link, StoredLink::Many(_));
        let invalid = |held: &Json| {
            StoreError::InvalidFixture(format!(
                "{resource_type}/{id} relationship '{name}' holds {held}"
            ))
        };
        entry.link = match value {
            Json::Null if to_many => StoredLink::Many(Vec::new()),
            Json::Null => StoredLink::One(None),
            Json::Array(items) if to_many => StoredLink::Many(
                items
                    .iter()
                    .map(|item| identifier(item).ok_or_else(|| invalid(item)))
                    .collect::<Result<_, _>>()?,
            ),
            scalar if !to_many && !scalar.is_array() => {
                StoredLink::One(Some(identifier(&scalar).ok_or_else(|| invalid(&scalar))?))
            }
            other => {
                let expected = if to_many { "a list" } else { "a single identifier" };
                return Err(StoreError::InvalidFixture(format!(
                    "{resource_type}/{id} relationship '{name}' expects {expected}, got {other}"
                )));
            }
        };
    }
    Ok(StoredResource {
        resource_type: resource_type.to_owned(),
        id,
        attributes: record.attributes,
        relationships,
    })
}

fn identifier(value: &Json) -> Option<String> {
    match value {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn compare_by_keys(a: &StoredResource, b: &StoredResource, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let left = read_field(a, &key.field).unwrap_or(Json::Null);
        let right = read_field(b, &key.field).unwrap_or(Json::Null);
        let ord = compare_json(&left, &right);
        let ord = if key.descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

impl ObjectReader<StoredRef> for MemoryStore {
    fn identifier_of(&self, _resource_type: &str, object: &StoredRef) -> String {
        object.id.clone()
    }

    fn attribute_of(&self, _resource_type: &str, object: &StoredRef, name: &str) -> Option<Json> {
        object.attributes.get(name).cloned()
    }
}

impl RelationshipAccessor<StoredRef> for MemoryStore {
    fn resolve(
        &self,
        resource_type: &str,
        object: &StoredRef,
        relationship: &str,
    ) -> Result<Related<StoredRef>, AccessorError> {
        let rel = object.relationships.get(relationship).ok_or_else(|| {
            StoreError::UnknownRelationship {
                resource_type: resource_type.to_owned(),
                relationship: relationship.to_owned(),
            }
        })?;
        Ok(self.related(rel))
    }
}

impl Repository<StoredRef> for MemoryStore {
    type Error = StoreError;

    fn find_collection(
        &self,
        resource_type: &str,
        spec: &QuerySpecification,
    ) -> Result<CollectionSlice<StoredRef>, StoreError> {
        let records = self
            .collections
            .get(resource_type)
            .ok_or_else(|| StoreError::UnknownResourceType(resource_type.to_owned()))?;
        let predicate = match &spec.filter {
            Some(node) => Some(FilterCompiler::new(&MemoryBackend, &self.handlers).compile(node)?),
            None => None,
        };
        let mut matched: Vec<StoredRef> = records
            .iter()
            .filter(|record| {
                predicate.as_ref().map_or(true, |p| {
                    p.matches(&|path: &str| self.field_values(record, path))
                })
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| compare_by_keys(a, b, &spec.sort));
        let total = matched.len() as u64;
        let offset = usize::try_from(spec.page.offset()).unwrap_or(usize::MAX);
        let size = usize::try_from(spec.page.size).unwrap_or(usize::MAX);
        let items: Vec<StoredRef> = matched.into_iter().skip(offset).take(size).collect();
        debug!(
            resource_type,
            total,
            returned = items.len(),
            "memory store collection query"
        );
        Ok(CollectionSlice { items, total })
    }

    fn find_one(
        &self,
        resource_type: &str,
        id: &str,
        _spec: &QuerySpecification,
    ) -> Result<Option<StoredRef>, StoreError> {
        if !self.collections.contains_key(resource_type) {
            return Err(StoreError::UnknownResourceType(resource_type.to_owned()));
        }
        Ok(self.get(resource_type, id).cloned())
    }
}
