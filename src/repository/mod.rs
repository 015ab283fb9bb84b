//! Interfaces to the persistence side.
//!
//! The core never reads storage itself. Callers supply an [`ObjectReader`]
//! and a [`RelationshipAccessor`] for the document assembler, and a
//! [`Repository`] that turns a [`QuerySpecification`] into a page of domain
//! objects. [`memory::MemoryStore`] implements all three over a JSON fixture.

use serde_json::Value as Json;

use crate::query::spec::QuerySpecification;

pub mod memory;

/// Boxed error returned by external collaborators.
pub type AccessorError = Box<dyn std::error::Error + Send + Sync>;

/// Reads identity and attributes from domain objects.
pub trait ObjectReader<O> {
    /// Identifier of `object`, a `resource_type` instance.
    fn identifier_of(&self, resource_type: &str, object: &O) -> String;

    /// Value of attribute `name`, or `None` when the object lacks it.
    fn attribute_of(&self, resource_type: &str, object: &O, name: &str) -> Option<Json>;
}

/// Objects on the other end of a relationship.
#[derive(Clone, Debug, PartialEq)]
pub enum Related<O> {
    /// To-one relationship; `None` when empty.
    ToOne(Option<O>),
    /// To-many relationship.
    ToMany(Vec<O>),
}

impl<O> Related<O> {
    /// Related objects as a slice-like iterator.
    pub fn iter(&self) -> impl Iterator<Item = &O> {
        let (one, many) = match self {
            Related::ToOne(item) => (item.as_ref(), &[][..]),
            Related::ToMany(items) => (None, items.as_slice()),
        };
        one.into_iter().chain(many.iter())
    }
}

/// Resolves relationships of domain objects.
pub trait RelationshipAccessor<O> {
    /// Loads the objects related to `object` through `relationship`.
    fn resolve(
        &self,
        resource_type: &str,
        object: &O,
        relationship: &str,
    ) -> Result<Related<O>, AccessorError>;
}

/// One page of a collection plus the unpaginated match count.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionSlice<O> {
    /// Objects on the requested page.
    pub items: Vec<O>,
    /// Number of objects matching the filter across all pages.
    pub total: u64,
}

/// Executes the filter, sort and pagination parts of a specification.
///
/// Sparse fieldsets and includes are left to the document assembler.
pub trait Repository<O> {
    /// Storage error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the requested page of `resource_type`.
    fn find_collection(
        &self,
        resource_type: &str,
        spec: &QuerySpecification,
    ) -> Result<CollectionSlice<O>, Self::Error>;

    /// Returns one object by identifier.
    fn find_one(
        &self,
        resource_type: &str,
        id: &str,
        spec: &QuerySpecification,
    ) -> Result<Option<O>, Self::Error>;
}
