//! JSON:API read-query core.
//!
//! Turns raw `filter`, `sort`, `page`, `fields` and `include` parameters into
//! an immutable [`QuerySpecification`], compiles filters into backend
//! predicates, and assembles compound documents with deduplicated
//! `included` resources.
//!
//! ```
//! use jsonapi_query::config::QueryConfig;
//! use jsonapi_query::query::{InMemoryMetadata, OperatorRegistry, QuerySpecBuilder, RelationshipMeta};
//!
//! let metadata = InMemoryMetadata::new()
//!     .with_type("articles", ["title", "year"])
//!     .with_type("people", ["name"])
//!     .with_relationship("articles", "author", RelationshipMeta::to_one("people"));
//! let operators = OperatorRegistry::with_builtins();
//! let config = QueryConfig::default();
//!
//! let spec = QuerySpecBuilder::new(&metadata, &operators, &config)
//!     .build_from_query_string("articles", "filter[year][gte]=1965&sort=-year&include=author")
//!     .unwrap();
//! assert_eq!(spec.sort[0].to_string(), "-year");
//! assert!(spec.include.contains("author"));
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod document;
pub mod error;
pub mod query;
pub mod repository;

pub use error::{Error, Result};
pub use query::QuerySpecification;
