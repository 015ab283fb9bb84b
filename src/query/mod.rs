#![forbid(unsafe_code)]

//! Read-query core: filter parsing, operator registry and compilation, and
//! the resolvers that turn raw JSON:API query parameters into an immutable
//! [`QuerySpecification`].

/// Filter AST.
pub mod ast;

/// Query specification builder.
///
/// Runs every resolver in order and aggregates their validation errors.
pub mod builder;

/// Backend-agnostic filter compilation.
pub mod compiler;

/// Validation, query and compile errors.
pub mod errors;

/// Sparse-fieldset resolver.
pub mod fields;

/// Filter expression parser and field validation.
pub mod filter;

/// Include-path resolver.
pub mod include;

/// Complexity scoring.
pub mod limits;

/// In-process filter backend.
pub mod memory;

/// Resource metadata provider.
///
/// Declares attributes and relationships per resource type.
pub mod metadata;

/// Operator registry.
pub mod operators;

/// Pagination resolver.
pub mod pagination;

/// Raw query parameters and query-string decoding.
pub mod params;

/// Sort resolver.
pub mod sort;

/// Resolved specification types.
pub mod spec;

/// Operand values.
pub mod value;

pub use ast::{Comparison, FilterNode};
pub use builder::QuerySpecBuilder;
pub use compiler::{FilterBackend, FilterCompiler, HandlerRegistry, OperatorHandler};
pub use errors::{CompileError, QueryError, ValidationError, ValidationErrors};
pub use metadata::{InMemoryMetadata, RelationshipMeta, ResourceMetadata};
pub use operators::OperatorRegistry;
pub use params::QueryParams;
pub use spec::{
    ComplexityScore, FieldSelection, IncludePath, IncludeTree, PageDescriptor, QuerySpecification,
    SortKey,
};
pub use value::{FilterInput, Value};
