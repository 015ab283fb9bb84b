#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

/// Recoverable request errors detected while resolving query parameters.
///
/// Every variant names the offending parameter so the boundary layer can
/// point clients at the exact `filter[..]`, `sort`, `page[..]`, `fields[..]`
/// or `include` value that failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Requested resource type is not declared in metadata.
    #[error("unknown resource type '{resource_type}'")]
    UnknownResourceType { resource_type: String },
    /// Filter operator name is not registered.
    #[error("unknown filter operator '{operator}' for field '{field}'")]
    UnknownOperator { field: String, operator: String },
    /// Operand shape does not match the operator's arity.
    #[error("operator '{operator}' on field '{field}' {reason}")]
    InvalidOperand {
        field: String,
        operator: String,
        reason: String,
    },
    /// List operator received no operands.
    #[error("operator '{operator}' on field '{field}' requires at least one value")]
    EmptyOperandList { field: String, operator: String },
    /// `and`/`or` group without sub-filters.
    #[error("filter group '{group}' requires at least one sub-filter")]
    EmptyFilterGroup { group: String },
    /// Filter field is not an attribute (or relationship path) of the type.
    #[error("unknown filter field '{field}' on '{resource_type}'")]
    UnknownFilterField { resource_type: String, field: String },
    /// Filter tree nesting exceeds the configured depth.
    #[error("filter nesting exceeds depth {max} (got {depth})")]
    FilterTooDeep { depth: usize, max: usize },
    /// Sort key is not in the type's allow-list.
    #[error("sort field '{field}' is not supported for '{resource_type}'")]
    UnsupportedSortField { resource_type: String, field: String },
    /// `sort` contained an empty entry (`sort=a,,b`).
    #[error("sort parameter contains an empty field")]
    EmptySortField,
    /// Query parameter could not be decoded.
    #[error("malformed query parameter '{parameter}': {reason}")]
    MalformedParameter { parameter: String, reason: String },
    /// `page[number]` below 1.
    #[error("page[number] must be >= 1 (got {number})")]
    InvalidPageNumber { number: i64 },
    /// Sparse fieldset names a field absent from metadata.
    #[error("unknown field '{field}' requested for '{resource_type}'")]
    UnknownField { resource_type: String, field: String },
    /// Sparse fieldsets request too many fields in total.
    #[error("sparse fieldsets request {count} fields, exceeding the maximum of {max}")]
    TooManyFields { count: usize, max: usize },
    /// Include segment is not a relationship of the current type.
    #[error(
        "include path '{path}' is invalid: '{segment}' is not a relationship of '{resource_type}'"
    )]
    UnknownRelationship {
        path: String,
        segment: String,
        resource_type: String,
    },
    /// Include path contains an empty segment (`author..name`).
    #[error("include path '{path}' contains an empty segment")]
    EmptyIncludeSegment { path: String },
    /// Include path deeper than the configured maximum.
    #[error("include path '{path}' exceeds maximum depth {max} (got {depth})")]
    IncludeTooDeep {
        path: String,
        depth: usize,
        max: usize,
    },
    /// More distinct include paths than allowed.
    #[error("{count} include paths requested, exceeding the maximum of {max}")]
    TooManyIncludePaths { count: usize, max: usize },
}

impl ValidationError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::UnknownResourceType { .. } => "UnknownResourceType",
            ValidationError::UnknownOperator { .. } => "UnknownOperator",
            ValidationError::InvalidOperand { .. } => "InvalidOperand",
            ValidationError::EmptyOperandList { .. } => "InvalidOperand",
            ValidationError::EmptyFilterGroup { .. } => "InvalidFilter",
            ValidationError::UnknownFilterField { .. } => "UnknownFilterField",
            ValidationError::FilterTooDeep { .. } => "FilterTooDeep",
            ValidationError::UnsupportedSortField { .. } => "UnsupportedSortField",
            ValidationError::EmptySortField => "UnsupportedSortField",
            ValidationError::MalformedParameter { .. } => "MalformedParameter",
            ValidationError::InvalidPageNumber { .. } => "InvalidPageNumber",
            ValidationError::UnknownField { .. } => "UnknownField",
            ValidationError::TooManyFields { .. } => "TooManyFields",
            ValidationError::UnknownRelationship { .. } => "InvalidIncludePath",
            ValidationError::EmptyIncludeSegment { .. } => "InvalidIncludePath",
            ValidationError::IncludeTooDeep { .. } => "IncludeTooDeep",
            ValidationError::TooManyIncludePaths { .. } => "TooManyIncludePaths",
        }
    }

    /// Query parameter responsible for the error, in JSON:API bracket form.
    pub fn parameter(&self) -> String {
        match self {
            ValidationError::UnknownResourceType { .. } => "type".to_owned(),
            ValidationError::UnknownOperator { field, .. }
            | ValidationError::InvalidOperand { field, .. }
            | ValidationError::EmptyOperandList { field, .. }
            | ValidationError::UnknownFilterField { field, .. } => filter_parameter(field),
            ValidationError::EmptyFilterGroup { group } => format!("filter[{group}]"),
            ValidationError::FilterTooDeep { .. } => "filter".to_owned(),
            ValidationError::UnsupportedSortField { .. } | ValidationError::EmptySortField => {
                "sort".to_owned()
            }
            ValidationError::MalformedParameter { parameter, .. } => parameter.clone(),
            ValidationError::InvalidPageNumber { .. } => "page[number]".to_owned(),
            ValidationError::UnknownField { resource_type, .. } => {
                format!("fields[{resource_type}]")
            }
            ValidationError::TooManyFields { .. } => "fields".to_owned(),
            ValidationError::UnknownRelationship { .. }
            | ValidationError::EmptyIncludeSegment { .. }
            | ValidationError::IncludeTooDeep { .. }
            | ValidationError::TooManyIncludePaths { .. } => "include".to_owned(),
        }
    }
}

fn filter_parameter(field: &str) -> String {
    let mut out = String::from("filter");
    for segment in field.split('.') {
        out.push('[');
        out.push_str(segment);
        out.push(']');
    }
    out
}

/// Ordered, non-empty list of validation errors reported together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// Wraps `errors`, returning `None` when the list is empty.
    pub fn from_vec(errors: Vec<ValidationError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }

    /// Returns the individual errors in detection order.
    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    /// Consumes the wrapper.
    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }

    /// Number of errors collected.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no errors were collected.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if any error carries `code`.
    pub fn contains_code(&self, code: &str) -> bool {
        self.0.iter().any(|err| err.code() == code)
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(value: ValidationError) -> Self {
        Self(vec![value])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, err) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Errors raised while building a query specification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// One or more independent validation failures.
    #[error("invalid query: {0}")]
    Validation(ValidationErrors),
    /// Request is valid but too expensive; always reported alone.
    #[error("query complexity {score} exceeds budget {budget}")]
    ComplexityBudgetExceeded { score: usize, budget: usize },
}

impl QueryError {
    /// Returns a machine-readable code for the error.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Validation(_) => "ValidationError",
            QueryError::ComplexityBudgetExceeded { .. } => "ComplexityBudgetExceeded",
        }
    }

    /// Validation errors carried by the query error, if any.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            QueryError::Validation(errors) => errors.errors(),
            QueryError::ComplexityBudgetExceeded { .. } => &[],
        }
    }
}

impl From<ValidationErrors> for QueryError {
    fn from(value: ValidationErrors) -> Self {
        QueryError::Validation(value)
    }
}

impl From<ValidationError> for QueryError {
    fn from(value: ValidationError) -> Self {
        QueryError::Validation(value.into())
    }
}

/// Errors raised while compiling a filter tree into backend predicates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Neither a field-specific nor a default handler exists.
    #[error("no handler supports operator '{operator}' on field '{field}'")]
    UnsupportedFilter { field: String, operator: String },
    /// Handler rejected the operand list.
    #[error("operator '{operator}' on field '{field}' cannot compile operands: {reason}")]
    InvalidOperand {
        field: String,
        operator: String,
        reason: String,
    },
}

impl CompileError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::UnsupportedFilter { .. } => "UnsupportedFilter",
            CompileError::InvalidOperand { .. } => "InvalidOperand",
        }
    }
}
