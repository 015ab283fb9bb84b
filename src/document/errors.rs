//! JSON:API error documents.
//!
//! Status codes are a transport concern and are not assigned here.

use serde::Serialize;

use crate::document::assembler::AssemblyError;
use crate::query::errors::{QueryError, ValidationError};

/// `source` member pointing at the offending query parameter.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ErrorSource {
    /// Query parameter name, e.g. `filter[year]`.
    pub parameter: String,
}

/// One JSON:API error object.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ErrorObject {
    /// Machine-readable code.
    pub code: String,
    /// Short summary of the problem class.
    pub title: String,
    /// Occurrence-specific explanation.
    pub detail: String,
    /// Offending parameter, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
}

impl From<&ValidationError> for ErrorObject {
    fn from(err: &ValidationError) -> Self {
        Self {
            code: err.code().to_owned(),
            title: "Invalid query parameter".to_owned(),
            detail: err.to_string(),
            source: Some(ErrorSource {
                parameter: err.parameter(),
            }),
        }
    }
}

/// Top-level `{"errors": [...]}` document.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ErrorDocument {
    /// Error objects in detection order.
    pub errors: Vec<ErrorObject>,
}

impl ErrorDocument {
    /// Serializes the document to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<&QueryError> for ErrorDocument {
    fn from(err: &QueryError) -> Self {
        let errors = match err {
            QueryError::Validation(errors) => errors.errors().iter().map(ErrorObject::from).collect(),
            QueryError::ComplexityBudgetExceeded { .. } => vec![ErrorObject {
                code: err.code().to_owned(),
                title: "Query too complex".to_owned(),
                detail: err.to_string(),
                source: None,
            }],
        };
        Self { errors }
    }
}

impl From<&AssemblyError> for ErrorDocument {
    fn from(err: &AssemblyError) -> Self {
        Self {
            errors: vec![ErrorObject {
                code: err.code().to_owned(),
                title: "Document assembly failed".to_owned(),
                detail: err.to_string(),
                source: None,
            }],
        }
    }
}
