//! Crate-level error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::document::AssemblyError;
use crate::query::errors::{CompileError, QueryError};
use crate::repository::memory::StoreError;

/// Result alias for the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Any error raised by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Query parameters were rejected.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// Filter could not be compiled for a backend.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// Document assembly failed.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The in-memory store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// Returns a machine-readable code for the error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Query(err) => err.code(),
            Error::Compile(err) => err.code(),
            Error::Assembly(err) => err.code(),
            Error::Config(_) => "ConfigError",
            Error::Store(_) => "StoreError",
        }
    }
}
