//! Filter compilation: [`FilterNode`] trees → backend predicates.
//!
//! The compiler is backend-agnostic. A [`FilterBackend`] says how to combine
//! predicates, and [`OperatorHandler`]s turn individual comparisons into
//! predicates. Handlers are looked up per `(field, operator)` first, then per
//! operator; a comparison with neither fails with
//! [`CompileError::UnsupportedFilter`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::query::{ast::FilterNode, errors::CompileError, operators::IS_NULL, Value};

/// Backend that owns the predicate representation.
pub trait FilterBackend {
    /// Backend-specific predicate (SQL fragment, closure, plan node, ...).
    type Predicate;

    /// Predicate matching when every child matches.
    fn all(&self, children: Vec<Self::Predicate>) -> Self::Predicate;

    /// Predicate matching when any child matches.
    fn any(&self, children: Vec<Self::Predicate>) -> Self::Predicate;
}

/// Compiles one operator application into a backend predicate.
///
/// Null checks reach handlers registered under `isnull` with a single
/// `Value::Bool(is_null)` operand.
pub trait OperatorHandler<B: FilterBackend + ?Sized>: Send + Sync {
    /// Builds the predicate for `field <operator> values`.
    fn compile(
        &self,
        backend: &B,
        field: &str,
        operator: &str,
        values: &[Value],
    ) -> Result<B::Predicate, CompileError>;
}

/// Adapts a closure into an [`OperatorHandler`].
pub struct FnHandler<F>(pub F);

impl<B, F> OperatorHandler<B> for FnHandler<F>
where
    B: FilterBackend + ?Sized,
    F: Fn(&B, &str, &str, &[Value]) -> Result<B::Predicate, CompileError> + Send + Sync,
{
    fn compile(
        &self,
        backend: &B,
        field: &str,
        operator: &str,
        values: &[Value],
    ) -> Result<B::Predicate, CompileError> {
        (self.0)(backend, field, operator, values)
    }
}

/// Wraps `f` as a shareable handler.
pub fn handler_fn<B, F>(f: F) -> Arc<dyn OperatorHandler<B>>
where
    B: FilterBackend + ?Sized + 'static,
    F: Fn(&B, &str, &str, &[Value]) -> Result<B::Predicate, CompileError> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

/// Default and per-field handler tables for one backend.
pub struct HandlerRegistry<B: FilterBackend + ?Sized> {
    defaults: HashMap<String, Arc<dyn OperatorHandler<B>>>,
    per_field: HashMap<(String, String), Arc<dyn OperatorHandler<B>>>,
}

impl<B: FilterBackend + ?Sized> Default for HandlerRegistry<B> {
    fn default() -> Self {
        Self {
            defaults: HashMap::new(),
            per_field: HashMap::new(),
        }
    }
}

impl<B: FilterBackend + ?Sized> Clone for HandlerRegistry<B> {
    fn clone(&self) -> Self {
        Self {
            defaults: self.defaults.clone(),
            per_field: self.per_field.clone(),
        }
    }
}

impl<B: FilterBackend + ?Sized> fmt::Debug for HandlerRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut defaults: Vec<&str> = self.defaults.keys().map(String::as_str).collect();
        defaults.sort_unstable();
        let mut per_field: Vec<String> = self
            .per_field
            .keys()
            .map(|(field, op)| format!("{field}:{op}"))
            .collect();
        per_field.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("defaults", &defaults)
            .field("per_field", &per_field)
            .finish()
    }
}

impl<B: FilterBackend + ?Sized> HandlerRegistry<B> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the fallback handler for `operator`.
    pub fn with_default(
        mut self,
        operator: impl Into<String>,
        handler: Arc<dyn OperatorHandler<B>>,
    ) -> Self {
        self.defaults.insert(operator.into(), handler);
        self
    }

    /// Registers a handler used only for `field` with `operator`.
    pub fn with_field(
        mut self,
        field: impl Into<String>,
        operator: impl Into<String>,
        handler: Arc<dyn OperatorHandler<B>>,
    ) -> Self {
        self.per_field
            .insert((field.into(), operator.into()), handler);
        self
    }

    /// Resolves the handler for `(field, operator)`.
    pub fn resolve(&self, field: &str, operator: &str) -> Option<&Arc<dyn OperatorHandler<B>>> {
        self.per_field
            .get(&(field.to_owned(), operator.to_owned()))
            .or_else(|| self.defaults.get(operator))
    }
}

/// Walks a filter tree and emits backend predicates.
pub struct FilterCompiler<'a, B: FilterBackend + ?Sized> {
    backend: &'a B,
    handlers: &'a HandlerRegistry<B>,
}

impl<'a, B: FilterBackend + ?Sized> FilterCompiler<'a, B> {
    /// Binds a backend to its handler tables.
    pub fn new(backend: &'a B, handlers: &'a HandlerRegistry<B>) -> Self {
        Self { backend, handlers }
    }

    /// Compiles `node` into one predicate.
    pub fn compile(&self, node: &FilterNode) -> Result<B::Predicate, CompileError> {
        match node {
            FilterNode::Comparison(cmp) => {
                self.apply(&cmp.field, &cmp.operator, &cmp.values)
            }
            FilterNode::NullCheck { field, is_null } => {
                self.apply(field, IS_NULL, &[Value::Bool(*is_null)])
            }
            FilterNode::Conjunction { children } => {
                let compiled = self.compile_all(children)?;
                Ok(self.backend.all(compiled))
            }
            FilterNode::Disjunction { children } => {
                let compiled = self.compile_all(children)?;
                Ok(self.backend.any(compiled))
            }
        }
    }

    fn compile_all(&self, children: &[FilterNode]) -> Result<Vec<B::Predicate>, CompileError> {
        children.iter().map(|child| self.compile(child)).collect()
    }

    fn apply(
        &self,
        field: &str,
        operator: &str,
        values: &[Value],
    ) -> Result<B::Predicate, CompileError> {
        let handler = self.handlers.resolve(field, operator).ok_or_else(|| {
            CompileError::UnsupportedFilter {
                field: field.to_owned(),
                operator: operator.to_owned(),
            }
        })?;
        handler.compile(self.backend, field, operator, values)
    }
}
