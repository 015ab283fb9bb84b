//! Named comparison operators and their operand rules.
//!
//! The registry is built once at startup and shared read-only across
//! requests. Each [`Operator`] validates and normalizes the operand shape it
//! receives from the parser; what the operator *means* is left to the
//! backend handlers in [`crate::query::compiler`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::query::{errors::ValidationError, FilterInput, Value};

/// Equality.
pub const EQ: &str = "eq";
/// Inequality.
pub const NEQ: &str = "neq";
/// Strictly less than.
pub const LT: &str = "lt";
/// Less than or equal.
pub const LTE: &str = "lte";
/// Strictly greater than.
pub const GT: &str = "gt";
/// Greater than or equal.
pub const GTE: &str = "gte";
/// SQL-style pattern match.
pub const LIKE: &str = "like";
/// Membership.
pub const IN: &str = "in";
/// Non-membership.
pub const NIN: &str = "nin";
/// Inclusive range.
pub const BETWEEN: &str = "between";
/// Null test; parsed into a null-check node rather than a comparison.
pub const IS_NULL: &str = "isnull";

/// Default ceiling on list operands per comparison.
pub const MAX_LIST_OPERANDS: usize = 1_000;

/// Operand arity declared by an operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Arity {
    /// Exactly one scalar.
    Single,
    /// One or more scalars (comma-separated strings are split).
    List,
    /// Exactly two scalars (lower, upper).
    Pair,
    /// A boolean flag.
    Flag,
}

/// A named filter operator.
pub trait Operator: fmt::Debug + Send + Sync {
    /// Operator name as written in `filter[field][name]`.
    fn name(&self) -> &str;

    /// Declared operand arity.
    fn arity(&self) -> Arity;

    /// Whether a `null` operand is accepted.
    fn accepts_null(&self) -> bool {
        false
    }

    /// Validates `operand` and returns the normalized operand list.
    fn normalize(
        &self,
        field: &str,
        operand: &FilterInput,
        max_operands: usize,
    ) -> Result<Vec<Value>, ValidationError> {
        normalize_by_arity(self, field, operand, max_operands)
    }
}

/// Operator backed purely by its arity rules.
#[derive(Clone, Debug)]
pub struct BasicOperator {
    name: String,
    arity: Arity,
    accepts_null: bool,
}

impl BasicOperator {
    /// Creates an operator with the given name and arity.
    pub fn new(name: impl Into<String>, arity: Arity) -> Self {
        Self {
            name: name.into(),
            arity,
            accepts_null: false,
        }
    }

    /// Allows `null` operands (equality-style operators).
    pub fn allow_null(mut self) -> Self {
        self.accepts_null = true;
        self
    }
}

impl Operator for BasicOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> Arity {
        self.arity
    }

    fn accepts_null(&self) -> bool {
        self.accepts_null
    }
}

/// Immutable name → operator table.
#[derive(Clone, Debug, Default)]
pub struct OperatorRegistry {
    operators: HashMap<String, Arc<dyn Operator>>,
}

impl OperatorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in operators.
    pub fn with_builtins() -> Self {
        Self::new()
            .with(BasicOperator::new(EQ, Arity::Single).allow_null())
            .with(BasicOperator::new(NEQ, Arity::Single).allow_null())
            .with(BasicOperator::new(LT, Arity::Single))
            .with(BasicOperator::new(LTE, Arity::Single))
            .with(BasicOperator::new(GT, Arity::Single))
            .with(BasicOperator::new(GTE, Arity::Single))
            .with(BasicOperator::new(LIKE, Arity::Single))
            .with(BasicOperator::new(IN, Arity::List))
            .with(BasicOperator::new(NIN, Arity::List))
            .with(BasicOperator::new(BETWEEN, Arity::Pair))
            .with(BasicOperator::new(IS_NULL, Arity::Flag))
    }

    /// Registers `operator`, replacing any operator with the same name.
    pub fn with<O>(mut self, operator: O) -> Self
    where
        O: Operator + 'static,
    {
        self.register(Arc::new(operator));
        self
    }

    /// Registers a shared operator instance.
    pub fn register(&mut self, operator: Arc<dyn Operator>) {
        self.operators.insert(operator.name().to_owned(), operator);
    }

    /// Looks up an operator by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Operator>> {
        self.operators.get(name)
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    /// Registered operator names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn normalize_by_arity<O>(
    op: &O,
    field: &str,
    operand: &FilterInput,
    max_operands: usize,
) -> Result<Vec<Value>, ValidationError>
where
    O: Operator + ?Sized,
{
    let invalid = |reason: String| ValidationError::InvalidOperand {
        field: field.to_owned(),
        operator: op.name().to_owned(),
        reason,
    };
    match op.arity() {
        Arity::Single => match operand {
            FilterInput::Scalar(Value::Null) if !op.accepts_null() => {
                Err(invalid("does not accept null".into()))
            }
            FilterInput::Scalar(value) => Ok(vec![value.clone()]),
            other => Err(invalid(format!("expects a scalar, got a {}", other.shape()))),
        },
        Arity::Flag => match operand {
            FilterInput::Scalar(value) => value
                .as_flag()
                .map(|flag| vec![Value::Bool(flag)])
                .ok_or_else(|| invalid(format!("expects true or false, got {value}"))),
            other => Err(invalid(format!("expects a boolean, got a {}", other.shape()))),
        },
        Arity::List => {
            let values = scalar_list(operand).map_err(invalid)?;
            if values.is_empty() {
                return Err(ValidationError::EmptyOperandList {
                    field: field.to_owned(),
                    operator: op.name().to_owned(),
                });
            }
            if values.len() > max_operands {
                return Err(invalid(format!(
                    "accepts at most {max_operands} values (got {})",
                    values.len()
                )));
            }
            if !op.accepts_null() && values.iter().any(|v| matches!(v, Value::Null)) {
                return Err(invalid("does not accept null".into()));
            }
            Ok(values)
        }
        Arity::Pair => {
            let values = scalar_list(operand).map_err(invalid)?;
            if values.len() != 2 {
                return Err(invalid(format!(
                    "expects exactly two values (got {})",
                    values.len()
                )));
            }
            if values.iter().any(|v| matches!(v, Value::Null)) {
                return Err(invalid("does not accept null".into()));
            }
            Ok(values)
        }
    }
}

/// Flattens a list operand; a lone string is split on commas.
fn scalar_list(operand: &FilterInput) -> Result<Vec<Value>, String> {
    match operand {
        FilterInput::Scalar(Value::String(raw)) => Ok(raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Value::from)
            .collect()),
        FilterInput::Scalar(value) => Ok(vec![value.clone()]),
        FilterInput::List(items) => items
            .iter()
            .map(|item| match item {
                FilterInput::Scalar(value) => Ok(value.clone()),
                other => Err(format!("expects a list of scalars, found a {}", other.shape())),
            })
            .collect(),
        FilterInput::Map(_) => Err("expects a list, got a map".into()),
    }
}
