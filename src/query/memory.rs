//! In-process filter backend evaluating predicates against JSON values.
//!
//! Used by the bundled [`MemoryStore`](crate::repository::memory::MemoryStore)
//! and by tests. Field lookups may yield several values (a path through a
//! to-many relationship); a comparison matches when any of them does, and a
//! missing field behaves like `null`.

use std::cmp::Ordering;

use serde_json::Value as Json;

use crate::query::{
    compiler::{handler_fn, FilterBackend, HandlerRegistry},
    errors::CompileError,
    operators::{BETWEEN, EQ, GT, GTE, IN, IS_NULL, LIKE, LT, LTE, NEQ, NIN},
    Value,
};

/// Ordering comparisons supported by [`MemoryPredicate::Compare`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Neq,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
}

/// Compiled predicate tree.
#[derive(Clone, Debug, PartialEq)]
pub enum MemoryPredicate {
    /// Ordering comparison against one operand.
    Compare {
        /// Dotted field path.
        field: String,
        /// Comparison.
        op: CompareOp,
        /// Operand.
        value: Value,
    },
    /// `%`/`_` pattern match on string values.
    Like {
        /// Dotted field path.
        field: String,
        /// Pattern.
        pattern: String,
    },
    /// Membership test; `negated` for `nin`.
    In {
        /// Dotted field path.
        field: String,
        /// Candidate operands.
        values: Vec<Value>,
        /// Inverts the result.
        negated: bool,
    },
    /// Inclusive range.
    Between {
        /// Dotted field path.
        field: String,
        /// Lower bound.
        low: Value,
        /// Upper bound.
        high: Value,
    },
    /// Null test.
    IsNull {
        /// Dotted field path.
        field: String,
        /// `true` to match null, `false` to match non-null.
        is_null: bool,
    },
    /// Every child matches; empty is `true`.
    All(Vec<MemoryPredicate>),
    /// Some child matches; empty is `false`.
    Any(Vec<MemoryPredicate>),
}

/// Resolves a dotted field path to the values it reaches.
pub type FieldLookup<'a> = dyn Fn(&str) -> Vec<Json> + 'a;

impl MemoryPredicate {
    /// Evaluates the predicate using `lookup` to read fields.
    pub fn matches(&self, lookup: &FieldLookup<'_>) -> bool {
        match self {
            MemoryPredicate::Compare { field, op, value } => {
                let found = field_values(lookup, field);
                match op {
                    CompareOp::Neq => !found.iter().any(|v| equals(v, value)),
                    CompareOp::Eq => found.iter().any(|v| equals(v, value)),
                    ordered => found.iter().any(|v| {
                        compare_operand(v, value).is_some_and(|ord| ordering_matches(*ordered, ord))
                    }),
                }
            }
            MemoryPredicate::Like { field, pattern } => field_values(lookup, field)
                .iter()
                .any(|v| v.as_str().is_some_and(|s| like_match(s, pattern))),
            MemoryPredicate::In {
                field,
                values,
                negated,
            } => {
                let found = field_values(lookup, field);
                let hit = found
                    .iter()
                    .any(|v| values.iter().any(|candidate| equals(v, candidate)));
                hit != *negated
            }
            MemoryPredicate::Between { field, low, high } => {
                field_values(lookup, field).iter().any(|v| {
                    matches!(compare_operand(v, low), Some(Ordering::Greater | Ordering::Equal))
                        && matches!(compare_operand(v, high), Some(Ordering::Less | Ordering::Equal))
                })
            }
            MemoryPredicate::IsNull { field, is_null } => {
                let all_null = field_values(lookup, field).iter().all(Json::is_null);
                all_null == *is_null
            }
            MemoryPredicate::All(children) => children.iter().all(|c| c.matches(lookup)),
            MemoryPredicate::Any(children) => children.iter().any(|c| c.matches(lookup)),
        }
    }
}

fn field_values(lookup: &FieldLookup<'_>, field: &str) -> Vec<Json> {
    let values = lookup(field);
    if values.is_empty() {
        vec![Json::Null]
    } else {
        values
    }
}

fn ordering_matches(op: CompareOp, ord: Ordering) -> bool {
    match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Neq => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Lte => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Gte => ord != Ordering::Less,
    }
}

fn equals(json: &Json, value: &Value) -> bool {
    compare_operand(json, value) == Some(Ordering::Equal)
}

/// Compares a stored JSON value with an operand.
///
/// Query-string operands arrive as strings, so numeric and boolean strings
/// are coerced to the stored value's type. Incomparable pairs yield `None`.
pub fn compare_operand(json: &Json, value: &Value) -> Option<Ordering> {
    match (json, value) {
        (Json::Null, Value::Null) => Some(Ordering::Equal),
        (Json::Null, _) | (_, Value::Null) => None,
        (Json::Bool(a), other) => other.as_flag().map(|b| a.cmp(&b)),
        (Json::Number(n), other) => {
            let left = n.as_f64()?;
            let right = other.as_f64()?;
            left.partial_cmp(&right)
        }
        (Json::String(s), Value::String(t)) => Some(s.as_str().cmp(t.as_str())),
        (Json::String(s), other) => {
            let left = s.trim().parse::<f64>().ok()?;
            left.partial_cmp(&other.as_f64()?)
        }
        _ => None,
    }
}

/// Total order over JSON values used for sorting.
///
/// Nulls sort first, then booleans, numbers and strings; composite values
/// sort last and compare equal to each other.
pub fn compare_json(left: &Json, right: &Json) -> Ordering {
    match (left, right) {
        (Json::Null, Json::Null) => Ordering::Equal,
        (Json::Bool(a), Json::Bool(b)) => a.cmp(b),
        (Json::Number(a), Json::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => {
                let a = a.as_f64().unwrap_or(f64::NAN);
                let b = b.as_f64().unwrap_or(f64::NAN);
                a.partial_cmp(&b)
                    .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
            }
        },
        (Json::String(a), Json::String(b)) => a.cmp(b),
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}

fn type_rank(value: &Json) -> u8 {
    match value {
        Json::Null => 0,
        Json::Bool(_) => 1,
        Json::Number(_) => 2,
        Json::String(_) => 3,
        Json::Array(_) => 4,
        Json::Object(_) => 5,
    }
}

/// SQL `LIKE` matching: `%` spans any run, `_` one character, `\` escapes.
///
/// Runs in `O(text × pattern)` by backtracking only to the most recent `%`.
pub fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let tokens = like_tokens(pattern);
    let (mut t, mut p) = (0, 0);
    let mut resume: Option<(usize, usize)> = None;
    while t < text.len() {
        match tokens.get(p) {
            Some(LikeToken::AnyRun) => {
                resume = Some((p, t));
                p += 1;
            }
            Some(LikeToken::AnyChar) => {
                t += 1;
                p += 1;
            }
            Some(LikeToken::Literal(ch)) if *ch == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match resume {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    resume = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    tokens[p..].iter().all(|token| *token == LikeToken::AnyRun)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LikeToken {
    AnyRun,
    AnyChar,
    Literal(char),
}

fn like_tokens(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        tokens.push(match ch {
            '%' => LikeToken::AnyRun,
            '_' => LikeToken::AnyChar,
            '\\' => LikeToken::Literal(chars.next().unwrap_or('\\')),
            other => LikeToken::Literal(other),
        });
    }
    tokens
}

/// Filter backend producing [`MemoryPredicate`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryBackend;

impl FilterBackend for MemoryBackend {
    type Predicate = MemoryPredicate;

    fn all(&self, children: Vec<MemoryPredicate>) -> MemoryPredicate {
        MemoryPredicate::All(children)
    }

    fn any(&self, children: Vec<MemoryPredicate>) -> MemoryPredicate {
        MemoryPredicate::Any(children)
    }
}

impl MemoryBackend {
    /// Default handlers for every built-in operator.
    pub fn handlers() -> HandlerRegistry<MemoryBackend> {
        let mut registry = HandlerRegistry::new();
        for (name, op) in [
            (EQ, CompareOp::Eq),
            (NEQ, CompareOp::Neq),
            (LT, CompareOp::Lt),
            (LTE, CompareOp::Lte),
            (GT, CompareOp::Gt),
            (GTE, CompareOp::Gte),
        ] {
            registry = registry.with_default(
                name,
                handler_fn(move |_: &MemoryBackend, field: &str, operator: &str, values: &[Value]| {
                    let value = single(field, operator, values)?;
                    Ok(MemoryPredicate::Compare {
                        field: field.to_owned(),
                        op,
                        value: value.clone(),
                    })
                }),
            );
        }
        registry
            .with_default(
                LIKE,
                handler_fn(|_: &MemoryBackend, field: &str, operator: &str, values: &[Value]| {
                    let pattern = single(field, operator, values)?
                        .as_str()
                        .ok_or_else(|| invalid(field, operator, "pattern must be a string"))?;
                    Ok(MemoryPredicate::Like {
                        field: field.to_owned(),
                        pattern: pattern.to_owned(),
                    })
                }),
            )
            .with_default(IN, handler_fn(membership(false)))
            .with_default(NIN, handler_fn(membership(true)))
            .with_default(
                BETWEEN,
                handler_fn(|_: &MemoryBackend, field: &str, operator: &str, values: &[Value]| {
                    match values {
                        [low, high] => Ok(MemoryPredicate::Between {
                            field: field.to_owned(),
                            low: low.clone(),
                            high: high.clone(),
                        }),
                        _ => Err(invalid(field, operator, "expects exactly two bounds")),
                    }
                }),
            )
            .with_default(
                IS_NULL,
                handler_fn(|_: &MemoryBackend, field: &str, operator: &str, values: &[Value]| {
                    let is_null = single(field, operator, values)?
                        .as_flag()
                        .ok_or_else(|| invalid(field, operator, "expects a boolean"))?;
                    Ok(MemoryPredicate::IsNull {
                        field: field.to_owned(),
                        is_null,
                    })
                }),
            )
    }
}

fn membership(
    negated: bool,
) -> impl Fn(&MemoryBackend, &str, &str, &[Value]) -> Result<MemoryPredicate, CompileError>
       + Send
       + Sync
       + 'static {
    move |_: &MemoryBackend, field: &str, operator: &str, values: &[Value]| {
        if values.is_empty() {
            return Err(invalid(field, operator, "expects at least one value"));
        }
        Ok(MemoryPredicate::In {
            field: field.to_owned(),
            values: values.to_vec(),
            negated,
        })
    }
}

fn single<'v>(field: &str, operator: &str, values: &'v [Value]) -> Result<&'v Value, CompileError> {
    match values {
        [value] => Ok(value),
        _ => Err(invalid(field, operator, "expects exactly one value")),
    }
}

fn invalid(field: &str, operator: &str, reason: &str) -> CompileError {
    CompileError::InvalidOperand {
        field: field.to_owned(),
        operator: operator.to_owned(),
        reason: reason.to_owned(),
    }
}
