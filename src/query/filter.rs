//! Filter expression parser: nested parameter maps → [`FilterNode`].
//!
//! Rules, applied per map level:
//! - `and` / `or` keys take a list of sub-filter maps.
//! - Any other key is a field. A scalar value means `eq`, a list means `in`,
//!   a map of operator names means explicit operators, and a map without any
//!   operator names opens a nested field scope (`author.name`). Whether such
//!   a scope really names a relationship is settled against metadata by
//!   [`validate_filter_fields`].
//! - Sibling entries combine into a conjunction.
//!
//! Every problem found is collected; the parser never stops at the first one.

use std::collections::BTreeMap;

use tracing::trace;

use crate::query::{
    ast::FilterNode,
    errors::{ValidationError, ValidationErrors},
    metadata::{ResourceMetadata, ID_FIELD},
    operators::{OperatorRegistry, EQ, IN, IS_NULL, MAX_LIST_OPERANDS},
    FilterInput, Value,
};

/// Group key combining sub-filters with AND.
pub const AND: &str = "and";
/// Group key combining sub-filters with OR.
pub const OR: &str = "or";

/// Parses filter maps using a shared operator registry.
#[derive(Clone, Copy, Debug)]
pub struct FilterParser<'r> {
    operators: &'r OperatorRegistry,
    max_operands: usize,
}

impl<'r> FilterParser<'r> {
    /// Creates a parser bound to `operators`.
    pub fn new(operators: &'r OperatorRegistry) -> Self {
        Self {
            operators,
            max_operands: MAX_LIST_OPERANDS,
        }
    }

    /// Overrides the per-comparison list operand ceiling.
    pub fn with_max_operands(mut self, max: usize) -> Self {
        self.max_operands = max;
        self
    }

    /// Parses `input` into a single node, or `None` for an empty filter.
    pub fn parse(&self, input: &FilterInput) -> Result<Option<FilterNode>, ValidationErrors> {
        let mut errors = Vec::new();
        let node = match input {
            FilterInput::Map(map) => FilterNode::all(self.parse_scope(map, None, &mut errors)),
            other => {
                errors.push(ValidationError::MalformedParameter {
                    parameter: "filter".into(),
                    reason: format!("expects an object of field filters, got a {}", other.shape()),
                });
                None
            }
        };
        match ValidationErrors::from_vec(errors) {
            Some(errors) => Err(errors),
            None => {
                trace!(filter = ?node, "parsed filter");
                Ok(node)
            }
        }
    }

    fn parse_scope(
        &self,
        map: &BTreeMap<String, FilterInput>,
        prefix: Option<&str>,
        errors: &mut Vec<ValidationError>,
    ) -> Vec<FilterNode> {
        let mut nodes = Vec::with_capacity(map.len());
        for (key, value) in map {
            let node = match key.as_str() {
                AND | OR => self.parse_group(key, value, prefix, errors),
                "" => {
                    errors.push(ValidationError::MalformedParameter {
                        parameter: bracket_param(prefix, ""),
                        reason: "field name is empty".into(),
                    });
                    None
                }
                field => {
                    let path = join_path(prefix, field);
                    self.parse_field(&path, value, errors)
                }
            };
            nodes.extend(node);
        }
        nodes
    }

    fn parse_group(
        &self,
        group: &str,
        value: &FilterInput,
        prefix: Option<&str>,
        errors: &mut Vec<ValidationError>,
    ) -> Option<FilterNode> {
        let items: Vec<&FilterInput> = match value {
            FilterInput::List(items) => items.iter().collect(),
            FilterInput::Map(_) => vec![value],
            FilterInput::Scalar(_) => {
                errors.push(ValidationError::MalformedParameter {
                    parameter: bracket_param(prefix, group),
                    reason: "expects a list of filter objects".into(),
                });
                return None;
            }
        };
        let mut children = Vec::with_capacity(items.len());
        for item in items {
            match item {
                FilterInput::Map(sub) => {
                    children.extend(FilterNode::all(self.parse_scope(sub, prefix, errors)));
                }
                other => errors.push(ValidationError::MalformedParameter {
                    parameter: bracket_param(prefix, group),
                    reason: format!("expects filter objects, found a {}", other.shape()),
                }),
            }
        }
        let combined = if group == OR {
            FilterNode::any(children)
        } else {
            FilterNode::all(children)
        };
        if combined.is_none() {
            errors.push(ValidationError::EmptyFilterGroup {
                group: group.to_owned(),
            });
        }
        combined
    }

    fn parse_field(
        &self,
        path: &str,
        value: &FilterInput,
        errors: &mut Vec<ValidationError>,
    ) -> Option<FilterNode> {
        match value {
            FilterInput::Scalar(_) => self.parse_operator(path, EQ, value, errors),
            FilterInput::List(_) => self.parse_operator(path, IN, value, errors),
            FilterInput::Map(ops) if ops.is_empty() => {
                errors.push(ValidationError::MalformedParameter {
                    parameter: bracket_param(None, path),
                    reason: "has no operators".into(),
                });
                None
            }
            FilterInput::Map(ops) => {
                let known = ops
                    .keys()
                    .filter(|name| self.operators.contains(name))
                    .count();
                if known == 0 {
                    let nested = self.parse_scope(ops, Some(path), errors);
                    return FilterNode::all(nested);
                }
                let mut nodes = Vec::with_capacity(ops.len());
                for (name, operand) in ops {
                    nodes.extend(self.parse_operator(path, name, operand, errors));
                }
                FilterNode::all(nodes)
            }
        }
    }

    fn parse_operator(
        &self,
        path: &str,
        name: &str,
        operand: &FilterInput,
        errors: &mut Vec<ValidationError>,
    ) -> Option<FilterNode> {
        let Some(operator) = self.operators.get(name) else {
            errors.push(ValidationError::UnknownOperator {
                field: path.to_owned(),
                operator: name.to_owned(),
            });
            return None;
        };
        match operator.normalize(path, operand, self.max_operands) {
            Ok(values) if name == IS_NULL => {
                let is_null = matches!(values.first(), Some(Value::Bool(true)));
                Some(FilterNode::NullCheck {
                    field: path.to_owned(),
                    is_null,
                })
            }
            Ok(values) => Some(FilterNode::comparison(path, name, values)),
            Err(err) => {
                errors.push(err);
                None
            }
        }
    }
}

/// Parses `input` with a default-configured parser.
pub fn parse_filter(
    input: &FilterInput,
    operators: &OperatorRegistry,
) -> Result<Option<FilterNode>, ValidationErrors> {
    FilterParser::new(operators).parse(input)
}

/// Checks every field path in `node` against `resource_type`'s metadata.
///
/// Prefix segments must be relationships; the final segment must be an
/// attribute of the reached type or `id`. A segment that follows an
/// attribute was written as an operator the registry does not know, so it
/// is reported as [`ValidationError::UnknownOperator`].
pub fn validate_filter_fields(
    node: &FilterNode,
    resource_type: &str,
    metadata: &dyn ResourceMetadata,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = Vec::new();
    for field in node.fields() {
        if seen.contains(&field) {
            continue;
        }
        seen.push(field);
        match resolve_field(field, resource_type, metadata) {
            FieldResolution::Attribute => {}
            FieldResolution::OperatorAfterAttribute { attribute, operator } => {
                errors.push(ValidationError::UnknownOperator {
                    field: attribute.to_owned(),
                    operator: operator.to_owned(),
                });
            }
            FieldResolution::Unknown => errors.push(ValidationError::UnknownFilterField {
                resource_type: resource_type.to_owned(),
                field: field.to_owned(),
            }),
        }
    }
    errors
}

enum FieldResolution<'f> {
    Attribute,
    OperatorAfterAttribute { attribute: &'f str, operator: &'f str },
    Unknown,
}

fn resolve_field<'f>(
    field: &'f str,
    resource_type: &str,
    metadata: &dyn ResourceMetadata,
) -> FieldResolution<'f> {
    let mut current = resource_type.to_owned();
    let mut offset = 0;
    let mut segments = field.split('.').peekable();
    while let Some(segment) = segments.next() {
        offset += segment.len();
        let is_attribute = segment == ID_FIELD || metadata.has_attribute(&current, segment);
        match segments.peek() {
            None if is_attribute => return FieldResolution::Attribute,
            None => return FieldResolution::Unknown,
            Some(&next) if is_attribute => {
                return FieldResolution::OperatorAfterAttribute {
                    attribute: &field[..offset],
                    operator: next,
                };
            }
            Some(_) => {}
        }
        match metadata.relationship(&current, segment) {
            Some(rel) => current = rel.target.clone(),
            None => return FieldResolution::Unknown,
        }
        offset += 1;
    }
    FieldResolution::Unknown
}

fn join_path(prefix: Option<&str>, field: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}.{field}"),
        None => field.to_owned(),
    }
}

fn bracket_param(prefix: Option<&str>, key: &str) -> String {
    let mut out = String::from("filter");
    for segment in prefix.into_iter().flat_map(|p| p.split('.')) {
        out.push('[');
        out.push_str(segment);
        out.push(']');
    }
    for segment in key.split('.') {
        out.push('[');
        out.push_str(segment);
        out.push(']');
    }
    out
}
