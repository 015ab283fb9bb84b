//! Filter abstract syntax tree.
//!
//! The parser in [`crate::query::filter`] produces a single [`FilterNode`]
//! tree per request. Nodes are immutable once built; backends consume them
//! through [`crate::query::compiler::FilterCompiler`].

use std::fmt;

use serde::Serialize;

use crate::query::Value;

/// Comparison leaf: `field <operator> values`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Comparison {
    /// Dot-separated field path (`title`, `author.name`).
    pub field: String,
    /// Registered operator name (`eq`, `in`, `between`, ...).
    pub operator: String,
    /// Normalized operand list; arity is guaranteed by the operator.
    pub values: Vec<Value>,
}

/// Parsed filter expression.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterNode {
    /// Single field comparison.
    Comparison(Comparison),
    /// All children must match.
    Conjunction {
        /// Child expressions.
        children: Vec<FilterNode>,
    },
    /// At least one child must match.
    Disjunction {
        /// Child expressions.
        children: Vec<FilterNode>,
    },
    /// `IS NULL` / `IS NOT NULL` test.
    NullCheck {
        /// Dot-separated field path.
        field: String,
        /// `true` for `IS NULL`.
        is_null: bool,
    },
}

impl FilterNode {
    /// Builds a comparison node.
    pub fn comparison(
        field: impl Into<String>,
        operator: impl Into<String>,
        values: Vec<Value>,
    ) -> Self {
        FilterNode::Comparison(Comparison {
            field: field.into(),
            operator: operator.into(),
            values,
        })
    }

    /// Combines `children` into a conjunction, collapsing the single-child case.
    pub fn all(mut children: Vec<FilterNode>) -> Option<Self> {
        match children.len() {
            0 => None,
            1 => children.pop(),
            _ => Some(FilterNode::Conjunction { children }),
        }
    }

    /// Combines `children` into a disjunction, collapsing the single-child case.
    pub fn any(mut children: Vec<FilterNode>) -> Option<Self> {
        match children.len() {
            0 => None,
            1 => children.pop(),
            _ => Some(FilterNode::Disjunction { children }),
        }
    }

    /// Total number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        match self {
            FilterNode::Comparison(_) | FilterNode::NullCheck { .. } => 1,
            FilterNode::Conjunction { children } | FilterNode::Disjunction { children } => {
                1 + children.iter().map(FilterNode::node_count).sum::<usize>()
            }
        }
    }

    /// Depth of the tree; a lone leaf has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            FilterNode::Comparison(_) | FilterNode::NullCheck { .. } => 1,
            FilterNode::Conjunction { children } | FilterNode::Disjunction { children } => {
                1 + children.iter().map(FilterNode::depth).max().unwrap_or(0)
            }
        }
    }

    /// Visits every field path referenced by the tree.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FilterNode::Comparison(cmp) => out.push(&cmp.field),
            FilterNode::NullCheck { field, .. } => out.push(field),
            FilterNode::Conjunction { children } | FilterNode::Disjunction { children } => {
                for child in children {
                    child.collect_fields(out);
                }
            }
        }
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterNode::Comparison(cmp) => {
                write!(f, "{} {} ", cmp.field, cmp.operator)?;
                match cmp.values.as_slice() {
                    [single] => write!(f, "{single}"),
                    values => {
                        write!(f, "[")?;
                        for (idx, value) in values.iter().enumerate() {
                            if idx > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{value}")?;
                        }
                        write!(f, "]")
                    }
                }
            }
            FilterNode::NullCheck { field, is_null } => {
                if *is_null {
                    write!(f, "{field} is null")
                } else {
                    write!(f, "{field} is not null")
                }
            }
            FilterNode::Conjunction { children } => write_group(f, "AND", children),
            FilterNode::Disjunction { children } => write_group(f, "OR", children),
        }
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, joiner: &str, children: &[FilterNode]) -> fmt::Result {
    write!(f, "(")?;
    for (idx, child) in children.iter().enumerate() {
        if idx > 0 {
            write!(f, " {joiner} ")?;
        }
        write!(f, "{child}")?;
    }
    write!(f, ")")
}
