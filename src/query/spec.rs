//! Resolved, immutable query specification and its parts.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use smallvec::SmallVec;

use crate::query::ast::FilterNode;

/// One validated sort key.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SortKey {
    /// Attribute name or `id`.
    pub field: String,
    /// `true` for descending order.
    pub descending: bool,
}

impl SortKey {
    /// Ascending key.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Descending key.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "-{}", self.field)
        } else {
            write!(f, "{}", self.field)
        }
    }
}

/// Page number/size after clamping.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct PageDescriptor {
    /// 1-based page number.
    pub number: u64,
    /// Items per page, within `[1, max_size]`.
    pub size: u64,
}

impl PageDescriptor {
    /// Zero-based offset of the first item on the page.
    pub fn offset(&self) -> u64 {
        (self.number - 1).saturating_mul(self.size)
    }

    /// Number of pages needed for `total` items (at least one).
    pub fn last_page(&self, total: u64) -> u64 {
        total.div_ceil(self.size).max(1)
    }
}

/// Requested attribute subsets per resource type.
///
/// A type without an entry selects all of its attributes.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldSelection {
    by_type: BTreeMap<String, BTreeSet<String>>,
}

impl FieldSelection {
    /// Records the selection for `resource_type`.
    pub fn insert(&mut self, resource_type: impl Into<String>, fields: BTreeSet<String>) {
        self.by_type.insert(resource_type.into(), fields);
    }

    /// Selected fields for `resource_type`, or `None` for "all".
    pub fn get(&self, resource_type: &str) -> Option<&BTreeSet<String>> {
        self.by_type.get(resource_type)
    }

    /// Returns `true` if `field` of `resource_type` should be serialized.
    pub fn allows(&self, resource_type: &str, field: &str) -> bool {
        self.get(resource_type)
            .map_or(true, |fields| fields.contains(field))
    }

    /// Total number of explicitly requested fields.
    pub fn total_fields(&self) -> usize {
        self.by_type.values().map(BTreeSet::len).sum()
    }

    /// Returns `true` if no type has an explicit selection.
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// Iterates `(type, fields)` pairs in type order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.by_type.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Ordered relationship chain, e.g. `author.affiliation`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct IncludePath {
    segments: SmallVec<[String; 4]>,
}

impl IncludePath {
    /// Splits a dot-separated include string.
    pub fn parse(raw: &str) -> Self {
        Self {
            segments: raw.split('.').map(str::to_owned).collect(),
        }
    }

    /// Relationship names in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for IncludePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl<S: Into<String>> FromIterator<S> for IncludePath {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            segments: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Trie of validated include paths keyed by relationship name.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct IncludeTree {
    children: BTreeMap<String, IncludeTree>,
}

impl IncludeTree {
    /// Empty tree (no includes).
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `path` into the trie.
    pub fn insert(&mut self, path: &IncludePath) {
        let mut node = self;
        for segment in path.segments() {
            node = node.children.entry(segment.clone()).or_default();
        }
    }

    /// Subtree for relationship `name`, if requested at this level.
    pub fn child(&self, name: &str) -> Option<&IncludeTree> {
        self.children.get(name)
    }

    /// Relationship names requested at this level with their subtrees.
    pub fn children(&self) -> impl Iterator<Item = (&str, &IncludeTree)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns `true` if nothing is requested at this level.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns `true` if `name` is requested at this level.
    pub fn contains(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    /// Root-to-leaf paths stored in the trie.
    pub fn leaf_paths(&self) -> Vec<IncludePath> {
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        self.collect_leaves(&mut prefix, &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: &mut Vec<&'a str>, out: &mut Vec<IncludePath>) {
        for (name, child) in &self.children {
            prefix.push(name);
            if child.is_empty() {
                out.push(prefix.iter().copied().collect());
            } else {
                child.collect_leaves(prefix, out);
            }
            prefix.pop();
        }
    }

    /// Maximum depth of any stored path.
    pub fn depth(&self) -> usize {
        self.children
            .values()
            .map(|child| 1 + child.depth())
            .max()
            .unwrap_or(0)
    }
}

/// Weighted complexity breakdown computed by the limits enforcer.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ComplexityScore {
    /// Include contribution.
    pub includes: usize,
    /// Sparse fieldset contribution.
    pub fields: usize,
    /// Filter contribution.
    pub filter: usize,
    /// Sum of all contributions.
    pub total: usize,
}

/// Immutable outcome of resolving one request's query parameters.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuerySpecification {
    /// Primary resource type.
    pub resource_type: String,
    /// Parsed filter, `None` when unfiltered.
    pub filter: Option<FilterNode>,
    /// Validated sort keys in priority order.
    pub sort: Vec<SortKey>,
    /// Clamped page descriptor.
    pub page: PageDescriptor,
    /// Sparse fieldsets.
    pub fields: FieldSelection,
    /// Merged include paths.
    pub include: IncludeTree,
    /// Complexity breakdown that passed the budget.
    pub complexity: ComplexityScore,
}
