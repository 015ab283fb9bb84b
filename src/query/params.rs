//! Raw JSON:API query parameters and the query-string decoder.
//!
//! [`QueryParams`] is the unvalidated request surface handed to the
//! [`QuerySpecBuilder`](crate::query::builder::QuerySpecBuilder). It can be
//! built programmatically or decoded from a URL query string, in which case
//! decoding problems are kept in `parse_errors` and reported together with
//! the builder's own validation errors.

use std::collections::BTreeMap;

use tracing::debug;

use crate::query::{errors::ValidationError, FilterInput, Value};

/// One requested sort entry before whitelist validation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SortRequest {
    /// Requested field.
    pub field: String,
    /// `true` when prefixed with `-`.
    pub descending: bool,
}

impl SortRequest {
    /// Parses a single `sort` entry such as `-year`.
    pub fn parse(entry: &str) -> Result<Self, ValidationError> {
        let entry = entry.trim();
        let (field, descending) = match entry.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (entry, false),
        };
        if field.is_empty() {
            return Err(ValidationError::EmptySortField);
        }
        Ok(Self {
            field: field.to_owned(),
            descending,
        })
    }
}

/// Raw `page[number]` / `page[size]` values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PageParams {
    /// Requested page number, if any.
    pub number: Option<i64>,
    /// Requested page size, if any.
    pub size: Option<i64>,
}

/// Unvalidated query parameters of one request.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryParams {
    /// `filter[...]` tree.
    pub filter: FilterInput,
    /// `sort` entries in request order.
    pub sort: Vec<SortRequest>,
    /// `page[...]` values.
    pub page: PageParams,
    /// `fields[type]` lists.
    pub fields: BTreeMap<String, Vec<String>>,
    /// `include` entries, unsplit.
    pub include: Vec<String>,
    /// Problems found while decoding a query string.
    pub parse_errors: Vec<ValidationError>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            filter: FilterInput::empty(),
            sort: Vec::new(),
            page: PageParams::default(),
            fields: BTreeMap::new(),
            include: Vec::new(),
            parse_errors: Vec::new(),
        }
    }
}

impl QueryParams {
    /// Empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the filter tree.
    pub fn with_filter(mut self, filter: impl Into<FilterInput>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Appends entries from a `sort` value such as `-year,title`.
    pub fn with_sort(mut self, raw: &str) -> Self {
        self.push_sort(raw);
        self
    }

    /// Sets the requested page number.
    pub fn with_page_number(mut self, number: i64) -> Self {
        self.page.number = Some(number);
        self
    }

    /// Sets the requested page size.
    pub fn with_page_size(mut self, size: i64) -> Self {
        self.page.size = Some(size);
        self
    }

    /// Sets the sparse fieldset for `resource_type`.
    pub fn with_fields<I, S>(mut self, resource_type: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.insert(
            resource_type.into(),
            fields.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Appends entries from an `include` value such as `author,tags`.
    pub fn with_include(mut self, raw: &str) -> Self {
        self.push_include(raw);
        self
    }

    /// Decodes a URL query string (leading `?` optional).
    ///
    /// Never fails: undecodable parameters are recorded in `parse_errors`.
    pub fn from_query_string(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = QueryParams::new();
        let mut filter = BTreeMap::new();
        let mut saw_filter = false;

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let Some((family, segments)) = split_key(&key) else {
                params.parse_errors.push(ValidationError::MalformedParameter {
                    parameter: key.to_string(),
                    reason: "unbalanced brackets".into(),
                });
                continue;
            };
            match (family, segments.as_slice()) {
                ("filter", []) => params.parse_errors.push(ValidationError::MalformedParameter {
                    parameter: "filter".into(),
                    reason: "expects filter[field]=value".into(),
                }),
                ("filter", path) => {
                    saw_filter = true;
                    if let Err(reason) = insert_raw(&mut filter, path, &value) {
                        params.parse_errors.push(ValidationError::MalformedParameter {
                            parameter: key.to_string(),
                            reason,
                        });
                    }
                }
                ("sort", []) => params.push_sort(&value),
                ("page", [name]) if name == "number" || name == "size" => {
                    match value.trim().parse::<i64>() {
                        Ok(n) if name == "number" => params.page.number = Some(n),
                        Ok(n) => params.page.size = Some(n),
                        Err(_) => params.parse_errors.push(ValidationError::MalformedParameter {
                            parameter: format!("page[{name}]"),
                            reason: format!("expects an integer, got '{value}'"),
                        }),
                    }
                }
                ("page", _) => params.parse_errors.push(ValidationError::MalformedParameter {
                    parameter: key.to_string(),
                    reason: "only page[number] and page[size] are supported".into(),
                }),
                ("fields", [resource_type]) => {
                    let entry = params.fields.entry(resource_type.clone()).or_default();
                    entry.extend(split_list(&value));
                }
                ("fields", _) => params.parse_errors.push(ValidationError::MalformedParameter {
                    parameter: key.to_string(),
                    reason: "expects fields[type]=a,b".into(),
                }),
                ("include", []) => params.push_include(&value),
                (family, _) => {
                    debug!(parameter = %key, family, "ignoring unrecognized query parameter");
                }
            }
        }

        if saw_filter {
            params.filter = raw_to_input(filter);
        }
        params
    }

    fn push_sort(&mut self, raw: &str) {
        for entry in raw.split(',') {
            match SortRequest::parse(entry) {
                Ok(request) => self.sort.push(request),
                Err(err) => self.parse_errors.push(err),
            }
        }
    }

    fn push_include(&mut self, raw: &str) {
        if raw.trim().is_empty() {
            return;
        }
        self.include
            .extend(raw.split(',').map(|entry| entry.trim().to_owned()));
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Splits `family[a][b]` into `("family", ["a", "b"])`.
fn split_key(key: &str) -> Option<(&str, Vec<String>)> {
    let Some(open) = key.find('[') else {
        return Some((key, Vec::new()));
    };
    let family = &key[..open];
    let mut rest = &key[open..];
    let mut segments = Vec::new();
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        let segment = &inner[..close];
        if segment.contains('[') {
            return None;
        }
        segments.push(segment.to_owned());
        rest = &inner[close + 1..];
    }
    Some((family, segments))
}

#[derive(Debug)]
enum RawNode {
    Leaf(String),
    Branch(BTreeMap<String, RawNode>),
}

fn insert_raw(
    branch: &mut BTreeMap<String, RawNode>,
    path: &[String],
    value: &str,
) -> Result<(), String> {
    let Some((head, tail)) = path.split_first() else {
        return Ok(());
    };
    let key = if head.is_empty() {
        branch.len().to_string()
    } else {
        head.clone()
    };
    if tail.is_empty() {
        if matches!(branch.get(&key), Some(RawNode::Branch(_))) {
            return Err(format!("'{key}' is used both as a value and as a nested filter"));
        }
        branch.insert(key, RawNode::Leaf(value.to_owned()));
        return Ok(());
    }
    let child = branch
        .entry(key.clone())
        .or_insert_with(|| RawNode::Branch(BTreeMap::new()));
    match child {
        RawNode::Branch(next) => insert_raw(next, tail, value),
        RawNode::Leaf(_) => Err(format!(
            "'{key}' is used both as a value and as a nested filter"
        )),
    }
}

fn raw_to_input(branch: BTreeMap<String, RawNode>) -> FilterInput {
    let sequential = !branch.is_empty() && branch.keys().all(|k| k.parse::<usize>().is_ok());
    if sequential {
        let mut items: Vec<(usize, RawNode)> = branch
            .into_iter()
            .filter_map(|(k, v)| k.parse::<usize>().ok().map(|idx| (idx, v)))
            .collect();
        items.sort_by_key(|(idx, _)| *idx);
        return FilterInput::List(items.into_iter().map(|(_, v)| raw_node_to_input(v)).collect());
    }
    FilterInput::Map(
        branch
            .into_iter()
            .map(|(k, v)| (k, raw_node_to_input(v)))
            .collect(),
    )
}

fn raw_node_to_input(node: RawNode) -> FilterInput {
    match node {
        RawNode::Leaf(value) => FilterInput::Scalar(Value::String(value)),
        RawNode::Branch(branch) => raw_to_input(branch),
    }
}
