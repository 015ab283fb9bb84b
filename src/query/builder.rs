//! Query specification builder.
//!
//! Orchestrates the resolvers in a fixed order. Fields, sort, pagination and
//! includes are validated independently and their errors reported together;
//! the filter is checked only once those pass, and the complexity budget
//! last, so a budget rejection never hides a validation problem.

use tracing::debug;

use crate::config::QueryConfig;
use crate::query::{
    errors::{QueryError, ValidationError, ValidationErrors},
    fields::FieldsResolver,
    filter::{validate_filter_fields, FilterParser},
    include::IncludeResolver,
    limits::LimitsEnforcer,
    metadata::ResourceMetadata,
    operators::OperatorRegistry,
    pagination::resolve_page,
    params::QueryParams,
    sort::SortResolver,
    spec::QuerySpecification,
};

/// Builds immutable [`QuerySpecification`]s from raw parameters.
///
/// Holds only shared, read-only references, so one builder can serve
/// concurrent requests.
#[derive(Clone, Copy)]
pub struct QuerySpecBuilder<'a> {
    metadata: &'a dyn ResourceMetadata,
    operators: &'a OperatorRegistry,
    config: &'a QueryConfig,
}

impl<'a> QuerySpecBuilder<'a> {
    /// Creates a builder over the long-lived registries.
    pub fn new(
        metadata: &'a dyn ResourceMetadata,
        operators: &'a OperatorRegistry,
        config: &'a QueryConfig,
    ) -> Self {
        Self {
            metadata,
            operators,
            config,
        }
    }

    /// Decodes `query` and builds the specification for `resource_type`.
    pub fn build_from_query_string(
        &self,
        resource_type: &str,
        query: &str,
    ) -> Result<QuerySpecification, QueryError> {
        self.build(resource_type, &QueryParams::from_query_string(query))
    }

    /// Resolves `params` for a request against `resource_type`.
    pub fn build(
        &self,
        resource_type: &str,
        params: &QueryParams,
    ) -> Result<QuerySpecification, QueryError> {
        if !self.metadata.has_type(resource_type) {
            return Err(ValidationError::UnknownResourceType {
                resource_type: resource_type.to_owned(),
            }
            .into());
        }
        let limits = &self.config.limits;
        let mut errors: Vec<ValidationError> = params.parse_errors.clone();

        let fields = FieldsResolver::new(self.metadata, limits.fields_max_total)
            .resolve(&params.fields)
            .map_err(|e| errors.extend(e.into_vec()))
            .ok();
        let sort = SortResolver::new(self.metadata, &self.config.sort)
            .resolve(resource_type, &params.sort)
            .map_err(|e| errors.extend(e.into_vec()))
            .ok();
        let page = resolve_page(&params.page, &self.config.pagination)
            .map_err(|e| errors.push(e))
            .ok();
        let include = IncludeResolver::from_limits(self.metadata, limits)
            .resolve(resource_type, &params.include)
            .map_err(|e| errors.extend(e.into_vec()))
            .ok();

        let (Some(fields), Some(sort), Some(page), Some(include)) = (fields, sort, page, include)
        else {
            return Err(collected(errors));
        };
        if !errors.is_empty() {
            return Err(collected(errors));
        }

        let filter = FilterParser::new(self.operators)
            .with_max_operands(limits.filter_max_operands)
            .parse(&params.filter)?;
        if let Some(node) = &filter {
            let mut filter_errors = validate_filter_fields(node, resource_type, self.metadata);
            let depth = node.depth();
            if depth > limits.filter_max_depth {
                filter_errors.push(ValidationError::FilterTooDeep {
                    depth,
                    max: limits.filter_max_depth,
                });
            }
            if !filter_errors.is_empty() {
                return Err(collected(filter_errors));
            }
        }

        let enforcer = LimitsEnforcer::new(limits);
        let complexity = enforcer.score(&include, &fields, filter.as_ref());
        enforcer.enforce(&complexity)?;

        let spec = QuerySpecification {
            resource_type: resource_type.to_owned(),
            filter,
            sort,
            page,
            fields,
            include,
            complexity,
        };
        debug!(
            resource_type,
            sort = spec.sort.len(),
            page = spec.page.number,
            size = spec.page.size,
            includes = spec.include.leaf_paths().len(),
            complexity = spec.complexity.total,
            "built query specification"
        );
        Ok(spec)
    }
}

fn collected(errors: Vec<ValidationError>) -> QueryError {
    match ValidationErrors::from_vec(errors) {
        Some(errors) => QueryError::Validation(errors),
        None => QueryError::Validation(
            ValidationError::MalformedParameter {
                parameter: "query".into(),
                reason: "rejected without a specific error".into(),
            }
            .into(),
        ),
    }
}
