//! Sort resolver: requested sort entries → whitelisted [`SortKey`]s.

use crate::config::SortConfig;
use crate::query::{
    errors::{ValidationError, ValidationErrors},
    metadata::{ResourceMetadata, ID_FIELD},
    params::SortRequest,
    spec::SortKey,
};

/// Validates sort requests against per-type allow-lists.
pub struct SortResolver<'a> {
    metadata: &'a dyn ResourceMetadata,
    config: &'a SortConfig,
}

impl<'a> SortResolver<'a> {
    /// Creates a resolver over `metadata` and the configured allow-lists.
    pub fn new(metadata: &'a dyn ResourceMetadata, config: &'a SortConfig) -> Self {
        Self { metadata, config }
    }

    /// Returns `true` if `field` may be used to sort `resource_type`.
    pub fn is_sortable(&self, resource_type: &str, field: &str) -> bool {
        match self.config.whitelist_per_type.get(resource_type) {
            Some(allowed) => allowed.iter().any(|f| f == field),
            None => field == ID_FIELD || self.metadata.has_attribute(resource_type, field),
        }
    }

    /// Resolves `requests` in priority order.
    ///
    /// A field requested twice keeps only its last occurrence, at that
    /// occurrence's position.
    pub fn resolve(
        &self,
        resource_type: &str,
        requests: &[SortRequest],
    ) -> Result<Vec<SortKey>, ValidationErrors> {
        let mut errors = Vec::new();
        let mut keys: Vec<SortKey> = Vec::with_capacity(requests.len());
        for request in requests {
            if !self.is_sortable(resource_type, &request.field) {
                errors.push(ValidationError::UnsupportedSortField {
                    resource_type: resource_type.to_owned(),
                    field: request.field.clone(),
                });
                continue;
            }
            keys.retain(|key| key.field != request.field);
            keys.push(SortKey {
                field: request.field.clone(),
                descending: request.descending,
            });
        }
        match ValidationErrors::from_vec(errors) {
            Some(errors) => Err(errors),
            None => Ok(keys),
        }
    }
}
