//! Sparse-fieldset resolver.

use std::collections::{BTreeMap, BTreeSet};

use crate::query::{
    errors::{ValidationError, ValidationErrors},
    metadata::ResourceMetadata,
    spec::FieldSelection,
};

/// Validates `fields[type]` requests against metadata.
pub struct FieldsResolver<'a> {
    metadata: &'a dyn ResourceMetadata,
    max_total: usize,
}

impl<'a> FieldsResolver<'a> {
    /// Creates a resolver allowing at most `max_total` fields across types.
    pub fn new(metadata: &'a dyn ResourceMetadata, max_total: usize) -> Self {
        Self {
            metadata,
            max_total,
        }
    }

    /// Resolves requested fieldsets. Names may be attributes or relationships.
    pub fn resolve(
        &self,
        requested: &BTreeMap<String, Vec<String>>,
    ) -> Result<FieldSelection, ValidationErrors> {
        let mut errors = Vec::new();
        let mut selection = FieldSelection::default();
        for (resource_type, names) in requested {
            if !self.metadata.has_type(resource_type) {
                errors.push(ValidationError::MalformedParameter {
                    parameter: format!("fields[{resource_type}]"),
                    reason: format!("unknown resource type '{resource_type}'"),
                });
                continue;
            }
            let mut fields = BTreeSet::new();
            for name in names {
                let known = self.metadata.has_attribute(resource_type, name)
                    || self.metadata.relationship(resource_type, name).is_some();
                if known {
                    fields.insert(name.clone());
                } else {
                    errors.push(ValidationError::UnknownField {
                        resource_type: resource_type.clone(),
                        field: name.clone(),
                    });
                }
            }
            selection.insert(resource_type.clone(), fields);
        }
        let total = selection.total_fields();
        if total > self.max_total {
            errors.push(ValidationError::TooManyFields {
                count: total,
                max: self.max_total,
            });
        }
        match ValidationErrors::from_vec(errors) {
            Some(errors) => Err(errors),
            None => Ok(selection),
        }
    }
}
