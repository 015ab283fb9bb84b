//! Include-path resolver: `include` entries → validated [`IncludeTree`].

use crate::config::LimitsConfig;
use crate::query::{
    errors::{ValidationError, ValidationErrors},
    metadata::ResourceMetadata,
    spec::{IncludePath, IncludeTree},
};

/// Walks include paths through the relationship graph.
pub struct IncludeResolver<'a> {
    metadata: &'a dyn ResourceMetadata,
    max_depth: usize,
    max_paths: usize,
}

impl<'a> IncludeResolver<'a> {
    /// Creates a resolver with explicit depth and path-count limits.
    pub fn new(metadata: &'a dyn ResourceMetadata, max_depth: usize, max_paths: usize) -> Self {
        Self {
            metadata,
            max_depth,
            max_paths,
        }
    }

    /// Creates a resolver using the include limits from `limits`.
    pub fn from_limits(metadata: &'a dyn ResourceMetadata, limits: &LimitsConfig) -> Self {
        Self::new(metadata, limits.include_max_depth, limits.include_max_paths)
    }

    /// Validates `raw` paths rooted at `resource_type` and merges them.
    ///
    /// Duplicate entries count once toward the path limit.
    pub fn resolve(
        &self,
        resource_type: &str,
        raw: &[String],
    ) -> Result<IncludeTree, ValidationErrors> {
        let mut errors = Vec::new();
        let mut distinct: Vec<&str> = Vec::with_capacity(raw.len());
        for entry in raw {
            if !distinct.contains(&entry.as_str()) {
                distinct.push(entry);
            }
        }
        if distinct.len() > self.max_paths {
            errors.push(ValidationError::TooManyIncludePaths {
                count: distinct.len(),
                max: self.max_paths,
            });
        }

        let mut tree = IncludeTree::new();
        for entry in distinct {
            match self.resolve_path(resource_type, entry) {
                Ok(path) => tree.insert(&path),
                Err(err) => errors.push(err),
            }
        }
        match ValidationErrors::from_vec(errors) {
            Some(errors) => Err(errors),
            None => Ok(tree),
        }
    }

    fn resolve_path(&self, resource_type: &str, raw: &str) -> Result<IncludePath, ValidationError> {
        let path = IncludePath::parse(raw);
        if path.segments().iter().any(String::is_empty) {
            return Err(ValidationError::EmptyIncludeSegment {
                path: raw.to_owned(),
            });
        }
        if path.depth() > self.max_depth {
            return Err(ValidationError::IncludeTooDeep {
                path: raw.to_owned(),
                depth: path.depth(),
                max: self.max_depth,
            });
        }
        let mut current = resource_type;
        for segment in path.segments() {
            match self.metadata.relationship(current, segment) {
                Some(rel) => current = rel.target.as_str(),
                None => {
                    return Err(ValidationError::UnknownRelationship {
                        path: raw.to_owned(),
                        segment: segment.clone(),
                        resource_type: current.to_owned(),
                    })
                }
            }
        }
        Ok(path)
    }
}
