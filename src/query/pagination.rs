//! Pagination resolver.

use tracing::debug;

use crate::config::PaginationConfig;
use crate::query::{errors::ValidationError, params::PageParams, spec::PageDescriptor};

/// Resolves raw page parameters into a [`PageDescriptor`].
///
/// `size` is clamped into `[1, max_size]`; `number` must be at least 1 and
/// is never clamped, so a page past the end is simply empty.
pub fn resolve_page(
    params: &PageParams,
    config: &PaginationConfig,
) -> Result<PageDescriptor, ValidationError> {
    let number = params.number.unwrap_or(1);
    if number < 1 {
        return Err(ValidationError::InvalidPageNumber { number });
    }
    let requested = params
        .size
        .unwrap_or_else(|| i64::try_from(config.default_size).unwrap_or(i64::MAX));
    let max = config.max_size.max(1);
    let size = u64::try_from(requested.max(1)).unwrap_or(1).min(max);
    if params.size.is_some_and(|raw| u64::try_from(raw).ok() != Some(size)) {
        debug!(requested, size, max, "clamped page size");
    }
    Ok(PageDescriptor {
        number: number.unsigned_abs(),
        size,
    })
}
