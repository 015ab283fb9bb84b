//! Complexity scoring and budget enforcement.

use tracing::debug;

use crate::config::LimitsConfig;
use crate::query::{
    ast::FilterNode,
    errors::QueryError,
    spec::{ComplexityScore, FieldSelection, IncludeTree},
};

/// Scores resolved query parts and applies the configured budget.
pub struct LimitsEnforcer<'a> {
    limits: &'a LimitsConfig,
}

impl<'a> LimitsEnforcer<'a> {
    /// Creates an enforcer over `limits`.
    pub fn new(limits: &'a LimitsConfig) -> Self {
        Self { limits }
    }

    /// Weighted score of the resolved includes, fields and filter.
    pub fn score(
        &self,
        include: &IncludeTree,
        fields: &FieldSelection,
        filter: Option<&FilterNode>,
    ) -> ComplexityScore {
        let weights = &self.limits.weights;
        let include_depths: usize = include.leaf_paths().iter().map(|p| p.depth()).sum();
        let includes = weights.include.saturating_mul(include_depths);
        let fields = weights.field.saturating_mul(fields.total_fields());
        let filter = weights
            .filter
            .saturating_mul(filter.map_or(0, FilterNode::node_count));
        ComplexityScore {
            includes,
            fields,
            filter,
            total: includes.saturating_add(fields).saturating_add(filter),
        }
    }

    /// Rejects scores above the budget.
    pub fn enforce(&self, score: &ComplexityScore) -> Result<(), QueryError> {
        if score.total > self.limits.complexity_budget {
            debug!(
                score = score.total,
                budget = self.limits.complexity_budget,
                "query rejected by complexity budget"
            );
            return Err(QueryError::ComplexityBudgetExceeded {
                score: score.total,
                budget: self.limits.complexity_budget,
            });
        }
        debug!(
            includes = score.includes,
            fields = score.fields,
            filter = score.filter,
            total = score.total,
            "complexity within budget"
        );
        Ok(())
    }
}
