//! Removal of filters that decide nothing.

use basalt_errors::{internal, BasaltResult};
use basalt_expr::{is_false_literal, is_true_literal};
use basalt_plan::{PlanNode, PlanNodeInner, PlanNodeKind, PlanRef};

use crate::context::RuleContext;
use crate::pattern::{Captures, Pattern};
use crate::rule::{Rewrite, Rule};

/// Splices out filters whose predicate is literally TRUE and turns filters
/// whose predicate is literally FALSE into an empty constant relation over
/// the same output symbols. Together with
/// [`MergeFilters`](crate::rules::MergeFilters), which folds its conjuncts
/// down to exactly those literals, this erases whole predicate stacks that
/// simplify away.
pub struct RemoveTrivialFilter {
    pattern: Pattern,
}

impl RemoveTrivialFilter {
    pub fn new() -> Self {
        RemoveTrivialFilter {
            pattern: Pattern::node(PlanNodeKind::Filter).matching(|node| {
                matches!(
                    &node.inner,
                    PlanNodeInner::Filter { predicate, .. }
                        if is_true_literal(predicate) || is_false_literal(predicate)
                )
            }),
        }
    }
}

impl Default for RemoveTrivialFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for RemoveTrivialFilter {
    fn name(&self) -> &'static str {
        "remove_trivial_filter"
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn apply(
        &self,
        node: &PlanRef,
        _captures: &Captures,
        ctx: &mut RuleContext<'_>,
    ) -> BasaltResult<Rewrite> {
        let PlanNodeInner::Filter { input, predicate } = &node.inner else {
            internal!("remove_trivial_filter applied to a {:?} node", node.kind());
        };
        if is_true_literal(predicate) {
            return Ok(Rewrite::Replaced(input.clone()));
        }
        Ok(Rewrite::Replaced(PlanNode::shared(
            ctx.next_id(),
            PlanNodeInner::Values {
                outputs: node.outputs(),
                rows: vec![],
            },
        )))
    }
}
