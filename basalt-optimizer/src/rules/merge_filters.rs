//! Collapsing of stacked filters.

use basalt_errors::{internal, BasaltResult};
use basalt_expr::combine_conjuncts;
use basalt_plan::{PlanNode, PlanNodeInner, PlanNodeKind, PlanRef};

use crate::context::RuleContext;
use crate::pattern::{Captures, Pattern};
use crate::rule::{Rewrite, Rule};

const CHILD: &str = "child_filter";

/// Merges `Filter(Filter(x))` into a single filter over the conjunction of
/// both predicates, upstream predicate first. Conjunction building drops
/// duplicates up to comparison flips, so re-derived predicates collapse
/// instead of piling up.
pub struct MergeFilters {
    pattern: Pattern,
}

impl MergeFilters {
    pub fn new() -> Self {
        MergeFilters {
            pattern: Pattern::node(PlanNodeKind::Filter)
                .with_child(0, Pattern::node(PlanNodeKind::Filter).capturing_as(CHILD)),
        }
    }
}

impl Default for MergeFilters {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for MergeFilters {
    fn name(&self) -> &'static str {
        "merge_filters"
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn apply(
        &self,
        node: &PlanRef,
        captures: &Captures,
        ctx: &mut RuleContext<'_>,
    ) -> BasaltResult<Rewrite> {
        let PlanNodeInner::Filter { predicate, .. } = &node.inner else {
            internal!("merge_filters applied to a {:?} node", node.kind());
        };
        let child = captures.get(CHILD)?;
        let PlanNodeInner::Filter {
            input,
            predicate: child_predicate,
        } = &child.inner
        else {
            internal!("merge_filters captured a {:?} node", child.kind());
        };

        let combined = combine_conjuncts([child_predicate.clone(), predicate.clone()]);
        Ok(Rewrite::Replaced(PlanNode::shared(
            ctx.next_id(),
            PlanNodeInner::Filter {
                input: input.clone(),
                predicate: combined,
            },
        )))
    }
}
