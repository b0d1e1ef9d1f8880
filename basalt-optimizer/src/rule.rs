//! The rewrite-rule interface.

use basalt_errors::BasaltResult;
use basalt_plan::PlanRef;

use crate::context::RuleContext;
use crate::pattern::{Captures, Pattern};

/// What applying a rule produced.
#[derive(Debug, Clone)]
pub enum Rewrite {
    /// The rule declined after a deeper look than its pattern could
    /// express.
    Unchanged,
    /// Replace the matched node with this plan. The replacement must
    /// produce the same output symbol set as the node it replaces; the
    /// memo rejects rewrites that do not.
    Replaced(PlanRef),
}

/// A single rewrite over one node shape.
///
/// Rules are matched and applied by the [`Optimizer`](crate::Optimizer):
/// the [`Pattern`] prunes candidates structurally, then [`apply`] receives
/// the matched node together with its captures and either builds a
/// replacement or bows out with [`Rewrite::Unchanged`]. A rule never
/// mutates the plan it is shown; all new state flows through the
/// [`RuleContext`].
///
/// Rules must make progress: each one either strictly shrinks the plan by
/// some measure or produces a shape no registered rule (itself included)
/// fires on, since the driver re-runs the whole set to a fixed point.
///
/// [`apply`]: Rule::apply
pub trait Rule {
    /// Identifies the rule in logs.
    fn name(&self) -> &'static str;

    /// The shape of nodes this rule can rewrite.
    fn pattern(&self) -> &Pattern;

    /// Builds the replacement for `node`, which the driver has already
    /// matched against [`pattern`](Rule::pattern) and resolved to a
    /// concrete node. Nodes built here take fresh ids from the context.
    fn apply(
        &self,
        node: &PlanRef,
        captures: &Captures,
        ctx: &mut RuleContext<'_>,
    ) -> BasaltResult<Rewrite>;
}
