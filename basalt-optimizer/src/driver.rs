//! The fixed-point rewrite driver.

use basalt_errors::{internal_err, BasaltResult};
use basalt_plan::{GroupId, Memo, PlanRef};
use tracing::{debug, instrument, trace};

use crate::context::{PlanningContext, RuleContext};
use crate::rule::{Rewrite, Rule};
use crate::rules::{DecorrelateScalarSubquery, MergeFilters, MergeProjects, RemoveTrivialFilter};

/// What one [`Optimizer::optimize`] run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizeOutcome {
    /// The rewritten plan, extracted from the memo reference-free.
    pub plan: PlanRef,
    /// Whole-tree passes taken, counting the final pass that found nothing
    /// left to rewrite.
    pub passes: usize,
    /// Total rule applications across all passes.
    pub rules_applied: usize,
}

/// Drives a set of [`Rule`]s over a plan to a fixed point.
///
/// Rules are tried in registration order against every node of the tree,
/// root first. The first rule whose pattern matches and whose `apply`
/// produces a replacement wins; the node is replaced in the memo and
/// matching restarts from the first rule on the new representative, so
/// earlier-registered rules always get the next look. Whole-tree passes
/// repeat until one completes without a single rule firing.
pub struct Optimizer {
    rules: Vec<Box<dyn Rule>>,
}

impl Optimizer {
    /// An optimizer with no rules. See [`with_rule`](Self::with_rule).
    pub fn new() -> Self {
        Optimizer { rules: Vec::new() }
    }

    /// The standard rule set in its standard order. Decorrelation runs
    /// ahead of the cleanup rules so the filters and projections it emits
    /// are merged within the same call.
    pub fn standard() -> Self {
        Optimizer::new()
            .with_rule(DecorrelateScalarSubquery::new())
            .with_rule(MergeFilters::new())
            .with_rule(MergeProjects::new())
            .with_rule(RemoveTrivialFilter::new())
    }

    /// Registers `rule` after every rule registered so far.
    pub fn with_rule<R: Rule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Rewrites `plan` to a fixed point of the registered rules.
    #[instrument(level = "trace", skip_all)]
    pub fn optimize(
        &self,
        plan: PlanRef,
        context: &mut PlanningContext,
    ) -> BasaltResult<OptimizeOutcome> {
        let mut memo = Memo::new(plan, context.ids())?;
        let mut passes = 0;
        let mut rules_applied = 0;
        loop {
            passes += 1;
            trace!(pass = passes, "starting rewrite pass");
            if !self.explore_group(memo.root(), &mut memo, context, &mut rules_applied)? {
                break;
            }
        }
        let plan = memo.extract()?;
        debug!(passes, rules_applied, "rewriting reached a fixed point");
        Ok(OptimizeOutcome {
            plan,
            passes,
            rules_applied,
        })
    }

    /// Rewrites `group` and everything under it until no rule fires.
    /// Returns whether anything changed.
    fn explore_group(
        &self,
        group: GroupId,
        memo: &mut Memo,
        context: &mut PlanningContext,
        rules_applied: &mut usize,
    ) -> BasaltResult<bool> {
        let mut progress = self.explore_node(group, memo, context, rules_applied)?;
        while self.explore_children(group, memo, context, rules_applied)? {
            progress = true;
            // A child rewrite can expose a shape a rule fires on here, so
            // retry this node before returning.
            if !self.explore_node(group, memo, context, rules_applied)? {
                break;
            }
        }
        Ok(progress)
    }

    /// Applies rules to the representative of `group` until none fires.
    fn explore_node(
        &self,
        group: GroupId,
        memo: &mut Memo,
        context: &mut PlanningContext,
        rules_applied: &mut usize,
    ) -> BasaltResult<bool> {
        let mut progress = false;
        let mut done = false;
        while !done {
            done = true;
            let node = memo.lookup().resolve_group(group)?;
            for rule in &self.rules {
                let rewrite = {
                    let lookup = memo.lookup();
                    let Some(captures) = rule.pattern().try_match(&node, lookup)? else {
                        continue;
                    };
                    let mut ctx = RuleContext {
                        lookup,
                        ids: &mut context.ids,
                        symbols: &mut context.symbols,
                        functions: context.functions.as_ref(),
                    };
                    rule.apply(&node, &captures, &mut ctx)?
                };
                match rewrite {
                    Rewrite::Unchanged => {}
                    Rewrite::Replaced(replacement) => {
                        debug!(rule = rule.name(), group = group.index(), "rule fired");
                        memo.replace(group, replacement, &mut context.ids)?;
                        *rules_applied += 1;
                        progress = true;
                        // Restart from the first rule on the new node.
                        done = false;
                        break;
                    }
                }
            }
        }
        Ok(progress)
    }

    /// Recurses into the child groups of `group`'s representative.
    fn explore_children(
        &self,
        group: GroupId,
        memo: &mut Memo,
        context: &mut PlanningContext,
        rules_applied: &mut usize,
    ) -> BasaltResult<bool> {
        // Representatives only ever hold reference children, so snapshot
        // the child group ids and recurse without borrowing the memo.
        let child_groups = memo
            .lookup()
            .resolve_group(group)?
            .children()
            .into_iter()
            .map(|child| {
                child.as_group().ok_or_else(|| {
                    internal_err!(
                        "representative of group g{} has a concrete child {}",
                        group.index(),
                        child.id
                    )
                })
            })
            .collect::<BasaltResult<Vec<_>>>()?;
        let mut progress = false;
        for child in child_groups {
            progress |= self.explore_group(child, memo, context, rules_applied)?;
        }
        Ok(progress)
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}
