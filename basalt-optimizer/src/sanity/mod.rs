//! Post-rewrite whole-plan checks.
//!
//! Rules are only ever shown one node and its surroundings, so a bug in one
//! can corrupt an invariant that spans the tree without anything noticing.
//! These checkers re-establish the whole-plan invariants after the driver
//! reaches its fixed point, before the plan moves on to execution planning.
//! Each violation is an internal error: a user query can never cause one,
//! only a broken rule can.

use basalt_errors::{internal, BasaltResult};
use basalt_plan::PlanRef;
use tracing::trace;

mod type_validator;

pub use type_validator::TypeValidator;

/// One whole-plan invariant, checked against an extracted plan.
pub trait SanityChecker {
    fn name(&self) -> &'static str;
    fn validate(&self, plan: &PlanRef) -> BasaltResult<()>;
}

/// Rejects plans that still contain memo group references. Extraction
/// resolves them all; one surviving here means the plan escaped the memo
/// without going through extraction.
pub struct NoGroupReferences;

impl SanityChecker for NoGroupReferences {
    fn name(&self) -> &'static str {
        "no_group_references"
    }

    fn validate(&self, plan: &PlanRef) -> BasaltResult<()> {
        if let Some(group) = plan.as_group() {
            internal!("extracted plan still references group g{}", group.index());
        }
        for child in plan.children() {
            self.validate(child)?;
        }
        Ok(())
    }
}

/// Runs the standard checker pipeline over `plan`. The structural check
/// runs first so the later checkers can assume reference-free trees.
pub fn validate_plan(plan: &PlanRef) -> BasaltResult<()> {
    let checkers: [&dyn SanityChecker; 2] = [&NoGroupReferences, &TypeValidator];
    for checker in checkers {
        checker.validate(plan)?;
        trace!(checker = checker.name(), "sanity check passed");
    }
    Ok(())
}
