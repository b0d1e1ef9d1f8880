//! The iterative plan rewrite engine.
//!
//! An [`Optimizer`] drives a set of [`Rule`]s over a memo-resident plan
//! until a whole-tree pass completes without any rule firing. Rules declare
//! the node shape they care about with a [`Pattern`]; when the pattern
//! matches, the rule builds a replacement through a [`RuleContext`], and the
//! driver installs it in the memo so every parent sees the new subtree at
//! once.
//!
//! The [`rules`] module holds the rule library, headlined by
//! [`rules::DecorrelateScalarSubquery`], which rewrites correlated scalar
//! subqueries into plain lateral joins with the single-row requirement
//! either proven away or deferred to execution time.
//!
//! After rewriting, [`sanity::validate_plan`] re-checks whole-plan
//! invariants, most importantly that every node's declared output types
//! still agree with what its expressions actually compute.

pub mod context;
pub mod driver;
pub mod pattern;
pub mod rule;
pub mod rules;
pub mod sanity;

pub use context::{PlanningContext, RuleContext};
pub use driver::{OptimizeOutcome, Optimizer};
pub use pattern::{Captures, Pattern};
pub use rule::{Rewrite, Rule};
