//! Expression determinism analysis.
//!
//! Rewrite rules consult this before any transformation that would
//! duplicate, reorder, or change the evaluation count of an expression;
//! such transformations are only legal when the expression is provably
//! deterministic.

use crate::ScalarExpr;

/// Whether `expr` always produces the same result for the same input row.
///
/// Literals, input references, and variable references are deterministic by
/// construction. A call is deterministic iff its function was registered as
/// deterministic and every argument is (the scan stops at the first
/// non-deterministic argument). Special forms and lambdas are deterministic
/// iff all their sub-expressions are.
pub fn is_deterministic(expr: &ScalarExpr) -> bool {
    match expr {
        ScalarExpr::Literal { .. } | ScalarExpr::InputRef { .. } | ScalarExpr::Variable(_) => true,
        ScalarExpr::Call { signature, args } => {
            signature.is_deterministic() && args.iter().all(is_deterministic)
        }
        ScalarExpr::Special { args, .. } => args.iter().all(is_deterministic),
        ScalarExpr::Lambda { body, .. } => is_deterministic(body),
    }
}
