//! Structural expression equivalence.
//!
//! Plain `==` on [`ScalarExpr`] is too strict for rule and test use: `a > 1`
//! and `1 < a` are the same predicate written in either direction. This
//! module's comparison treats a flipped comparison with swapped operands as
//! equivalent, and nothing else beyond structural recursion.

use crate::ScalarExpr;

/// Whether two expressions are structurally equivalent, treating a binary
/// comparison as equal to its flipped form with swapped operands.
///
/// `a > 1` ≡ `1 < a`, but `a > 1` ≢ `1 > a`: the latter is the same operator
/// over swapped operands, which is a different predicate.
pub fn expressions_equivalent(left: &ScalarExpr, right: &ScalarExpr) -> bool {
    match (left, right) {
        (
            ScalarExpr::Literal {
                value: left_value,
                ty: left_ty,
            },
            ScalarExpr::Literal {
                value: right_value,
                ty: right_ty,
            },
        ) => left_value == right_value && left_ty == right_ty,
        (
            ScalarExpr::InputRef {
                index: left_index,
                ty: left_ty,
            },
            ScalarExpr::InputRef {
                index: right_index,
                ty: right_ty,
            },
        ) => left_index == right_index && left_ty == right_ty,
        (ScalarExpr::Variable(left_sym), ScalarExpr::Variable(right_sym)) => {
            left_sym == right_sym
        }
        (
            ScalarExpr::Call {
                signature: left_sig,
                args: left_args,
            },
            ScalarExpr::Call {
                signature: right_sig,
                args: right_args,
            },
        ) => {
            if let (Some(left_op), Some(right_op), [ll, lr], [rl, rr]) = (
                left_sig.comparison_op(),
                right_sig.comparison_op(),
                left_args.as_slice(),
                right_args.as_slice(),
            ) {
                return (left_op == right_op
                    && expressions_equivalent(ll, rl)
                    && expressions_equivalent(lr, rr))
                    || (left_op == right_op.flip()
                        && expressions_equivalent(ll, rr)
                        && expressions_equivalent(lr, rl));
            }
            left_sig == right_sig
                && left_args.len() == right_args.len()
                && left_args
                    .iter()
                    .zip(right_args)
                    .all(|(l, r)| expressions_equivalent(l, r))
        }
        (
            ScalarExpr::Special {
                form: left_form,
                args: left_args,
                ty: left_ty,
            },
            ScalarExpr::Special {
                form: right_form,
                args: right_args,
                ty: right_ty,
            },
        ) => {
            left_form == right_form
                && left_ty == right_ty
                && left_args.len() == right_args.len()
                && left_args
                    .iter()
                    .zip(right_args)
                    .all(|(l, r)| expressions_equivalent(l, r))
        }
        (
            ScalarExpr::Lambda {
                params: left_params,
                body: left_body,
            },
            ScalarExpr::Lambda {
                params: right_params,
                body: right_body,
            },
        ) => left_params == right_params && expressions_equivalent(left_body, right_body),
        _ => false,
    }
}
