//! Bottom-up expression type analysis.
//!
//! [`actual_type`] recomputes what an expression's type really is from its
//! structure, as opposed to what a node *declares* it to be. The
//! post-rewrite validator compares the two; a disagreement beyond the
//! Unknown wildcard and type-only coercions is an optimizer bug.

use basalt_data::DataType;
use basalt_errors::{internal, invariant, invariant_eq, BasaltResult};

use crate::{ScalarExpr, SpecialForm};

/// Whether an actual type satisfies a declared one: the actual type
/// [`DataType::Unknown`] is a wildcard, and a type-only coercion (which is
/// reflexive) is tolerated.
pub fn types_compatible(actual: &DataType, declared: &DataType) -> bool {
    actual.is_unknown() || actual.type_only_coercible_to(declared)
}

/// Computes the actual type of `expr` bottom-up, verifying internal
/// consistency (call arities, argument compatibility, branch agreement) on
/// the way. Inconsistencies are internal errors: expressions are built
/// through resolved signatures and typed constructors, so a bad one means a
/// rule emitted garbage.
pub fn actual_type(expr: &ScalarExpr) -> BasaltResult<DataType> {
    match expr {
        ScalarExpr::Literal { ty, .. } | ScalarExpr::InputRef { ty, .. } => Ok(*ty),
        ScalarExpr::Variable(symbol) => Ok(symbol.ty),
        ScalarExpr::Call { signature, args } => {
            invariant_eq!(
                args.len(),
                signature.arity(),
                "call to `{}` has wrong arity",
                signature.name()
            );
            for (arg, declared) in args.iter().zip(signature.arg_types()) {
                let actual = actual_type(arg)?;
                invariant!(
                    types_compatible(&actual, declared),
                    "argument of `{}` has type {}, expected {}",
                    signature.name(),
                    actual,
                    declared
                );
            }
            Ok(signature.return_type())
        }
        ScalarExpr::Special { form, args, ty } => {
            let computed = match form {
                SpecialForm::And | SpecialForm::Or => {
                    invariant!(args.len() >= 2, "AND/OR requires at least two arguments");
                    for arg in args {
                        let actual = actual_type(arg)?;
                        invariant!(
                            types_compatible(&actual, &DataType::Boolean),
                            "AND/OR argument has type {}, expected boolean",
                            actual
                        );
                    }
                    DataType::Boolean
                }
                SpecialForm::If => {
                    invariant_eq!(args.len(), 3, "IF requires exactly three arguments");
                    let condition = actual_type(&args[0])?;
                    invariant!(
                        types_compatible(&condition, &DataType::Boolean),
                        "IF condition has type {}, expected boolean",
                        condition
                    );
                    let then = actual_type(&args[1])?;
                    let otherwise = actual_type(&args[2])?;
                    unify(then, otherwise)?
                }
                SpecialForm::SimpleCase => {
                    invariant!(args.len() >= 3, "CASE requires an operand and a WHEN clause");
                    let operand = actual_type(&args[0])?;
                    let has_default = args.len() % 2 == 0;
                    let pairs_end = args.len() - usize::from(has_default);
                    let mut result = DataType::Unknown;
                    let mut i = 1;
                    while i < pairs_end {
                        let when = actual_type(&args[i])?;
                        invariant!(
                            equality_comparable(&when, &operand),
                            "CASE WHEN clause has type {}, not comparable to operand type {}",
                            when,
                            operand
                        );
                        result = unify(result, actual_type(&args[i + 1])?)?;
                        i += 2;
                    }
                    if has_default {
                        result = unify(result, actual_type(&args[args.len() - 1])?)?;
                    }
                    result
                }
                SpecialForm::Coalesce => {
                    invariant!(!args.is_empty(), "COALESCE requires at least one argument");
                    let mut result = DataType::Unknown;
                    for arg in args {
                        result = unify(result, actual_type(arg)?)?;
                    }
                    result
                }
            };
            // The declared type must agree with what the branches produce.
            invariant!(
                types_compatible(&computed, ty),
                "special form declares type {} but its arguments produce {}",
                ty,
                computed
            );
            Ok(computed.or(*ty))
        }
        ScalarExpr::Lambda { .. } => {
            internal!("lambda expression has no SQL type outside a function call")
        }
    }
}

/// The common type of two branches: Unknown unifies with anything, equal
/// types unify to themselves, and a type-only-coercible pair unifies to the
/// wider side.
fn unify(left: DataType, right: DataType) -> BasaltResult<DataType> {
    if left.is_unknown() {
        return Ok(right);
    }
    if right.is_unknown() || left == right {
        return Ok(left);
    }
    if left.type_only_coercible_to(&right) {
        return Ok(right);
    }
    if right.type_only_coercible_to(&left) {
        return Ok(left);
    }
    internal!("cannot unify types {left} and {right}")
}

/// Whether values of these types can be compared for equality (CASE WHEN
/// operand matching).
fn equality_comparable(left: &DataType, right: &DataType) -> bool {
    left.is_unknown()
        || right.is_unknown()
        || left == right
        || left.type_only_coercible_to(right)
        || right.type_only_coercible_to(left)
}

#[cfg(test)]
mod tests {
    use basalt_data::Value;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ComparisonOp, FunctionRegistry, ScalarExpr, Symbol};

    #[test]
    fn variables_report_their_symbol_type() {
        let sym = Symbol::new("name", DataType::VarChar(10));
        assert_eq!(actual_type(&sym.to_expr()).unwrap(), DataType::VarChar(10));
    }

    #[test]
    fn calls_report_the_signature_return_type() {
        let registry = FunctionRegistry::new();
        let expr = ScalarExpr::Call {
            signature: registry.comparison(ComparisonOp::Less, DataType::BigInt, DataType::BigInt),
            args: vec![ScalarExpr::literal(1i64), ScalarExpr::literal(2i64)],
        };
        assert_eq!(actual_type(&expr).unwrap(), DataType::Boolean);
    }

    #[test]
    fn call_arity_mismatch_is_internal() {
        let registry = FunctionRegistry::new();
        let expr = ScalarExpr::Call {
            signature: registry.comparison(ComparisonOp::Less, DataType::BigInt, DataType::BigInt),
            args: vec![ScalarExpr::literal(1i64)],
        };
        assert!(actual_type(&expr).unwrap_err().is_internal());
    }

    #[test]
    fn call_argument_type_mismatch_is_internal() {
        let registry = FunctionRegistry::new();
        let expr = ScalarExpr::Call {
            signature: registry.comparison(ComparisonOp::Less, DataType::BigInt, DataType::BigInt),
            args: vec![ScalarExpr::literal("one"), ScalarExpr::literal(2i64)],
        };
        assert!(actual_type(&expr).unwrap_err().is_internal());
    }

    #[test]
    fn unknown_arguments_are_wildcards() {
        let registry = FunctionRegistry::new();
        let fail_call = ScalarExpr::Call {
            signature: registry.fail_signature(),
            args: vec![
                ScalarExpr::literal(28i64),
                ScalarExpr::null(DataType::Unknown),
            ],
        };
        assert_eq!(actual_type(&fail_call).unwrap(), DataType::Unknown);
    }

    #[test]
    fn case_unifies_branch_types() {
        let expr = ScalarExpr::simple_case(
            ScalarExpr::literal(1i64),
            vec![(
                ScalarExpr::literal(1i64),
                ScalarExpr::Literal {
                    value: Value::Int(0),
                    ty: DataType::Int,
                },
            )],
            Some(ScalarExpr::literal(5i64)),
            DataType::BigInt,
        );
        // int widens to bigint across branches
        assert_eq!(actual_type(&expr).unwrap(), DataType::BigInt);
    }

    #[test]
    fn case_with_unknown_default_takes_the_known_branch_type() {
        let registry = FunctionRegistry::new();
        let fail_call = ScalarExpr::Call {
            signature: registry.fail_signature(),
            args: vec![ScalarExpr::literal(28i64), ScalarExpr::literal("boom")],
        };
        let expr = ScalarExpr::simple_case(
            Symbol::new("is_distinct", DataType::Boolean).to_expr(),
            vec![(ScalarExpr::TRUE, ScalarExpr::TRUE)],
            Some(fail_call),
            DataType::Boolean,
        );
        assert_eq!(actual_type(&expr).unwrap(), DataType::Boolean);
    }

    #[test]
    fn irreconcilable_branches_are_internal() {
        let expr = ScalarExpr::if_then_else(
            ScalarExpr::TRUE,
            ScalarExpr::literal(1i64),
            ScalarExpr::literal("one"),
            DataType::BigInt,
        );
        assert!(actual_type(&expr).unwrap_err().is_internal());
    }

    #[test]
    fn bare_lambda_has_no_type() {
        let lambda = ScalarExpr::Lambda {
            params: vec![Symbol::new("x", DataType::BigInt)],
            body: Box::new(ScalarExpr::literal(1i64)),
        };
        assert!(actual_type(&lambda).unwrap_err().is_internal());
    }
}
