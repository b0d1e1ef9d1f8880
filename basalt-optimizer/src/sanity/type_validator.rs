//! Declared-versus-actual type agreement across the plan.

use basalt_data::DataType;
use basalt_errors::{internal, invariant_eq, BasaltResult};
use basalt_expr::{actual_type, types_compatible, ScalarExpr, Symbol};
use basalt_plan::{AggregateStep, FunctionCall, PlanNodeInner, PlanRef};

use super::SanityChecker;

/// Checks that every symbol a node produces carries the type its defining
/// expression actually computes.
///
/// Not every node gets the full treatment. A final aggregation's inputs are
/// partial accumulator states, so only its declared signatures are checked
/// against its output symbols, and a partial aggregation's outputs *are*
/// accumulator states, typed by the execution engine rather than by SQL, so
/// it is skipped entirely.
pub struct TypeValidator;

impl SanityChecker for TypeValidator {
    fn name(&self) -> &'static str {
        "type_validator"
    }

    fn validate(&self, plan: &PlanRef) -> BasaltResult<()> {
        for child in plan.children() {
            self.validate(child)?;
        }
        match &plan.inner {
            PlanNodeInner::Aggregate {
                step, aggregates, ..
            } => match step {
                AggregateStep::Single => {
                    check_signatures(aggregates)?;
                    check_calls(aggregates)?;
                }
                AggregateStep::Final => check_signatures(aggregates)?,
                AggregateStep::Partial => {}
            },
            PlanNodeInner::Window { functions, .. } => {
                check_signatures(functions)?;
                check_calls(functions)?;
            }
            PlanNodeInner::Project { assignments, .. } => {
                for (target, expr) in assignments.iter() {
                    match expr {
                        // A bare variable forwards another symbol; the
                        // declared types must already agree.
                        ScalarExpr::Variable(source) => {
                            verify_type(target, target.ty, source.ty)?;
                        }
                        _ => {
                            let actual = actual_type(expr)?;
                            verify_type(target, target.ty, actual)?;
                        }
                    }
                }
            }
            PlanNodeInner::Union {
                outputs,
                input_mappings,
                ..
            } => {
                for mapping in input_mappings {
                    invariant_eq!(
                        mapping.len(),
                        outputs.len(),
                        "union mapping arity disagrees with its outputs"
                    );
                    for (output, contributed) in outputs.iter().zip(mapping) {
                        verify_type(output, output.ty, contributed.ty)?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn check_signatures(functions: &[(Symbol, FunctionCall)]) -> BasaltResult<()> {
    for (target, call) in functions {
        verify_type(target, target.ty, call.signature.return_type())?;
    }
    Ok(())
}

fn check_calls(functions: &[(Symbol, FunctionCall)]) -> BasaltResult<()> {
    for (target, call) in functions {
        let actual = actual_type(&call.as_expr())?;
        verify_type(target, target.ty, actual)?;
    }
    Ok(())
}

/// Unknown is a wildcard, and a type-only coercion (which is reflexive) is
/// tolerated; anything else is a planner bug.
fn verify_type(symbol: &Symbol, expected: DataType, actual: DataType) -> BasaltResult<()> {
    if !types_compatible(&actual, &expected) {
        internal!(
            "type of symbol '{}' is expected to be {}, but the actual type is {}",
            symbol,
            expected,
            actual
        );
    }
    Ok(())
}
