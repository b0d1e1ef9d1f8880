//! A small scalar-expression interpreter.
//!
//! The optimizer itself never evaluates expressions against data; execution
//! belongs to the engine downstream of planning. This interpreter exists so
//! the deferred runtime behavior a rewrite embeds into a plan (most
//! importantly the `fail()` call the scalar-subquery decorrelation plants
//! behind a CASE) can be exercised end to end: evaluate the rewritten
//! predicate against synthetic rows and observe the exact failure.
//!
//! Semantics are SQL's: comparisons and logical connectives are
//! three-valued (a NULL operand yields NULL), CASE/IF/COALESCE evaluate
//! lazily, and `fail(code, message)` raises
//! [`BasaltError::QueryFailed`] with its arguments verbatim.

use std::cmp::Ordering;
use std::collections::HashMap;

use basalt_data::{DataType, SqlIdentifier, Value};
use basalt_errors::{error_codes, internal, unsupported, BasaltError, BasaltResult};

use crate::functions::{CAST_FUNCTION, FAIL_FUNCTION};
use crate::{ArithmeticOp, ComparisonOp, ScalarExpr, SpecialForm};

/// The row environment an expression is evaluated against: positional
/// fields for [`ScalarExpr::InputRef`] and named bindings for
/// [`ScalarExpr::Variable`].
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    row: &'a [Value],
    variables: &'a HashMap<SqlIdentifier, Value>,
}

impl<'a> EvalContext<'a> {
    pub fn new(row: &'a [Value], variables: &'a HashMap<SqlIdentifier, Value>) -> Self {
        EvalContext { row, variables }
    }
}

/// Evaluates `expr` against `ctx`.
pub fn evaluate(expr: &ScalarExpr, ctx: &EvalContext<'_>) -> BasaltResult<Value> {
    match expr {
        ScalarExpr::Literal { value, .. } => Ok(value.clone()),
        ScalarExpr::InputRef { index, .. } => match ctx.row.get(*index) {
            Some(value) => Ok(value.clone()),
            None => internal!(
                "input reference ${index} out of bounds for a row of {} fields",
                ctx.row.len()
            ),
        },
        ScalarExpr::Variable(symbol) => match ctx.variables.get(symbol.name.as_str()) {
            Some(value) => Ok(value.clone()),
            None => internal!("unbound variable `{}`", symbol.name),
        },
        ScalarExpr::Call { signature, args } => {
            if let Some(op) = signature.comparison_op() {
                let left = evaluate(&args[0], ctx)?;
                let right = evaluate(&args[1], ctx)?;
                return compare(op, &left, &right);
            }
            if let Some(op) = ArithmeticOp::from_token(signature.name()) {
                let left = evaluate(&args[0], ctx)?;
                let right = evaluate(&args[1], ctx)?;
                return arithmetic(op, &left, &right);
            }
            match signature.name() {
                FAIL_FUNCTION => {
                    let code = evaluate(&args[0], ctx)?;
                    let message = evaluate(&args[1], ctx)?;
                    let code = match code.as_bigint() {
                        Some(code) => code,
                        None => internal!("fail() error code must be an integer, got {code}"),
                    };
                    let message = match message.as_str() {
                        Some(message) => message.to_owned(),
                        None => internal!("fail() message must be a string, got {message}"),
                    };
                    Err(BasaltError::QueryFailed { code, message })
                }
                CAST_FUNCTION => {
                    let value = evaluate(&args[0], ctx)?;
                    cast(value, signature.return_type())
                }
                name => unsupported!("no runtime implementation for function `{name}`"),
            }
        }
        ScalarExpr::Special { form, args, .. } => match form {
            SpecialForm::And => {
                let mut saw_null = false;
                for arg in args {
                    match evaluate(arg, ctx)? {
                        Value::Boolean(false) => return Ok(Value::Boolean(false)),
                        Value::Boolean(true) => {}
                        Value::Null => saw_null = true,
                        other => internal!("AND over non-boolean value {other}"),
                    }
                }
                Ok(if saw_null {
                    Value::Null
                } else {
                    Value::Boolean(true)
                })
            }
            SpecialForm::Or => {
                let mut saw_null = false;
                for arg in args {
                    match evaluate(arg, ctx)? {
                        Value::Boolean(true) => return Ok(Value::Boolean(true)),
                        Value::Boolean(false) => {}
                        Value::Null => saw_null = true,
                        other => internal!("OR over non-boolean value {other}"),
                    }
                }
                Ok(if saw_null {
                    Value::Null
                } else {
                    Value::Boolean(false)
                })
            }
            SpecialForm::If => {
                // NULL and FALSE conditions both take the else branch.
                if evaluate(&args[0], ctx)? == Value::Boolean(true) {
                    evaluate(&args[1], ctx)
                } else {
                    evaluate(&args[2], ctx)
                }
            }
            SpecialForm::SimpleCase => {
                let operand = evaluate(&args[0], ctx)?;
                let has_default = args.len() % 2 == 0;
                let pairs_end = args.len() - usize::from(has_default);
                let mut i = 1;
                while i < pairs_end {
                    let when = evaluate(&args[i], ctx)?;
                    // SQL equality: NULL never matches a WHEN clause.
                    if !operand.is_null()
                        && !when.is_null()
                        && compare(ComparisonOp::Equal, &operand, &when)?
                            == Value::Boolean(true)
                    {
                        return evaluate(&args[i + 1], ctx);
                    }
                    i += 2;
                }
                if has_default {
                    evaluate(&args[args.len() - 1], ctx)
                } else {
                    Ok(Value::Null)
                }
            }
            SpecialForm::Coalesce => {
                for arg in args {
                    let value = evaluate(arg, ctx)?;
                    if !value.is_null() {
                        return Ok(value);
                    }
                }
                Ok(Value::Null)
            }
        },
        ScalarExpr::Lambda { .. } => {
            unsupported!("lambda expressions cannot be evaluated standalone")
        }
    }
}

fn compare(op: ComparisonOp, left: &Value, right: &Value) -> BasaltResult<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let ordering = value_ordering(left, right)?;
    let result = match op {
        ComparisonOp::Equal => ordering == Ordering::Equal,
        ComparisonOp::NotEqual => ordering != Ordering::Equal,
        ComparisonOp::Less => ordering == Ordering::Less,
        ComparisonOp::LessOrEqual => ordering != Ordering::Greater,
        ComparisonOp::Greater => ordering == Ordering::Greater,
        ComparisonOp::GreaterOrEqual => ordering != Ordering::Less,
    };
    Ok(Value::Boolean(result))
}

fn value_ordering(left: &Value, right: &Value) -> BasaltResult<Ordering> {
    match (left, right) {
        (Value::Boolean(l), Value::Boolean(r)) => Ok(l.cmp(r)),
        (Value::Text(l), Value::Text(r)) => Ok(l.cmp(r)),
        _ => {
            if let (Some(l), Some(r)) = (left.as_bigint(), right.as_bigint()) {
                return Ok(l.cmp(&r));
            }
            if let (Some(l), Some(r)) = (left.as_double(), right.as_double()) {
                return Ok(l.partial_cmp(&r).unwrap_or(Ordering::Equal));
            }
            internal!("cannot compare {left} and {right}")
        }
    }
}

fn arithmetic(op: ArithmeticOp, left: &Value, right: &Value) -> BasaltResult<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    // Integer arithmetic when both sides are integers, double otherwise.
    if let (Some(l), Some(r)) = (left.as_bigint(), right.as_bigint()) {
        let out_of_range = || BasaltError::QueryFailed {
            code: error_codes::NUMERIC_VALUE_OUT_OF_RANGE,
            message: format!("bigint {} {} {} is out of range", l, op.token(), r),
        };
        let result = match op {
            ArithmeticOp::Add => l.checked_add(r).ok_or_else(out_of_range)?,
            ArithmeticOp::Subtract => l.checked_sub(r).ok_or_else(out_of_range)?,
            ArithmeticOp::Multiply => l.checked_mul(r).ok_or_else(out_of_range)?,
            ArithmeticOp::Divide => {
                if r == 0 {
                    return Err(BasaltError::QueryFailed {
                        code: error_codes::DIVISION_BY_ZERO,
                        message: "Division by zero".into(),
                    });
                }
                l.checked_div(r).ok_or_else(out_of_range)?
            }
        };
        return Ok(Value::BigInt(result));
    }
    if let (Some(l), Some(r)) = (left.as_double(), right.as_double()) {
        let result = match op {
            ArithmeticOp::Add => l + r,
            ArithmeticOp::Subtract => l - r,
            ArithmeticOp::Multiply => l * r,
            ArithmeticOp::Divide => {
                if r == 0.0 {
                    return Err(BasaltError::QueryFailed {
                        code: error_codes::DIVISION_BY_ZERO,
                        message: "Division by zero".into(),
                    });
                }
                l / r
            }
        };
        return Ok(Value::Double(result));
    }
    internal!("cannot apply `{}` to {left} and {right}", op.token())
}

fn cast(value: Value, to: DataType) -> BasaltResult<Value> {
    if value.is_null() || to.is_unknown() {
        return Ok(value);
    }
    match (&value, to) {
        (Value::Boolean(_), DataType::Boolean)
        | (Value::Int(_), DataType::Int)
        | (Value::BigInt(_), DataType::BigInt)
        | (Value::Double(_), DataType::Double)
        | (Value::Text(_), DataType::Text) => Ok(value),
        (Value::Int(i), DataType::BigInt) => Ok(Value::BigInt(i64::from(*i))),
        (Value::Int(i), DataType::Double) => Ok(Value::Double(f64::from(*i))),
        (Value::BigInt(i), DataType::Double) => Ok(Value::Double(*i as f64)),
        (Value::Text(_), DataType::VarChar(_)) => Ok(value),
        _ => internal!("unsupported cast of {value} to {to}"),
    }
}
