//! Function signatures and the registry that resolves them.
//!
//! The registry is one of the engine's read-only collaborators: it is built
//! once, shared (`Arc`) across concurrent compilations, and consulted when a
//! planning stage or rewrite rule needs to build a call. Resolved signatures
//! are embedded into the expression tree, so downstream analyses
//! (determinism, type checking, evaluation) never talk to the registry.

use std::collections::HashMap;

use basalt_data::{DataType, SqlIdentifier};
use basalt_errors::{invalid_query_err, BasaltResult};
use serde::{Deserialize, Serialize};

use crate::typecheck::types_compatible;
use crate::{ArithmeticOp, ComparisonOp};

/// Name the `fail(code, message)` function is registered under.
pub const FAIL_FUNCTION: &str = "fail";

/// Name cast signatures are registered under. The `$` prefix keeps the name
/// out of the SQL namespace.
pub const CAST_FUNCTION: &str = "$cast";

/// A resolved function: name, argument types, return type, and whether the
/// function is deterministic.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionSignature {
    name: SqlIdentifier,
    arg_types: Vec<DataType>,
    return_type: DataType,
    deterministic: bool,
}

impl FunctionSignature {
    pub fn new<N>(name: N, arg_types: Vec<DataType>, return_type: DataType) -> Self
    where
        N: Into<SqlIdentifier>,
    {
        FunctionSignature {
            name: name.into(),
            arg_types,
            return_type,
            deterministic: true,
        }
    }

    /// A signature for a function whose result may differ between calls with
    /// identical arguments (`random()`, `now()`, …).
    pub fn new_non_deterministic<N>(
        name: N,
        arg_types: Vec<DataType>,
        return_type: DataType,
    ) -> Self
    where
        N: Into<SqlIdentifier>,
    {
        FunctionSignature {
            name: name.into(),
            arg_types,
            return_type,
            deterministic: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arg_types(&self) -> &[DataType] {
        &self.arg_types
    }

    pub fn return_type(&self) -> DataType {
        self.return_type
    }

    pub fn arity(&self) -> usize {
        self.arg_types.len()
    }

    /// Whether calls to this function may be duplicated, reordered, or
    /// evaluated a different number of times without changing results.
    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    /// If this is a binary comparison operator signature, the operator.
    pub fn comparison_op(&self) -> Option<ComparisonOp> {
        if self.arity() == 2 {
            ComparisonOp::from_token(&self.name)
        } else {
            None
        }
    }
}

/// The registry of resolvable functions.
///
/// Operator signatures (comparisons, arithmetic, `fail`, casts) are
/// constructed on demand; scalar functions are registered by name and arity.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    scalar: HashMap<(SqlIdentifier, usize), FunctionSignature>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a deterministic scalar function.
    pub fn register<N>(&mut self, name: N, arg_types: Vec<DataType>, return_type: DataType)
    where
        N: Into<SqlIdentifier>,
    {
        let signature = FunctionSignature::new(name, arg_types, return_type);
        self.scalar
            .insert((signature.name.clone(), signature.arity()), signature);
    }

    /// Registers a non-deterministic scalar function.
    pub fn register_non_deterministic<N>(
        &mut self,
        name: N,
        arg_types: Vec<DataType>,
        return_type: DataType,
    ) where
        N: Into<SqlIdentifier>,
    {
        let signature = FunctionSignature::new_non_deterministic(name, arg_types, return_type);
        self.scalar
            .insert((signature.name.clone(), signature.arity()), signature);
    }

    /// Resolves a function name applied to the given argument types.
    ///
    /// Operator tokens resolve to operator signatures; anything else must
    /// have been registered. An unknown name or incompatible arguments is a
    /// query error, not an engine bug: resolution happens while plans are
    /// being *built*, before any invariant holds.
    pub fn resolve(&self, name: &str, arg_types: &[DataType]) -> BasaltResult<FunctionSignature> {
        let arity_error = || {
            invalid_query_err!(
                "invalid number of arguments for function `{}`: {}",
                name,
                arg_types.len()
            )
        };

        if let Some(op) = ComparisonOp::from_token(name) {
            let [left, right] = arg_types else {
                return Err(arity_error());
            };
            return Ok(self.comparison(op, *left, *right));
        }
        if let Some(op) = ArithmeticOp::from_token(name) {
            let [left, right] = arg_types else {
                return Err(arity_error());
            };
            let return_type = arithmetic_return_type(*left, *right)
                .ok_or_else(|| invalid_query_err!("cannot apply `{name}` to {left} and {right}"))?;
            return Ok(self.arithmetic(op, return_type, *left, *right));
        }
        if name == FAIL_FUNCTION {
            if arg_types.len() != 2 {
                return Err(arity_error());
            }
            return Ok(self.fail_signature());
        }

        let signature = self
            .scalar
            .get(&(SqlIdentifier::from(name), arg_types.len()))
            .ok_or_else(|| {
                invalid_query_err!(
                    "function `{}` with {} arguments does not exist",
                    name,
                    arg_types.len()
                )
            })?;
        for (actual, declared) in arg_types.iter().zip(signature.arg_types()) {
            if !types_compatible(actual, declared) {
                return Err(invalid_query_err!(
                    "function `{}` cannot be applied to argument of type {} (expected {})",
                    name,
                    actual,
                    declared
                ));
            }
        }
        Ok(signature.clone())
    }

    /// The signature of a binary comparison over the given operand types.
    /// Comparisons always return boolean.
    pub fn comparison(&self, op: ComparisonOp, left: DataType, right: DataType) -> FunctionSignature {
        FunctionSignature::new(op.token(), vec![left, right], DataType::Boolean)
    }

    /// The signature of a binary arithmetic operator with an explicit return
    /// type.
    pub fn arithmetic(
        &self,
        op: ArithmeticOp,
        return_type: DataType,
        left: DataType,
        right: DataType,
    ) -> FunctionSignature {
        FunctionSignature::new(op.token(), vec![left, right], return_type)
    }

    /// The canonical signature of `fail(code, message)`.
    ///
    /// `fail` returns [`DataType::Unknown`], the universal wildcard, so the
    /// call can stand in for any branch of a conditional; callers cast it to
    /// the type they need. It is registered deterministic: for the same
    /// arguments it deterministically raises.
    pub fn fail_signature(&self) -> FunctionSignature {
        FunctionSignature::new(
            FAIL_FUNCTION,
            vec![DataType::BigInt, DataType::Text],
            DataType::Unknown,
        )
    }

    /// The signature of a cast from `from` to `to`.
    pub fn cast(&self, from: DataType, to: DataType) -> FunctionSignature {
        FunctionSignature::new(CAST_FUNCTION, vec![from], to)
    }
}

/// The result type of `left op right`, if the operand types support
/// arithmetic together.
fn arithmetic_return_type(left: DataType, right: DataType) -> Option<DataType> {
    match (left, right) {
        (DataType::Int, DataType::Int) => Some(DataType::Int),
        (DataType::Int | DataType::BigInt, DataType::Int | DataType::BigInt) => {
            Some(DataType::BigInt)
        }
        (DataType::Double, DataType::Int | DataType::BigInt | DataType::Double)
        | (DataType::Int | DataType::BigInt, DataType::Double) => Some(DataType::Double),
        _ => None,
    }
}
