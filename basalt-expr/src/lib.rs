//! Scalar expression IR for the basalt planner.
//!
//! Expressions are a closed sum type ([`ScalarExpr`]) built by earlier
//! planning stages and by rewrite rules. Every expression knows its
//! [`DataType`] via [`ScalarExpr::ty`]; function applications carry the
//! [`FunctionSignature`] they resolved to, so analyses never need to consult
//! the registry again.
//!
//! The companion analyses live in submodules:
//!
//! - [`determinism`]: is an expression safe to duplicate or reorder?
//! - [`equivalence`]: structural equality modulo flipped comparisons.
//! - [`typecheck`]: recompute an expression's actual type bottom-up.
//! - [`eval`]: a small interpreter, used to exercise rewritten predicates
//!   (notably the deferred `fail()` channel) without a real executor.

use std::fmt;

use basalt_data::{DataType, SqlIdentifier, Value};
use serde::{Deserialize, Serialize};

pub mod determinism;
pub mod equivalence;
pub mod eval;
pub mod functions;
pub mod typecheck;
pub mod utils;

pub use determinism::is_deterministic;
pub use equivalence::expressions_equivalent;
pub use eval::{evaluate, EvalContext};
pub use functions::{FunctionRegistry, FunctionSignature};
pub use typecheck::{actual_type, types_compatible};
pub use utils::{combine_conjuncts, is_false_literal, is_true_literal};

/// A named column produced by a plan node, with its declared semantic type.
///
/// Symbols are unique within one compilation: the planner and every rewrite
/// rule obtain fresh ones from the compilation's symbol allocator and never
/// invent names by hand.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol {
    pub name: SqlIdentifier,
    pub ty: DataType,
}

impl Symbol {
    pub fn new<N>(name: N, ty: DataType) -> Self
    where
        N: Into<SqlIdentifier>,
    {
        Symbol {
            name: name.into(),
            ty,
        }
    }

    /// A [`ScalarExpr::Variable`] referencing this symbol.
    pub fn to_expr(&self) -> ScalarExpr {
        ScalarExpr::Variable(self.clone())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A comparison operator, as it appears in [`ScalarExpr::Call`] signatures
/// under its SQL token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl ComparisonOp {
    /// The SQL token for this operator, which is also the function name its
    /// signatures are registered under.
    pub fn token(self) -> &'static str {
        match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "<>",
            ComparisonOp::Less => "<",
            ComparisonOp::LessOrEqual => "<=",
            ComparisonOp::Greater => ">",
            ComparisonOp::GreaterOrEqual => ">=",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "=" => Some(ComparisonOp::Equal),
            "<>" => Some(ComparisonOp::NotEqual),
            "<" => Some(ComparisonOp::Less),
            "<=" => Some(ComparisonOp::LessOrEqual),
            ">" => Some(ComparisonOp::Greater),
            ">=" => Some(ComparisonOp::GreaterOrEqual),
            _ => None,
        }
    }

    /// The operator that yields the same result with its operands swapped:
    /// `a < b` iff `b > a`. Equality and inequality flip to themselves.
    pub fn flip(self) -> Self {
        match self {
            ComparisonOp::Equal => ComparisonOp::Equal,
            ComparisonOp::NotEqual => ComparisonOp::NotEqual,
            ComparisonOp::Less => ComparisonOp::Greater,
            ComparisonOp::LessOrEqual => ComparisonOp::GreaterOrEqual,
            ComparisonOp::Greater => ComparisonOp::Less,
            ComparisonOp::GreaterOrEqual => ComparisonOp::LessOrEqual,
        }
    }

    /// Whether this operator compares order rather than just equality.
    pub fn is_ordering_comparison(self) -> bool {
        matches!(
            self,
            ComparisonOp::Less
                | ComparisonOp::LessOrEqual
                | ComparisonOp::Greater
                | ComparisonOp::GreaterOrEqual
        )
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// An arithmetic operator token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOp {
    pub fn token(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "+" => Some(ArithmeticOp::Add),
            "-" => Some(ArithmeticOp::Subtract),
            "*" => Some(ArithmeticOp::Multiply),
            "/" => Some(ArithmeticOp::Divide),
            _ => None,
        }
    }
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Control-flow-like constructs that are not ordinary function calls because
/// they evaluate their arguments non-strictly.
///
/// Argument encodings (enforced by the smart constructors on
/// [`ScalarExpr`]):
///
/// - `And` / `Or`: two or more boolean arguments.
/// - `If`: exactly `[condition, then, else]`.
/// - `SimpleCase`: `[operand, when₁, result₁, …, whenₙ, resultₙ]` with an
///   optional trailing default; the default is present iff the argument
///   count is even.
/// - `Coalesce`: one or more arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialForm {
    And,
    Or,
    If,
    SimpleCase,
    Coalesce,
}

/// A scalar expression in a query plan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarExpr {
    /// A constant with an explicit type. A typed NULL is
    /// `Literal { value: Value::Null, ty }`.
    Literal { value: Value, ty: DataType },

    /// Positional reference into the operator's input row.
    InputRef { index: usize, ty: DataType },

    /// Reference to a plan symbol by name.
    Variable(Symbol),

    /// Application of a resolved function signature.
    ///
    /// Invariant: `args.len()` equals the signature's arity. The signature
    /// is resolved against the compilation's function registry when the
    /// call is built, never re-resolved afterwards.
    Call {
        signature: FunctionSignature,
        args: Vec<ScalarExpr>,
    },

    /// A special form; see [`SpecialForm`] for the argument encodings.
    Special {
        form: SpecialForm,
        args: Vec<ScalarExpr>,
        ty: DataType,
    },

    /// An anonymous function argument to a higher-order call. Has no SQL
    /// type of its own; [`ScalarExpr::ty`] reports [`DataType::Unknown`].
    Lambda {
        params: Vec<Symbol>,
        body: Box<ScalarExpr>,
    },
}

impl ScalarExpr {
    pub const TRUE: ScalarExpr = ScalarExpr::Literal {
        value: Value::Boolean(true),
        ty: DataType::Boolean,
    };

    pub const FALSE: ScalarExpr = ScalarExpr::Literal {
        value: Value::Boolean(false),
        ty: DataType::Boolean,
    };

    /// A literal whose type is inferred from the value.
    pub fn literal<V>(value: V) -> Self
    where
        V: Into<Value>,
    {
        let value = value.into();
        let ty = value.infer_type();
        ScalarExpr::Literal { value, ty }
    }

    /// A NULL literal carrying the given declared type.
    pub fn null(ty: DataType) -> Self {
        ScalarExpr::Literal {
            value: Value::Null,
            ty,
        }
    }

    /// Binary conjunction. Use [`combine_conjuncts`] to fold many
    /// predicates with flattening and deduplication.
    pub fn and(left: ScalarExpr, right: ScalarExpr) -> Self {
        ScalarExpr::Special {
            form: SpecialForm::And,
            args: vec![left, right],
            ty: DataType::Boolean,
        }
    }

    pub fn or(left: ScalarExpr, right: ScalarExpr) -> Self {
        ScalarExpr::Special {
            form: SpecialForm::Or,
            args: vec![left, right],
            ty: DataType::Boolean,
        }
    }

    /// N-ary conjunction over an already-prepared argument list.
    pub fn and_all(args: Vec<ScalarExpr>) -> Self {
        debug_assert!(args.len() >= 2);
        ScalarExpr::Special {
            form: SpecialForm::And,
            args,
            ty: DataType::Boolean,
        }
    }

    pub fn if_then_else(
        condition: ScalarExpr,
        then: ScalarExpr,
        otherwise: ScalarExpr,
        ty: DataType,
    ) -> Self {
        ScalarExpr::Special {
            form: SpecialForm::If,
            args: vec![condition, then, otherwise],
            ty,
        }
    }

    /// `CASE operand WHEN … THEN … [ELSE default] END` with the declared
    /// result type.
    pub fn simple_case(
        operand: ScalarExpr,
        whens: Vec<(ScalarExpr, ScalarExpr)>,
        default: Option<ScalarExpr>,
        ty: DataType,
    ) -> Self {
        let mut args = Vec::with_capacity(1 + whens.len() * 2 + usize::from(default.is_some()));
        args.push(operand);
        for (when, result) in whens {
            args.push(when);
            args.push(result);
        }
        if let Some(default) = default {
            args.push(default);
        }
        ScalarExpr::Special {
            form: SpecialForm::SimpleCase,
            args,
            ty,
        }
    }

    pub fn coalesce(args: Vec<ScalarExpr>, ty: DataType) -> Self {
        debug_assert!(!args.is_empty());
        ScalarExpr::Special {
            form: SpecialForm::Coalesce,
            args,
            ty,
        }
    }

    /// The declared type of this expression.
    ///
    /// For calls this is the signature's return type; for lambdas, which
    /// have no SQL type of their own, it is [`DataType::Unknown`].
    pub fn ty(&self) -> DataType {
        match self {
            ScalarExpr::Literal { ty, .. } | ScalarExpr::InputRef { ty, .. } => *ty,
            ScalarExpr::Variable(symbol) => symbol.ty,
            ScalarExpr::Call { signature, .. } => signature.return_type(),
            ScalarExpr::Special { ty, .. } => *ty,
            ScalarExpr::Lambda { .. } => DataType::Unknown,
        }
    }

    /// The symbols this expression references, in first-appearance order.
    pub fn referenced_symbols(&self) -> Vec<Symbol> {
        fn walk(expr: &ScalarExpr, out: &mut Vec<Symbol>) {
            match expr {
                ScalarExpr::Literal { .. } | ScalarExpr::InputRef { .. } => {}
                ScalarExpr::Variable(symbol) => {
                    if !out.contains(symbol) {
                        out.push(symbol.clone());
                    }
                }
                ScalarExpr::Call { args, .. } | ScalarExpr::Special { args, .. } => {
                    for arg in args {
                        walk(arg, out);
                    }
                }
                ScalarExpr::Lambda { body, .. } => walk(body, out),
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }

    /// Replaces every [`ScalarExpr::Variable`] for which `subst` returns a
    /// replacement, leaving other expressions untouched. Used by rules that
    /// inline one operator's assignments into another's expressions.
    pub fn substitute_variables<F>(&self, subst: &F) -> ScalarExpr
    where
        F: Fn(&Symbol) -> Option<ScalarExpr>,
    {
        match self {
            ScalarExpr::Variable(symbol) => {
                subst(symbol).unwrap_or_else(|| self.clone())
            }
            ScalarExpr::Literal { .. } | ScalarExpr::InputRef { .. } => self.clone(),
            ScalarExpr::Call { signature, args } => ScalarExpr::Call {
                signature: signature.clone(),
                args: args.iter().map(|a| a.substitute_variables(subst)).collect(),
            },
            ScalarExpr::Special { form, args, ty } => ScalarExpr::Special {
                form: *form,
                args: args.iter().map(|a| a.substitute_variables(subst)).collect(),
                ty: *ty,
            },
            ScalarExpr::Lambda { params, body } => ScalarExpr::Lambda {
                params: params.clone(),
                body: Box::new(body.substitute_variables(subst)),
            },
        }
    }
}

impl From<Symbol> for ScalarExpr {
    fn from(symbol: Symbol) -> Self {
        ScalarExpr::Variable(symbol)
    }
}

impl fmt::Display for ScalarExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use itertools::Itertools;

        match self {
            ScalarExpr::Literal { value, .. } => write!(f, "{value}"),
            ScalarExpr::InputRef { index, .. } => write!(f, "${index}"),
            ScalarExpr::Variable(symbol) => write!(f, "{symbol}"),
            ScalarExpr::Call { signature, args } => {
                // Operator tokens render infix, everything else as a call.
                if args.len() == 2
                    && (ComparisonOp::from_token(signature.name()).is_some()
                        || ArithmeticOp::from_token(signature.name()).is_some())
                {
                    write!(f, "({} {} {})", args[0], signature.name(), args[1])
                } else {
                    write!(f, "{}({})", signature.name(), args.iter().join(", "))
                }
            }
            ScalarExpr::Special { form, args, .. } => match form {
                SpecialForm::And => write!(f, "({})", args.iter().join(" AND ")),
                SpecialForm::Or => write!(f, "({})", args.iter().join(" OR ")),
                SpecialForm::If => {
                    write!(f, "IF({}, {}, {})", args[0], args[1], args[2])
                }
                SpecialForm::SimpleCase => {
                    write!(f, "CASE {}", args[0])?;
                    // Default is present iff the argument count is even.
                    let has_default = args.len() % 2 == 0;
                    let pairs_end = args.len() - usize::from(has_default);
                    let mut i = 1;
                    while i < pairs_end {
                        write!(f, " WHEN {} THEN {}", args[i], args[i + 1])?;
                        i += 2;
                    }
                    if has_default {
                        write!(f, " ELSE {}", args[args.len() - 1])?;
                    }
                    f.write_str(" END")
                }
                SpecialForm::Coalesce => {
                    write!(f, "COALESCE({})", args.iter().join(", "))
                }
            },
            ScalarExpr::Lambda { params, body } => {
                write!(f, "({}) -> {}", params.iter().join(", "), body)
            }
        }
    }
}
