//! Small predicate-manipulation helpers shared by rewrite rules.

use basalt_data::Value;

use crate::{expressions_equivalent, ScalarExpr, SpecialForm};

/// Whether `expr` is the literal TRUE predicate.
pub fn is_true_literal(expr: &ScalarExpr) -> bool {
    matches!(
        expr,
        ScalarExpr::Literal {
            value: Value::Boolean(true),
            ..
        }
    )
}

/// Whether `expr` is the literal FALSE predicate.
pub fn is_false_literal(expr: &ScalarExpr) -> bool {
    matches!(
        expr,
        ScalarExpr::Literal {
            value: Value::Boolean(false),
            ..
        }
    )
}

/// Combines predicates into a single conjunction: nested ANDs are
/// flattened, literal TRUE conjuncts dropped, duplicates (by structural
/// equivalence, so `a > 1` absorbs `1 < a`) removed, and a literal FALSE
/// short-circuits the whole thing.
///
/// An empty input combines to TRUE.
pub fn combine_conjuncts<I>(conjuncts: I) -> ScalarExpr
where
    I: IntoIterator<Item = ScalarExpr>,
{
    fn flatten(expr: ScalarExpr, out: &mut Vec<ScalarExpr>) {
        match expr {
            ScalarExpr::Special {
                form: SpecialForm::And,
                args,
                ..
            } => {
                for arg in args {
                    flatten(arg, out);
                }
            }
            other => out.push(other),
        }
    }

    let mut flat = Vec::new();
    for conjunct in conjuncts {
        flatten(conjunct, &mut flat);
    }

    let mut unique: Vec<ScalarExpr> = Vec::with_capacity(flat.len());
    for conjunct in flat {
        if is_false_literal(&conjunct) {
            return ScalarExpr::FALSE;
        }
        if is_true_literal(&conjunct) {
            continue;
        }
        if !unique
            .iter()
            .any(|seen| expressions_equivalent(seen, &conjunct))
        {
            unique.push(conjunct);
        }
    }

    match unique.len() {
        0 => ScalarExpr::TRUE,
        1 => unique.into_iter().next().unwrap_or(ScalarExpr::TRUE),
        _ => ScalarExpr::and_all(unique),
    }
}

#[cfg(test)]
mod tests {
    use basalt_data::DataType;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ComparisonOp, FunctionRegistry, Symbol};

    fn a_gt_1() -> ScalarExpr {
        let registry = FunctionRegistry::new();
        ScalarExpr::Call {
            signature: registry.comparison(ComparisonOp::Greater, DataType::BigInt, DataType::BigInt),
            args: vec![
                Symbol::new("a", DataType::BigInt).to_expr(),
                ScalarExpr::literal(1i64),
            ],
        }
    }

    fn one_lt_a() -> ScalarExpr {
        let registry = FunctionRegistry::new();
        ScalarExpr::Call {
            signature: registry.comparison(ComparisonOp::Less, DataType::BigInt, DataType::BigInt),
            args: vec![
                ScalarExpr::literal(1i64),
                Symbol::new("a", DataType::BigInt).to_expr(),
            ],
        }
    }

    #[test]
    fn empty_input_is_true() {
        assert_eq!(combine_conjuncts([]), ScalarExpr::TRUE);
    }

    #[test]
    fn true_conjuncts_are_dropped() {
        assert_eq!(
            combine_conjuncts([ScalarExpr::TRUE, a_gt_1(), ScalarExpr::TRUE]),
            a_gt_1()
        );
    }

    #[test]
    fn false_short_circuits() {
        assert_eq!(
            combine_conjuncts([a_gt_1(), ScalarExpr::FALSE]),
            ScalarExpr::FALSE
        );
    }

    #[test]
    fn nested_ands_flatten() {
        let b = Symbol::new("b", DataType::Boolean).to_expr();
        let c = Symbol::new("c", DataType::Boolean).to_expr();
        let combined = combine_conjuncts([ScalarExpr::and(b.clone(), c.clone()), a_gt_1()]);
        assert_eq!(combined, ScalarExpr::and_all(vec![b, c, a_gt_1()]));
    }

    #[test]
    fn flipped_duplicates_are_absorbed() {
        assert_eq!(combine_conjuncts([a_gt_1(), one_lt_a()]), a_gt_1());
    }
}
