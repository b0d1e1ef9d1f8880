//! Decorrelation of scalar subqueries.

use basalt_data::DataType;
use basalt_errors::{error_codes, internal, BasaltResult};
use basalt_expr::{is_true_literal, ScalarExpr};
use basalt_plan::{
    extract_cardinality, Assignments, JoinType, PlanNode, PlanNodeInner, PlanNodeKind,
    PlanNodeSearcher, PlanRef,
};
use tracing::trace;

use crate::context::RuleContext;
use crate::pattern::{Captures, Pattern};
use crate::rule::{Rewrite, Rule};

/// The message raised when a scalar subquery produces more than one row for
/// some outer row. Error reporting matches on this text verbatim.
pub const SUBQUERY_MULTIPLE_ROWS_MESSAGE: &str = "Scalar sub-query has returned multiple rows";

/// Rewrites a correlated lateral join over a scalar subquery so that the
/// subquery's single-row requirement no longer needs a blocking
/// [`EnforceSingleRow`](PlanNodeInner::EnforceSingleRow) inside the
/// correlated side, where no execution strategy can honor it.
///
/// The enforcer is stripped (looking only through projections, which is
/// where scalar-subquery planning puts it). When the stripped subquery
/// provably produces at most one row the join is simply rebuilt around it:
///
/// ```text
/// LateralJoin[inner] (correlation [c])      LateralJoin[left] (correlation [c])
///   scan [a, c]                               scan [a, c]
///   Project [s]                     =>        Project [s]
///     EnforceSingleRow                          Filter (d = c)
///       Filter (d = c)                            scan [d, s]
///         scan [d, s]
/// ```
///
/// keeping the original join type only when the subquery produces exactly
/// one row; a possibly-empty subquery must null-extend, hence LEFT.
///
/// Otherwise the check moves to execution time. Each input row gets a
/// unique id, the join runs as LEFT, and a distinctness marker over the
/// input side then exposes rows that matched more than once, which a
/// filter turns into a query failure:
///
/// ```text
/// Project [a, c, s]
///   Filter (CASE is_distinct WHEN TRUE THEN TRUE
///           ELSE CAST(fail(28, '...') AS boolean) END)
///     MarkDistinct (is_distinct := distinct over [a, c, unique])
///       LateralJoin[left] (correlation [c])
///         AssignUniqueId (unique)
///           scan [a, c]
///         Filter (d = c)
///           scan [d, s]
/// ```
///
/// The marker groups by the unique id so that legitimately duplicate input
/// rows never trip the check; only multiple subquery matches for one and
/// the same input row do.
pub struct DecorrelateScalarSubquery {
    pattern: Pattern,
}

impl DecorrelateScalarSubquery {
    pub fn new() -> Self {
        DecorrelateScalarSubquery {
            pattern: Pattern::node(PlanNodeKind::LateralJoin).matching(|node| {
                matches!(
                    &node.inner,
                    PlanNodeInner::LateralJoin { correlation, filter, .. }
                        if !correlation.is_empty() && is_true_literal(filter)
                )
            }),
        }
    }
}

impl Default for DecorrelateScalarSubquery {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for DecorrelateScalarSubquery {
    fn name(&self) -> &'static str {
        "decorrelate_scalar_subquery"
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn apply(
        &self,
        node: &PlanRef,
        _captures: &Captures,
        ctx: &mut RuleContext<'_>,
    ) -> BasaltResult<Rewrite> {
        let PlanNodeInner::LateralJoin {
            input,
            subquery,
            correlation,
            join_type,
            filter,
        } = &node.inner
        else {
            internal!("decorrelate_scalar_subquery applied to a {:?} node", node.kind());
        };

        let subquery = ctx.lookup().resolve(subquery)?;
        let enforcer_remover = PlanNodeSearcher::new(ctx.lookup())
            .matching(|node| matches!(node.inner, PlanNodeInner::EnforceSingleRow { .. }))
            .recurse_only_when(|node| matches!(node.inner, PlanNodeInner::Project { .. }));
        let Some(stripped) = enforcer_remover.remove_first(&subquery)? else {
            // Not a scalar subquery in the shape this rule handles.
            return Ok(Rewrite::Unchanged);
        };

        let cardinality = extract_cardinality(&stripped, ctx.lookup())?;
        if cardinality.is_at_most_scalar() {
            let join_type = if cardinality.is_scalar() {
                *join_type
            } else {
                JoinType::Left
            };
            trace!(%cardinality, "stripped subquery is provably scalar");
            return Ok(Rewrite::Replaced(PlanNode::shared(
                ctx.next_id(),
                PlanNodeInner::LateralJoin {
                    input: input.clone(),
                    subquery: stripped,
                    correlation: correlation.clone(),
                    join_type,
                    filter: filter.clone(),
                },
            )));
        }

        trace!(%cardinality, "deferring the single-row check to execution time");
        let original_outputs = node.outputs();

        let unique = ctx.new_symbol("unique", DataType::BigInt);
        let with_unique_id = PlanNode::shared(
            ctx.next_id(),
            PlanNodeInner::AssignUniqueId {
                input: input.clone(),
                id_symbol: unique,
            },
        );
        let distinct_symbols = with_unique_id.outputs();
        let join = PlanNode::shared(
            ctx.next_id(),
            PlanNodeInner::LateralJoin {
                input: with_unique_id,
                subquery: stripped,
                correlation: correlation.clone(),
                join_type: JoinType::Left,
                filter: filter.clone(),
            },
        );

        let is_distinct = ctx.new_symbol("is_distinct", DataType::Boolean);
        let mark_distinct = PlanNode::shared(
            ctx.next_id(),
            PlanNodeInner::MarkDistinct {
                input: join,
                marker: is_distinct.clone(),
                distinct_symbols,
            },
        );

        let functions = ctx.functions();
        let fail = ScalarExpr::Call {
            signature: functions.fail_signature(),
            args: vec![
                ScalarExpr::literal(error_codes::SUBQUERY_MULTIPLE_ROWS),
                ScalarExpr::literal(SUBQUERY_MULTIPLE_ROWS_MESSAGE),
            ],
        };
        let at_most_one_match = ScalarExpr::simple_case(
            is_distinct.to_expr(),
            vec![(ScalarExpr::TRUE, ScalarExpr::TRUE)],
            Some(ScalarExpr::Call {
                signature: functions.cast(DataType::Unknown, DataType::Boolean),
                args: vec![fail],
            }),
            DataType::Boolean,
        );
        let checked = PlanNode::shared(
            ctx.next_id(),
            PlanNodeInner::Filter {
                input: mark_distinct,
                predicate: at_most_one_match,
            },
        );

        Ok(Rewrite::Replaced(PlanNode::shared(
            ctx.next_id(),
            PlanNodeInner::Project {
                input: checked,
                assignments: Assignments::identity(&original_outputs),
            },
        )))
    }
}

#[cfg(test)]
mod tests {
    use basalt_data::Value;
    use basalt_expr::{ComparisonOp, FunctionRegistry, FunctionSignature, Symbol};
    use basalt_plan::{AggregateStep, FunctionCall, Lookup, PlanNodeIdAllocator, SymbolAllocator};
    use pretty_assertions::assert_eq;

    use super::*;

    fn orders(ids: &mut PlanNodeIdAllocator) -> PlanRef {
        PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::TableScan {
                table: "orders".into(),
                columns: vec![
                    Symbol::new("o_key", DataType::BigInt),
                    Symbol::new("o_total", DataType::Double),
                ],
            },
        )
    }

    fn parts(ids: &mut PlanNodeIdAllocator) -> PlanRef {
        PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::TableScan {
                table: "parts".into(),
                columns: vec![
                    Symbol::new("p_key", DataType::BigInt),
                    Symbol::new("p_price", DataType::Double),
                ],
            },
        )
    }

    fn correlated_filter(ids: &mut PlanNodeIdAllocator, input: PlanRef) -> PlanRef {
        let registry = FunctionRegistry::new();
        let predicate = ScalarExpr::Call {
            signature: registry.comparison(ComparisonOp::Equal, DataType::BigInt, DataType::BigInt),
            args: vec![
                Symbol::new("p_key", DataType::BigInt).to_expr(),
                Symbol::new("o_key", DataType::BigInt).to_expr(),
            ],
        };
        PlanNode::shared(ids.next_id(), PlanNodeInner::Filter { input, predicate })
    }

    fn price_projection(ids: &mut PlanNodeIdAllocator, input: PlanRef) -> PlanRef {
        PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::Project {
                input,
                assignments: Assignments::new(vec![(
                    Symbol::new("p_price", DataType::Double),
                    Symbol::new("p_price", DataType::Double).to_expr(),
                )]),
            },
        )
    }

    fn lateral_join(
        ids: &mut PlanNodeIdAllocator,
        input: PlanRef,
        subquery: PlanRef,
        join_type: JoinType,
    ) -> PlanRef {
        PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::LateralJoin {
                input,
                subquery,
                correlation: vec![Symbol::new("o_key", DataType::BigInt)],
                join_type,
                filter: ScalarExpr::TRUE,
            },
        )
    }

    fn apply_rule(node: &PlanRef, ids: &mut PlanNodeIdAllocator) -> Rewrite {
        let rule = DecorrelateScalarSubquery::new();
        let mut symbols = SymbolAllocator::new();
        let registry = FunctionRegistry::new();
        let mut ctx = RuleContext {
            lookup: Lookup::no_lookup(),
            ids,
            symbols: &mut symbols,
            functions: &registry,
        };
        let captures = rule
            .pattern()
            .try_match(node, Lookup::no_lookup())
            .unwrap()
            .expect("pattern should match");
        rule.apply(node, &captures, &mut ctx).unwrap()
    }

    #[test]
    fn pattern_requires_correlation_and_a_pass_through_filter() {
        let rule = DecorrelateScalarSubquery::new();
        let mut ids = PlanNodeIdAllocator::new();

        let uncorrelated = PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::LateralJoin {
                input: orders(&mut ids),
                subquery: parts(&mut ids),
                correlation: vec![],
                join_type: JoinType::Inner,
                filter: ScalarExpr::TRUE,
            },
        );
        assert!(rule
            .pattern()
            .try_match(&uncorrelated, Lookup::no_lookup())
            .unwrap()
            .is_none());

        let filtered = PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::LateralJoin {
                input: orders(&mut ids),
                subquery: parts(&mut ids),
                correlation: vec![Symbol::new("o_key", DataType::BigInt)],
                join_type: JoinType::Inner,
                filter: ScalarExpr::FALSE,
            },
        );
        assert!(rule
            .pattern()
            .try_match(&filtered, Lookup::no_lookup())
            .unwrap()
            .is_none());
    }

    #[test]
    fn subquery_without_an_enforcer_is_left_alone() {
        let mut ids = PlanNodeIdAllocator::new();
        let scan = parts(&mut ids);
        let subquery = correlated_filter(&mut ids, scan);
        let outer = orders(&mut ids);
        let join = lateral_join(&mut ids, outer, subquery, JoinType::Inner);

        assert!(matches!(apply_rule(&join, &mut ids), Rewrite::Unchanged));
    }

    #[test]
    fn exactly_one_row_keeps_the_join_type() {
        let mut ids = PlanNodeIdAllocator::new();
        let scan = parts(&mut ids);
        let filtered = correlated_filter(&mut ids, scan);
        // max(p_price) with no grouping: exactly one row.
        let aggregate = PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::Aggregate {
                input: filtered,
                step: AggregateStep::Single,
                group_by: vec![],
                aggregates: vec![(
                    Symbol::new("max_price", DataType::Double),
                    FunctionCall::new(
                        FunctionSignature::new("max", vec![DataType::Double], DataType::Double),
                        vec![Symbol::new("p_price", DataType::Double).to_expr()],
                    ),
                )],
            },
        );
        let enforced = PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::EnforceSingleRow {
                input: aggregate.clone(),
            },
        );
        let outer = orders(&mut ids);
        let join = lateral_join(&mut ids, outer, enforced, JoinType::Inner);

        let Rewrite::Replaced(rewritten) = apply_rule(&join, &mut ids) else {
            panic!("rule should fire");
        };
        let PlanNodeInner::LateralJoin {
            subquery,
            join_type,
            ..
        } = &rewritten.inner
        else {
            panic!("expected a lateral join, got {rewritten:?}");
        };
        assert_eq!(*join_type, JoinType::Inner);
        assert_eq!(subquery, &aggregate);
        assert_eq!(rewritten.outputs(), join.outputs());
    }

    #[test]
    fn possibly_empty_scalar_subquery_null_extends() {
        let mut ids = PlanNodeIdAllocator::new();
        let scan = parts(&mut ids);
        let filtered = correlated_filter(&mut ids, scan);
        // limit 1 proves at most one row but not exactly one.
        let limited = PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::Limit {
                input: filtered,
                count: 1,
            },
        );
        let enforced = PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::EnforceSingleRow { input: limited },
        );
        let outer = orders(&mut ids);
        let join = lateral_join(&mut ids, outer, enforced, JoinType::Inner);

        let Rewrite::Replaced(rewritten) = apply_rule(&join, &mut ids) else {
            panic!("rule should fire");
        };
        let PlanNodeInner::LateralJoin { join_type, .. } = &rewritten.inner else {
            panic!("expected a lateral join, got {rewritten:?}");
        };
        assert_eq!(*join_type, JoinType::Left);
    }

    #[test]
    fn enforcer_is_only_looked_for_through_projections() {
        let mut ids = PlanNodeIdAllocator::new();
        let scan = parts(&mut ids);
        let projected = price_projection(&mut ids, scan);
        let enforced = PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::EnforceSingleRow { input: projected },
        );
        // The enforcer hides under a limit, not a projection: out of scope.
        let buried = PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::Limit {
                input: enforced,
                count: 1,
            },
        );
        let outer = orders(&mut ids);
        let join = lateral_join(&mut ids, outer, buried, JoinType::Inner);

        assert!(matches!(apply_rule(&join, &mut ids), Rewrite::Unchanged));
    }

    #[test]
    fn projections_over_the_enforcer_survive_the_splice() {
        let mut ids = PlanNodeIdAllocator::new();
        let scan = parts(&mut ids);
        let limited = PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::Limit {
                input: correlated_filter(&mut ids, scan),
                count: 1,
            },
        );
        let enforced = PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::EnforceSingleRow {
                input: limited.clone(),
            },
        );
        let projected = price_projection(&mut ids, enforced);
        let outer = orders(&mut ids);
        let join = lateral_join(&mut ids, outer, projected.clone(), JoinType::Inner);

        let Rewrite::Replaced(rewritten) = apply_rule(&join, &mut ids) else {
            panic!("rule should fire");
        };
        let PlanNodeInner::LateralJoin { subquery, .. } = &rewritten.inner else {
            panic!("expected a lateral join, got {rewritten:?}");
        };
        assert_eq!(subquery.id, projected.id);
        let PlanNodeInner::Project { input, .. } = &subquery.inner else {
            panic!("projection should survive the splice, got {subquery:?}");
        };
        assert_eq!(input, &limited);
    }

    #[test]
    fn unprovable_cardinality_defers_the_check_to_execution() {
        let mut ids = PlanNodeIdAllocator::new();
        let scan = parts(&mut ids);
        let filtered = correlated_filter(&mut ids, scan);
        let enforced = PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::EnforceSingleRow { input: filtered },
        );
        let outer = orders(&mut ids);
        let join = lateral_join(&mut ids, outer.clone(), enforced, JoinType::Inner);

        let Rewrite::Replaced(rewritten) = apply_rule(&join, &mut ids) else {
            panic!("rule should fire");
        };

        // Project(identity over the original outputs)
        let PlanNodeInner::Project { input, assignments } = &rewritten.inner else {
            panic!("expected a projection on top, got {rewritten:?}");
        };
        assert!(assignments.is_identity());
        assert_eq!(rewritten.outputs(), join.outputs());

        // Filter(CASE is_distinct WHEN TRUE THEN TRUE ELSE fail END)
        let PlanNodeInner::Filter { input, predicate } = &input.inner else {
            panic!("expected the checking filter, got {input:?}");
        };
        assert_eq!(predicate.ty(), DataType::Boolean);
        let rendered = predicate.to_string();
        assert!(
            rendered.contains("CASE is_distinct_"),
            "unexpected predicate {rendered}"
        );
        assert!(
            rendered.contains(&format!(
                "fail({}, '{}')",
                error_codes::SUBQUERY_MULTIPLE_ROWS,
                SUBQUERY_MULTIPLE_ROWS_MESSAGE
            )),
            "unexpected predicate {rendered}"
        );

        // MarkDistinct over every pre-join symbol including the unique id.
        let PlanNodeInner::MarkDistinct {
            input,
            marker,
            distinct_symbols,
        } = &input.inner
        else {
            panic!("expected a distinctness marker, got {input:?}");
        };
        assert_eq!(marker.ty, DataType::Boolean);
        let unique = Symbol::new("unique_0", DataType::BigInt);
        assert_eq!(
            distinct_symbols,
            &[
                Symbol::new("o_key", DataType::BigInt),
                Symbol::new("o_total", DataType::Double),
                unique.clone(),
            ]
        );

        // LateralJoin[left] over AssignUniqueId over the original input.
        let PlanNodeInner::LateralJoin {
            input,
            subquery,
            join_type,
            ..
        } = &input.inner
        else {
            panic!("expected the rebuilt join, got {input:?}");
        };
        assert_eq!(*join_type, JoinType::Left);
        assert_eq!(
            subquery.kind(),
            PlanNodeKind::Filter,
            "enforcer should be gone"
        );
        let PlanNodeInner::AssignUniqueId { input, id_symbol } = &input.inner else {
            panic!("expected the unique-id assignment, got {input:?}");
        };
        assert_eq!(id_symbol, &unique);
        assert_eq!(input, &outer);
    }

    #[test]
    fn checking_filter_fails_duplicate_rows_at_evaluation_time() {
        use std::collections::HashMap;

        use basalt_errors::BasaltError;
        use basalt_expr::{evaluate, EvalContext};

        let mut ids = PlanNodeIdAllocator::new();
        let scan = parts(&mut ids);
        let filtered = correlated_filter(&mut ids, scan);
        let enforced = PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::EnforceSingleRow { input: filtered },
        );
        let outer = orders(&mut ids);
        let join = lateral_join(&mut ids, outer, enforced, JoinType::Inner);

        let Rewrite::Replaced(rewritten) = apply_rule(&join, &mut ids) else {
            panic!("rule should fire");
        };
        let PlanNodeInner::Project { input, .. } = &rewritten.inner else {
            panic!("expected a projection on top, got {rewritten:?}");
        };
        let PlanNodeInner::Filter { predicate, .. } = &input.inner else {
            panic!("expected the checking filter, got {input:?}");
        };

        let mut variables = HashMap::new();
        variables.insert("is_distinct_1".into(), Value::Boolean(true));
        let ctx = EvalContext::new(&[], &variables);
        assert_eq!(evaluate(predicate, &ctx).unwrap(), Value::Boolean(true));

        variables.insert("is_distinct_1".into(), Value::Boolean(false));
        let ctx = EvalContext::new(&[], &variables);
        match evaluate(predicate, &ctx) {
            Err(BasaltError::QueryFailed { code, message }) => {
                assert_eq!(code, error_codes::SUBQUERY_MULTIPLE_ROWS);
                assert_eq!(message, SUBQUERY_MULTIPLE_ROWS_MESSAGE);
            }
            other => panic!("expected a query failure, got {other:?}"),
        }
    }
}
