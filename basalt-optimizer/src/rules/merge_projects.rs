//! Fusing of adjacent projections.

use basalt_errors::{internal, BasaltResult};
use basalt_expr::is_deterministic;
use basalt_plan::{Assignments, PlanNode, PlanNodeInner, PlanNodeKind, PlanRef};

use crate::context::RuleContext;
use crate::pattern::{Captures, Pattern};
use crate::rule::{Rewrite, Rule};

const CHILD: &str = "child_project";

/// Inlines a projection's child projection, rewriting the parent's
/// expressions in terms of the grandchild's symbols.
///
/// Inlining duplicates a child expression wherever the parent references
/// its symbol more than once, and drops it where the parent never does.
/// Either changes how often the expression is evaluated, so the rule backs
/// off unless every child expression is deterministic.
pub struct MergeProjects {
    pattern: Pattern,
}

impl MergeProjects {
    pub fn new() -> Self {
        MergeProjects {
            pattern: Pattern::node(PlanNodeKind::Project)
                .with_child(0, Pattern::node(PlanNodeKind::Project).capturing_as(CHILD)),
        }
    }
}

impl Default for MergeProjects {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for MergeProjects {
    fn name(&self) -> &'static str {
        "merge_projects"
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn apply(
        &self,
        node: &PlanRef,
        captures: &Captures,
        ctx: &mut RuleContext<'_>,
    ) -> BasaltResult<Rewrite> {
        let PlanNodeInner::Project { assignments, .. } = &node.inner else {
            internal!("merge_projects applied to a {:?} node", node.kind());
        };
        let child = captures.get(CHILD)?;
        let PlanNodeInner::Project {
            input,
            assignments: child_assignments,
        } = &child.inner
        else {
            internal!("merge_projects captured a {:?} node", child.kind());
        };

        if !child_assignments.expressions().all(is_deterministic) {
            return Ok(Rewrite::Unchanged);
        }

        let inlined = assignments
            .iter()
            .map(|(target, expr)| {
                let expr = expr
                    .substitute_variables(&|symbol| child_assignments.get(symbol).cloned());
                (target.clone(), expr)
            })
            .collect::<Assignments>();
        Ok(Rewrite::Replaced(PlanNode::shared(
            ctx.next_id(),
            PlanNodeInner::Project {
                input: input.clone(),
                assignments: inlined,
            },
        )))
    }
}

#[cfg(test)]
mod tests {
    use basalt_data::DataType;
    use basalt_expr::{
        ArithmeticOp, FunctionRegistry, FunctionSignature, ScalarExpr, Symbol,
    };
    use basalt_plan::{Lookup, PlanNodeIdAllocator, SymbolAllocator};
    use pretty_assertions::assert_eq;

    use super::*;

    fn a() -> Symbol {
        Symbol::new("a", DataType::BigInt)
    }

    fn scan(ids: &mut PlanNodeIdAllocator) -> PlanRef {
        PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::TableScan {
                table: "t".into(),
                columns: vec![a()],
            },
        )
    }

    fn project(ids: &mut PlanNodeIdAllocator, input: PlanRef, assignments: Assignments) -> PlanRef {
        PlanNode::shared(ids.next_id(), PlanNodeInner::Project { input, assignments })
    }

    fn plus_one(expr: ScalarExpr) -> ScalarExpr {
        let registry = FunctionRegistry::new();
        ScalarExpr::Call {
            signature: registry.arithmetic(
                ArithmeticOp::Add,
                DataType::BigInt,
                DataType::BigInt,
                DataType::BigInt,
            ),
            args: vec![expr, ScalarExpr::literal(1i64)],
        }
    }

    fn apply_to(node: &PlanRef, ids: &mut PlanNodeIdAllocator) -> Rewrite {
        let rule = MergeProjects::new();
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
    fn inlines_child_expressions() {
        let mut ids = PlanNodeIdAllocator::new();
        let source = scan(&mut ids);
        let b = Symbol::new("b", DataType::BigInt);
        let child = project(
            &mut ids,
            source,
            Assignments::new(vec![(b.clone(), plus_one(a().to_expr()))]),
        );
        let c = Symbol::new("c", DataType::BigInt);
        let parent = project(
            &mut ids,
            child,
            Assignments::new(vec![(c.clone(), plus_one(b.to_expr()))]),
        );

        let Rewrite::Replaced(merged) = apply_to(&parent, &mut ids) else {
            panic!("rule should fire");
        };
        let PlanNodeInner::Project { input, assignments } = &merged.inner else {
            panic!("expected a projection, got {merged:?}");
        };
        assert_eq!(input.kind(), PlanNodeKind::TableScan);
        assert_eq!(
            *assignments,
            Assignments::new(vec![(c, plus_one(plus_one(a().to_expr())))])
        );
    }

    #[test]
    fn backs_off_on_non_deterministic_child_expressions() {
        let mut ids = PlanNodeIdAllocator::new();
        let source = scan(&mut ids);
        let r = Symbol::new("r", DataType::Double);
        let random = ScalarExpr::Call {
            signature: FunctionSignature::new_non_deterministic("random", vec![], DataType::Double),
            args: vec![],
        };
        let child = project(
            &mut ids,
            source,
            Assignments::new(vec![(r.clone(), random)]),
        );
        let s = Symbol::new("s", DataType::Double);
        let parent = project(
            &mut ids,
            child,
            Assignments::new(vec![(s, r.to_expr())]),
        );

        assert!(matches!(
            apply_to(&parent, &mut ids),
            Rewrite::Unchanged
        ));
    }

    #[test]
    fn identity_child_disappears() {
        let mut ids = PlanNodeIdAllocator::new();
        let source = scan(&mut ids);
        let child = project(&mut ids, source, Assignments::identity(&[a()]));
        let b = Symbol::new("b", DataType::BigInt);
        let parent = project(
            &mut ids,
            child,
            Assignments::new(vec![(b.clone(), plus_one(a().to_expr()))]),
        );

        let Rewrite::Replaced(merged) = apply_to(&parent, &mut ids) else {
            panic!("rule should fire");
        };
        let PlanNodeInner::Project { input, assignments } = &merged.inner else {
            panic!("expected a projection, got {merged:?}");
        };
        assert_eq!(input.kind(), PlanNodeKind::TableScan);
        assert_eq!(
            *assignments,
            Assignments::new(vec![(b, plus_one(a().to_expr()))])
        );
    }
}
