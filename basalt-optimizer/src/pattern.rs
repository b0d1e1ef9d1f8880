//! Structural patterns over memo-resident plans.

use std::collections::HashMap;

use basalt_errors::{internal_err, BasaltResult};
use basalt_plan::{Lookup, NodePredicate, PlanNodeKind, PlanRef};

/// The nodes a successful [`Pattern`] match captured by name.
#[derive(Debug, Default)]
pub struct Captures {
    captured: HashMap<&'static str, PlanRef>,
}

impl Captures {
    /// The node captured under `name`. Asking for a name the matched
    /// pattern never declared is a bug in the rule.
    pub fn get(&self, name: &str) -> BasaltResult<&PlanRef> {
        self.captured
            .get(name)
            .ok_or_else(|| internal_err!("no capture named `{name}`"))
    }
}

/// A structural predicate over plan nodes, built fluently:
///
/// ```
/// use basalt_optimizer::Pattern;
/// use basalt_plan::PlanNodeKind;
///
/// let two_stacked_filters = Pattern::node(PlanNodeKind::Filter)
///     .with_child(0, Pattern::node(PlanNodeKind::Filter).capturing_as("child"));
/// ```
///
/// Matching resolves group references through a [`Lookup`], but only where
/// the pattern actually looks: a child position without a sub-pattern is
/// never resolved, so rules pay only for the structure they inspect.
pub struct Pattern {
    kind: Option<PlanNodeKind>,
    predicates: Vec<NodePredicate>,
    capture: Option<&'static str>,
    children: Vec<(usize, Pattern)>,
}

impl Pattern {
    /// Matches any node.
    pub fn any() -> Self {
        Pattern {
            kind: None,
            predicates: Vec::new(),
            capture: None,
            children: Vec::new(),
        }
    }

    /// Matches nodes of `kind`.
    pub fn node(kind: PlanNodeKind) -> Self {
        Pattern {
            kind: Some(kind),
            ..Self::any()
        }
    }

    /// Adds a predicate the resolved node must satisfy. Predicates must be
    /// pure functions of the node: the driver may re-evaluate a pattern
    /// against the same node any number of times.
    pub fn matching(mut self, predicate: NodePredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Captures the node this (sub-)pattern matches under `name`, making it
    /// available through [`Captures::get`].
    pub fn capturing_as(mut self, name: &'static str) -> Self {
        self.capture = Some(name);
        self
    }

    /// Requires the child at `position` to match `pattern`. The child is
    /// resolved out of the memo while matching.
    pub fn with_child(mut self, position: usize, pattern: Pattern) -> Self {
        self.children.push((position, pattern));
        self
    }

    /// Tests `node` against this pattern, resolving group references
    /// through `lookup` as needed. `Some` carries the captured nodes.
    pub fn try_match(&self, node: &PlanRef, lookup: Lookup<'_>) -> BasaltResult<Option<Captures>> {
        let mut captures = Captures::default();
        if self.match_into(node, lookup, &mut captures)? {
            Ok(Some(captures))
        } else {
            Ok(None)
        }
    }

    fn match_into(
        &self,
        node: &PlanRef,
        lookup: Lookup<'_>,
        captures: &mut Captures,
    ) -> BasaltResult<bool> {
        let node = lookup.resolve(node)?;
        if let Some(kind) = self.kind {
            if node.kind() != kind {
                return Ok(false);
            }
        }
        if !self.predicates.iter().all(|predicate| predicate(&node)) {
            return Ok(false);
        }
        if let Some(name) = self.capture {
            captures.captured.insert(name, node.clone());
        }
        for (position, sub) in &self.children {
            let children = node.children();
            let Some(child) = children.get(*position) else {
                return Ok(false);
            };
            if !sub.match_into(child, lookup, captures)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use basalt_data::DataType;
    use basalt_expr::{ScalarExpr, Symbol};
    use basalt_plan::{GroupId, PlanNode, PlanNodeId, PlanNodeInner};

    use super::*;

    fn scan(id: u32) -> PlanRef {
        PlanNode::shared(
            PlanNodeId(id),
            PlanNodeInner::TableScan {
                table: "t".into(),
                columns: vec![Symbol::new("a", DataType::BigInt)],
            },
        )
    }

    fn filter(id: u32, input: PlanRef, predicate: ScalarExpr) -> PlanRef {
        PlanNode::shared(PlanNodeId(id), PlanNodeInner::Filter { input, predicate })
    }

    #[test]
    fn kind_and_predicates_gate_matching() {
        let pattern = Pattern::node(PlanNodeKind::Filter)
            .matching(|node| matches!(&node.inner, PlanNodeInner::Filter { predicate, .. } if basalt_expr::is_true_literal(predicate)));

        let trivial = filter(1, scan(0), ScalarExpr::TRUE);
        assert!(pattern
            .try_match(&trivial, Lookup::no_lookup())
            .unwrap()
            .is_some());

        let nontrivial = filter(2, scan(0), ScalarExpr::FALSE);
        assert!(pattern
            .try_match(&nontrivial, Lookup::no_lookup())
            .unwrap()
            .is_none());

        assert!(pattern
            .try_match(&scan(3), Lookup::no_lookup())
            .unwrap()
            .is_none());
    }

    #[test]
    fn child_patterns_descend_and_capture() {
        let inner = filter(1, scan(0), ScalarExpr::FALSE);
        let outer = filter(2, inner.clone(), ScalarExpr::TRUE);

        let pattern = Pattern::node(PlanNodeKind::Filter)
            .with_child(0, Pattern::node(PlanNodeKind::Filter).capturing_as("child"));
        let captures = pattern
            .try_match(&outer, Lookup::no_lookup())
            .unwrap()
            .unwrap();

        assert_eq!(captures.get("child").unwrap(), &inner);
        assert!(captures.get("nothing").unwrap_err().is_internal());
    }

    #[test]
    fn child_pattern_on_a_scan_cannot_match() {
        let pattern = Pattern::node(PlanNodeKind::TableScan).with_child(0, Pattern::any());
        assert!(pattern
            .try_match(&scan(0), Lookup::no_lookup())
            .unwrap()
            .is_none());
    }

    #[test]
    fn unexamined_children_are_never_resolved() {
        // The input is a dangling group reference: touching it without a
        // memo errors, so a successful match proves the child stayed lazy.
        let dangling = PlanNode::shared(
            PlanNodeId(7),
            PlanNodeInner::GroupReference {
                group: GroupId::new(42),
                outputs: vec![Symbol::new("a", DataType::BigInt)],
            },
        );
        let node = filter(8, dangling, ScalarExpr::TRUE);

        let shallow = Pattern::node(PlanNodeKind::Filter);
        assert!(shallow
            .try_match(&node, Lookup::no_lookup())
            .unwrap()
            .is_some());

        let deep = Pattern::node(PlanNodeKind::Filter).with_child(0, Pattern::any());
        assert!(deep
            .try_match(&node, Lookup::no_lookup())
            .unwrap_err()
            .is_internal());
    }
}
