//! The arena rewrites happen in.
//!
//! Loading a plan into a [`Memo`] assigns every node to a *group* and
//! rewires each parent-child link to go through a
//! [`PlanNodeInner::GroupReference`]. The concrete node standing in for a
//! group is its *representative*; [`Memo::replace`] swaps a representative
//! atomically, so every parent referring to the group sees the new node on
//! its next resolution without any tree surgery.

use std::sync::Arc;

use basalt_errors::{internal, internal_err, invariant, BasaltResult};
use itertools::Itertools;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use tracing::trace;

use crate::allocator::PlanNodeIdAllocator;
use crate::node::{PlanNode, PlanNodeInner, PlanRef};

/// Stable handle to a memo group.
pub type GroupId = NodeIndex;

/// The memo arena. See the [module documentation](self) for the model.
///
/// Groups are never retired: a compilation's memo lives for one driver run,
/// and a handful of superseded representatives is not worth an eviction
/// scheme.
#[derive(Debug)]
pub struct Memo {
    /// Group representatives, with position-labelled edges to the groups
    /// their children refer to.
    graph: StableDiGraph<PlanRef, usize>,
    root: GroupId,
}

impl Memo {
    /// Loads `plan` into a fresh memo, interning every node bottom-up.
    ///
    /// Group references inside `plan` are accepted and resolve to the groups
    /// they already name, which is what lets [`Memo::replace`] reuse this
    /// path for rule output.
    pub fn new(plan: PlanRef, ids: &mut PlanNodeIdAllocator) -> BasaltResult<Memo> {
        let mut graph = StableDiGraph::new();
        let root = intern(&mut graph, ids, &plan)?;
        let memo = Memo { graph, root };
        trace!(groups = memo.group_count(), "loaded plan into memo");
        Ok(memo)
    }

    /// The group holding the plan root.
    pub fn root(&self) -> GroupId {
        self.root
    }

    pub fn group_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Every group and its current representative.
    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &PlanRef)> {
        self.graph.node_indices().map(|group| (group, &self.graph[group]))
    }

    /// The current representative of `group`.
    ///
    /// A handle this memo never issued is a planner bug, reported as an
    /// internal error rather than a panic.
    pub fn resolve(&self, group: GroupId) -> BasaltResult<&PlanRef> {
        self.graph
            .node_weight(group)
            .ok_or_else(|| internal_err!("unknown plan group g{}", group.index()))
    }

    pub fn lookup(&self) -> Lookup<'_> {
        Lookup::new(self)
    }

    /// Atomically replaces the representative of `group` with `node`.
    ///
    /// Concrete children of `node` are interned as new groups; reference
    /// children keep pointing at the groups they already name. The
    /// replacement must output the same symbol set as the node it replaces,
    /// since parents were built against those symbols.
    pub fn replace(
        &mut self,
        group: GroupId,
        node: PlanRef,
        ids: &mut PlanNodeIdAllocator,
    ) -> BasaltResult<()> {
        invariant!(
            node.as_group() != Some(group),
            "group g{} cannot reference itself",
            group.index()
        );
        let current = self.resolve(group)?.clone();
        let mut old_outputs = current.outputs();
        let mut new_outputs = node.outputs();
        old_outputs.sort();
        old_outputs.dedup();
        new_outputs.sort();
        new_outputs.dedup();
        invariant!(
            old_outputs == new_outputs,
            "rewrite changed the outputs of group g{} from [{}] to [{}]",
            group.index(),
            current.outputs().iter().join(", "),
            node.outputs().iter().join(", "),
        );

        let (rewritten, child_groups) = insert_children(&mut self.graph, ids, &node)?;
        let old_edges: Vec<_> = self.graph.edges(group).map(|edge| edge.id()).collect();
        for edge in old_edges {
            self.graph.remove_edge(edge);
        }
        for (position, child_group) in child_groups.into_iter().enumerate() {
            self.graph.add_edge(group, child_group, position);
        }
        *self
            .graph
            .node_weight_mut(group)
            .ok_or_else(|| internal_err!("unknown plan group g{}", group.index()))? = rewritten;
        trace!(group = group.index(), "replaced group representative");
        Ok(())
    }

    /// Materializes the reference-free plan currently rooted at the root
    /// group.
    pub fn extract(&self) -> BasaltResult<PlanRef> {
        self.extract_group(self.root)
    }

    /// Materializes the reference-free plan currently rooted at `group`.
    pub fn extract_group(&self, group: GroupId) -> BasaltResult<PlanRef> {
        let representative = self.resolve(group)?.clone();
        self.extract_node(&representative)
    }

    fn extract_node(&self, node: &PlanRef) -> BasaltResult<PlanRef> {
        if let Some(group) = node.as_group() {
            return self.extract_group(group);
        }
        if node.children().is_empty() {
            return Ok(node.clone());
        }
        let children = node
            .children()
            .into_iter()
            .map(|child| self.extract_node(child))
            .collect::<BasaltResult<Vec<_>>>()?;
        Ok(Arc::new(node.replace_children(children)?))
    }
}

/// Interns `node` (and its subtree) and returns its group.
fn intern(
    graph: &mut StableDiGraph<PlanRef, usize>,
    ids: &mut PlanNodeIdAllocator,
    node: &PlanRef,
) -> BasaltResult<GroupId> {
    if let Some(group) = node.as_group() {
        invariant!(
            graph.contains_node(group),
            "reference to unknown group g{}",
            group.index()
        );
        return Ok(group);
    }
    let (rewritten, child_groups) = insert_children(graph, ids, node)?;
    let group = graph.add_node(rewritten);
    for (position, child_group) in child_groups.into_iter().enumerate() {
        graph.add_edge(group, child_group, position);
    }
    Ok(group)
}

/// Interns `node`'s children and returns the node rewritten to refer to them
/// through fresh group references, along with the child groups in position
/// order.
fn insert_children(
    graph: &mut StableDiGraph<PlanRef, usize>,
    ids: &mut PlanNodeIdAllocator,
    node: &PlanRef,
) -> BasaltResult<(PlanRef, Vec<GroupId>)> {
    let mut child_groups = Vec::new();
    let mut reference_children = Vec::new();
    for child in node.children() {
        let group = intern(graph, ids, child)?;
        child_groups.push(group);
        reference_children.push(PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::GroupReference {
                group,
                outputs: child.outputs(),
            },
        ));
    }
    let rewritten = if reference_children.is_empty() {
        node.clone()
    } else {
        Arc::new(node.replace_children(reference_children)?)
    };
    Ok((rewritten, child_groups))
}

/// Resolves group references to the node currently representing the group.
///
/// Rules and analyses receive a `Lookup` rather than the memo itself:
/// resolution is the only memo operation they need while inspecting plans,
/// and it is the identity on concrete nodes, so callers stay oblivious to
/// whether a plan is memo-resident at all.
#[derive(Clone, Copy)]
pub struct Lookup<'a> {
    memo: Option<&'a Memo>,
}

impl<'a> Lookup<'a> {
    pub fn new(memo: &'a Memo) -> Self {
        Lookup { memo: Some(memo) }
    }

    /// A lookup for plans that are not memo-resident: the identity on
    /// concrete nodes, an internal error on group references.
    pub fn no_lookup() -> Lookup<'static> {
        Lookup { memo: None }
    }

    /// The concrete node `node` stands for: `node` itself if it is concrete,
    /// otherwise the current representative of the group it references.
    pub fn resolve(&self, node: &PlanRef) -> BasaltResult<PlanRef> {
        let mut current = node.clone();
        // replace() can install a reference as a representative, so chase
        // chains; a chain longer than the group count means a cycle.
        let mut hops = 0;
        while let Some(group) = current.as_group() {
            let Some(memo) = self.memo else {
                internal!("group reference g{} outside any memo", group.index());
            };
            invariant!(
                hops <= memo.group_count(),
                "reference cycle through group g{}",
                group.index()
            );
            current = memo.resolve(group)?.clone();
            hops += 1;
        }
        Ok(current)
    }

    /// The current representative of `group`, chasing reference chains.
    pub fn resolve_group(&self, group: GroupId) -> BasaltResult<PlanRef> {
        let Some(memo) = self.memo else {
            internal!("group reference g{} outside any memo", group.index());
        };
        let representative = memo.resolve(group)?.clone();
        self.resolve(&representative)
    }
}

#[cfg(test)]
mod tests {
    use basalt_data::{DataType, Value};
    use basalt_expr::{ScalarExpr, Symbol};
    use pretty_assertions::assert_eq;
    use vec1::Vec1;

    use super::*;
    use crate::node::PlanNodeKind;

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

    fn filter_over_scan(ids: &mut PlanNodeIdAllocator) -> PlanRef {
        let input = scan(ids);
        PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::Filter {
                input,
                predicate: ScalarExpr::TRUE,
            },
        )
    }

    fn assert_reference_free(node: &PlanRef) {
        assert!(node.as_group().is_none(), "unexpected reference: {node}");
        for child in node.children() {
            assert_reference_free(child);
        }
    }

    #[test]
    fn interning_rewrites_children_to_references() {
        let mut ids = PlanNodeIdAllocator::new();
        let plan = filter_over_scan(&mut ids);
        let memo = Memo::new(plan, &mut ids).unwrap();

        assert_eq!(memo.group_count(), 2);
        let root = memo.resolve(memo.root()).unwrap();
        assert_eq!(root.kind(), PlanNodeKind::Filter);
        let child = root.children()[0].clone();
        let child_group = child.as_group().unwrap();
        assert_eq!(
            memo.resolve(child_group).unwrap().kind(),
            PlanNodeKind::TableScan
        );
    }

    #[test]
    fn lookup_is_the_identity_on_concrete_nodes() {
        let mut ids = PlanNodeIdAllocator::new();
        let plan = filter_over_scan(&mut ids);
        let memo = Memo::new(plan, &mut ids).unwrap();

        let root = memo.resolve(memo.root()).unwrap().clone();
        let resolved = memo.lookup().resolve(&root).unwrap();
        assert_eq!(resolved, root);
    }

    #[test]
    fn lookup_resolves_references_to_the_current_representative() {
        let mut ids = PlanNodeIdAllocator::new();
        let plan = filter_over_scan(&mut ids);
        let memo = Memo::new(plan, &mut ids).unwrap();

        let root = memo.resolve(memo.root()).unwrap().clone();
        let reference = root.children()[0].clone();
        let resolved = memo.lookup().resolve(&reference).unwrap();
        assert_eq!(resolved.kind(), PlanNodeKind::TableScan);
    }

    #[test]
    fn unknown_group_is_an_internal_error() {
        let mut ids = PlanNodeIdAllocator::new();
        let plan = filter_over_scan(&mut ids);
        let memo = Memo::new(plan, &mut ids).unwrap();

        let err = memo.resolve(GroupId::new(4096)).unwrap_err();
        assert!(err.is_internal(), "unexpected error: {err}");
    }

    #[test]
    fn replace_is_observed_through_every_referring_parent() {
        let mut ids = PlanNodeIdAllocator::new();
        let plan = filter_over_scan(&mut ids);
        let mut memo = Memo::new(plan, &mut ids).unwrap();
        let root_group = memo.root();
        let scan_group = memo.resolve(root_group).unwrap().children()[0]
            .as_group()
            .unwrap();

        // Point two union branches at the same group, then swap that group's
        // representative out from under them.
        let reference = |ids: &mut PlanNodeIdAllocator| {
            PlanNode::shared(
                ids.next_id(),
                PlanNodeInner::GroupReference {
                    group: scan_group,
                    outputs: vec![a()],
                },
            )
        };
        let union = PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::Union {
                inputs: Vec1::try_from_vec(vec![reference(&mut ids), reference(&mut ids)])
                    .unwrap(),
                outputs: vec![a()],
                input_mappings: vec![vec![a()], vec![a()]],
            },
        );
        memo.replace(root_group, union, &mut ids).unwrap();

        let values = PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::Values {
                outputs: vec![a()],
                rows: vec![vec![Value::BigInt(1)]],
            },
        );
        memo.replace(scan_group, values, &mut ids).unwrap();

        let extracted = memo.extract().unwrap();
        assert_reference_free(&extracted);
        let branch_kinds: Vec<_> = extracted
            .children()
            .into_iter()
            .map(|child| child.kind())
            .collect();
        assert_eq!(
            branch_kinds,
            vec![PlanNodeKind::Values, PlanNodeKind::Values]
        );
    }

    #[test]
    fn replace_rejects_changed_outputs() {
        let mut ids = PlanNodeIdAllocator::new();
        let plan = filter_over_scan(&mut ids);
        let mut memo = Memo::new(plan, &mut ids).unwrap();

        let renamed = PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::TableScan {
                table: "t".into(),
                columns: vec![Symbol::new("b", DataType::BigInt)],
            },
        );
        let err = memo.replace(memo.root(), renamed, &mut ids).unwrap_err();
        assert!(err.is_internal(), "unexpected error: {err}");
        assert!(err.to_string().contains("outputs"), "unexpected error: {err}");
    }

    #[test]
    fn reference_representatives_resolve_through_the_chain() {
        let mut ids = PlanNodeIdAllocator::new();
        let plan = filter_over_scan(&mut ids);
        let mut memo = Memo::new(plan, &mut ids).unwrap();
        let root_group = memo.root();
        let scan_group = memo.resolve(root_group).unwrap().children()[0]
            .as_group()
            .unwrap();

        // Replace the whole filter with its input, expressed as a reference.
        let reference = PlanNode::shared(
            ids.next_id(),
            PlanNodeInner::GroupReference {
                group: scan_group,
                outputs: vec![a()],
            },
        );
        memo.replace(root_group, reference, &mut ids).unwrap();

        let resolved = memo.lookup().resolve_group(root_group).unwrap();
        assert_eq!(resolved.kind(), PlanNodeKind::TableScan);
        let extracted = memo.extract().unwrap();
        assert_eq!(extracted.kind(), PlanNodeKind::TableScan);
        assert_reference_free(&extracted);
    }

    #[test]
    fn no_lookup_rejects_references() {
        let mut ids = PlanNodeIdAllocator::new();
        let plan = filter_over_scan(&mut ids);
        let memo = Memo::new(plan, &mut ids).unwrap();

        let reference = memo.resolve(memo.root()).unwrap().children()[0].clone();
        let err = Lookup::no_lookup().resolve(&reference).unwrap_err();
        assert!(err.is_internal(), "unexpected error: {err}");
    }

    #[test]
    fn extracted_plans_are_reference_free() {
        let mut ids = PlanNodeIdAllocator::new();
        let plan = filter_over_scan(&mut ids);
        let original = plan.clone();
        let memo = Memo::new(plan, &mut ids).unwrap();

        let extracted = memo.extract().unwrap();
        assert_reference_free(&extracted);
        assert_eq!(extracted, original);
    }
}
