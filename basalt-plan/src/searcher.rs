//! Generic depth-first plan search.
//!
//! A search pairs a predicate for what to find with a predicate bounding
//! where to look. Rules use it to locate an operator somewhere below a
//! matched node without hand-rolling a traversal each time, and to splice a
//! located operator out of the tree.

use std::sync::Arc;

use basalt_errors::{invariant_eq, BasaltResult};

use crate::memo::Lookup;
use crate::node::{PlanNode, PlanRef};

/// Predicate over plan nodes. Plain function pointers keep searches (and
/// the rule patterns built on the same shape) free of captured state, so
/// evaluating one can never mutate the plan being searched.
pub type NodePredicate = fn(&PlanNode) -> bool;

/// Depth-first search over a (possibly memo-resident) plan.
///
/// Children are resolved through the lookup on the way down, so searches
/// see through group references. Both predicates always observe concrete
/// nodes.
#[derive(Clone, Copy)]
pub struct PlanNodeSearcher<'a> {
    lookup: Lookup<'a>,
    matches: NodePredicate,
    recurse: NodePredicate,
}

impl<'a> PlanNodeSearcher<'a> {
    /// A search that matches every node and descends everywhere; narrow it
    /// with [`matching`](Self::matching) and
    /// [`recurse_only_when`](Self::recurse_only_when).
    pub fn new(lookup: Lookup<'a>) -> Self {
        PlanNodeSearcher {
            lookup,
            matches: |_| true,
            recurse: |_| true,
        }
    }

    /// Restricts hits to nodes satisfying `predicate`.
    pub fn matching(mut self, predicate: NodePredicate) -> Self {
        self.matches = predicate;
        self
    }

    /// Stops the descent at nodes that do not satisfy `predicate`: their
    /// children are never visited. The node itself is still a match
    /// candidate.
    pub fn recurse_only_when(mut self, predicate: NodePredicate) -> Self {
        self.recurse = predicate;
        self
    }

    /// The first matching node in depth-first, child-position order.
    pub fn find_first(&self, node: &PlanRef) -> BasaltResult<Option<PlanRef>> {
        let resolved = self.lookup.resolve(node)?;
        if (self.matches)(&resolved) {
            return Ok(Some(resolved));
        }
        if (self.recurse)(&resolved) {
            for child in resolved.children() {
                if let Some(found) = self.find_first(child)? {
                    return Ok(Some(found));
                }
            }
        }
        Ok(None)
    }

    /// Whether any node in the searched region matches.
    pub fn matches_anywhere(&self, node: &PlanRef) -> BasaltResult<bool> {
        Ok(self.find_first(node)?.is_some())
    }

    /// Rebuilds the tree with the first matching node spliced out, its
    /// single child taking its place. Spine nodes above the splice keep
    /// their identities. `Ok(None)` means nothing matched.
    pub fn remove_first(&self, node: &PlanRef) -> BasaltResult<Option<PlanRef>> {
        let resolved = self.lookup.resolve(node)?;
        if (self.matches)(&resolved) {
            let children = resolved.children();
            invariant_eq!(
                children.len(),
                1,
                "cannot splice out {:?} node {}",
                resolved.kind(),
                resolved.id
            );
            return Ok(Some(children[0].clone()));
        }
        if (self.recurse)(&resolved) {
            let children: Vec<PlanRef> = resolved.children().into_iter().cloned().collect();
            for (position, child) in children.iter().enumerate() {
                if let Some(spliced) = self.remove_first(child)? {
                    let mut new_children = children.clone();
                    new_children[position] = spliced;
                    return Ok(Some(Arc::new(resolved.replace_children(new_children)?)));
                }
            }
        }
        Ok(None)
    }
}
