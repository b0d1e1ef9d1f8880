//! The logical plan model of the basalt planner, and the arena the rewrite
//! driver mutates it through.
//!
//! # Plans
//!
//! A logical plan is an immutable tree of [`PlanNode`]s. Every node carries a
//! [`PlanNodeId`] that is unique within a single planning session and *stable*
//! across rewrites: when a rule rebuilds part of a plan, the nodes it keeps
//! retain their identities, and only genuinely new nodes draw fresh ids from
//! the [`PlanNodeIdAllocator`]. Trees share structure freely (children are
//! [`PlanRef`]s, i.e. `Arc<PlanNode>`), so "rebuilding" a plan copies only the
//! spine that actually changed.
//!
//! Relational semantics live in [`PlanNodeInner`]; everything the rewrite
//! machinery needs to know about a node generically — its output symbols, its
//! children, how to swap those children out — is exposed on [`PlanNode`]
//! itself so that rules and analyses can traverse plans without enumerating
//! operators.
//!
//! # The memo
//!
//! Rewrites never splice a plan tree in place. Instead the driver loads the
//! tree into a [`Memo`]: an arena that assigns each node to a *group* and
//! rewires parent links to point at groups rather than at concrete nodes. A
//! parent's child slot holds a [`PlanNodeInner::GroupReference`], and the
//! concrete node currently standing in for that group is the group's
//! *representative*. Replacing a representative through [`Memo::replace`] is
//! atomic: every parent that refers to the group observes the new node on its
//! next resolution, with no tree surgery and no stale aliases.
//!
//! Code that walks a memo-resident plan goes through a [`Lookup`], which
//! resolves a reference to the current representative (and is the identity on
//! concrete nodes). When rewriting is done, [`Memo::extract`] materializes the
//! final, reference-free tree.

pub mod allocator;
pub mod cardinality;
pub mod memo;
pub mod node;
pub mod searcher;
pub mod visualize;

pub use allocator::{PlanNodeIdAllocator, SymbolAllocator};
pub use cardinality::{extract_cardinality, CardinalityRange};
pub use memo::{GroupId, Lookup, Memo};
pub use node::{
    AggregateStep, Assignments, FunctionCall, JoinType, PlanNode, PlanNodeId, PlanNodeInner,
    PlanNodeKind, PlanRef, SortOrder,
};
pub use searcher::{NodePredicate, PlanNodeSearcher};
pub use visualize::GraphViz;
