//! Static row-count bounds.
//!
//! Rewrite rules use this analysis to prove facts like "this subquery can
//! never produce more than one row" before committing to a rewrite. The
//! analysis is conservative: an operator it cannot bound reports
//! `[0, unbounded)`.

use std::fmt;

use basalt_errors::{internal, BasaltResult};

use crate::memo::Lookup;
use crate::node::{AggregateStep, PlanNodeInner, PlanRef};

/// Closed lower bound and optional closed upper bound on the number of rows
/// a plan can produce. `hi: None` means unbounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CardinalityRange {
    pub lo: u64,
    pub hi: Option<u64>,
}

impl CardinalityRange {
    pub const fn exactly(n: u64) -> Self {
        CardinalityRange { lo: n, hi: Some(n) }
    }

    pub const fn unknown() -> Self {
        CardinalityRange { lo: 0, hi: None }
    }

    /// Exactly one row.
    pub fn is_scalar(&self) -> bool {
        self.lo == 1 && self.hi == Some(1)
    }

    /// At most one row.
    pub fn is_at_most_scalar(&self) -> bool {
        matches!(self.hi, Some(hi) if hi <= 1)
    }
}

impl fmt::Display for CardinalityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.hi {
            Some(hi) => write!(f, "[{}, {}]", self.lo, hi),
            None => write!(f, "[{}, *)", self.lo),
        }
    }
}

/// Bounds the number of rows `node` can produce, resolving group references
/// through `lookup`.
pub fn extract_cardinality(node: &PlanRef, lookup: Lookup<'_>) -> BasaltResult<CardinalityRange> {
    let node = lookup.resolve(node)?;
    let range = match &node.inner {
        PlanNodeInner::Values { rows, .. } => CardinalityRange::exactly(rows.len() as u64),
        PlanNodeInner::EnforceSingleRow { .. } => CardinalityRange::exactly(1),
        PlanNodeInner::Aggregate {
            input,
            step,
            group_by,
            ..
        } => {
            if *step == AggregateStep::Single && group_by.is_empty() {
                // Global aggregation produces its one row even on empty
                // input.
                CardinalityRange::exactly(1)
            } else {
                // At most one output row per input row, possibly none per
                // group.
                let input = extract_cardinality(input, lookup)?;
                CardinalityRange { lo: 0, hi: input.hi }
            }
        }
        PlanNodeInner::Filter { input, .. } => {
            let input = extract_cardinality(input, lookup)?;
            CardinalityRange { lo: 0, hi: input.hi }
        }
        PlanNodeInner::Limit { input, count } => {
            let input = extract_cardinality(input, lookup)?;
            CardinalityRange {
                lo: input.lo.min(*count),
                hi: Some(input.hi.map_or(*count, |hi| hi.min(*count))),
            }
        }
        PlanNodeInner::Project { input, .. }
        | PlanNodeInner::Window { input, .. }
        | PlanNodeInner::MarkDistinct { input, .. }
        | PlanNodeInner::AssignUniqueId { input, .. } => extract_cardinality(input, lookup)?,
        PlanNodeInner::Union { inputs, .. } => {
            let mut lo = 0u64;
            let mut hi = Some(0u64);
            for input in inputs {
                let branch = extract_cardinality(input, lookup)?;
                lo = lo.saturating_add(branch.lo);
                hi = match (hi, branch.hi) {
                    (Some(total), Some(branch)) => Some(total.saturating_add(branch)),
                    _ => None,
                };
            }
            CardinalityRange { lo, hi }
        }
        PlanNodeInner::TableScan { .. }
        | PlanNodeInner::LateralJoin { .. }
        | PlanNodeInner::TableFinish { .. } => CardinalityRange::unknown(),
        PlanNodeInner::GroupReference { group, .. } => {
            internal!("unresolved reference to group g{}", group.index())
        }
    };
    Ok(range)
}
