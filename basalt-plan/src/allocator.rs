//! Sources of fresh plan-node ids and fresh symbols.
//!
//! One of each lives in the planning context for the duration of a
//! compilation. Both hand out monotonically increasing values and never
//! reuse one, which is what makes node identity and symbol identity safe to
//! compare across rewrite passes.

use basalt_data::DataType;
use basalt_expr::Symbol;

use crate::node::PlanNodeId;

/// Allocates [`PlanNodeId`]s.
#[derive(Debug, Default)]
pub struct PlanNodeIdAllocator {
    next: u32,
}

impl PlanNodeIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> PlanNodeId {
        let id = PlanNodeId(self.next);
        self.next += 1;
        id
    }
}

/// Allocates fresh [`Symbol`]s.
///
/// Every allocated name is `<hint>_<counter>` with a globally increasing
/// counter, so two allocations never collide even when they share a hint.
/// During rewriting this allocator is the only source of new names; plan
/// construction ahead of it uses plain names that carry no `_<counter>`
/// suffix.
#[derive(Debug, Default)]
pub struct SymbolAllocator {
    next: u32,
}

impl SymbolAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_symbol(&mut self, hint: &str, ty: DataType) -> Symbol {
        let name = format!("{}_{}", hint, self.next);
        self.next += 1;
        Symbol::new(name, ty)
    }
}
