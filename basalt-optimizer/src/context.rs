//! Per-compilation planning state and the slice of it that rules see.

use std::sync::Arc;

use basalt_data::DataType;
use basalt_expr::{FunctionRegistry, Symbol};
use basalt_plan::{Lookup, PlanNodeId, PlanNodeIdAllocator, SymbolAllocator};

/// State owned by one query compilation: the fresh-id and fresh-symbol
/// allocators plus the shared function registry. Nothing here is shared
/// between compilations except the registry, which is read-only.
pub struct PlanningContext {
    pub(crate) ids: PlanNodeIdAllocator,
    pub(crate) symbols: SymbolAllocator,
    pub(crate) functions: Arc<FunctionRegistry>,
}

impl PlanningContext {
    pub fn new(functions: Arc<FunctionRegistry>) -> Self {
        PlanningContext {
            ids: PlanNodeIdAllocator::new(),
            symbols: SymbolAllocator::new(),
            functions,
        }
    }

    pub fn ids(&mut self) -> &mut PlanNodeIdAllocator {
        &mut self.ids
    }

    pub fn symbols(&mut self) -> &mut SymbolAllocator {
        &mut self.symbols
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }
}

impl Default for PlanningContext {
    fn default() -> Self {
        Self::new(Arc::new(FunctionRegistry::new()))
    }
}

/// What a [`Rule`](crate::rule::Rule) sees while applying: resolution into
/// the memo plus the compilation's allocators and function registry. The
/// driver scopes one of these to each application, so a rule can never
/// hold memo state across calls.
pub struct RuleContext<'a> {
    pub(crate) lookup: Lookup<'a>,
    pub(crate) ids: &'a mut PlanNodeIdAllocator,
    pub(crate) symbols: &'a mut SymbolAllocator,
    pub(crate) functions: &'a FunctionRegistry,
}

impl<'a> RuleContext<'a> {
    pub fn lookup(&self) -> Lookup<'a> {
        self.lookup
    }

    pub fn next_id(&mut self) -> PlanNodeId {
        self.ids.next_id()
    }

    pub fn new_symbol(&mut self, hint: &str, ty: DataType) -> Symbol {
        self.symbols.new_symbol(hint, ty)
    }

    pub fn functions(&self) -> &'a FunctionRegistry {
        self.functions
    }
}
