//! Plan nodes and the generic surface the rewrite machinery sees.

use std::fmt;
use std::sync::Arc;

use basalt_data::{SqlIdentifier, Value};
use basalt_errors::{internal_err, invariant_eq, BasaltResult};
use basalt_expr::{FunctionSignature, ScalarExpr, Symbol};
use enum_kinds::EnumKind;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use vec1::Vec1;

use crate::memo::GroupId;

/// Identity of a plan node, unique within one planning session and stable
/// across rewrites.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanNodeId(pub u32);

impl fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Shared handle to an immutable plan node. Plans are trees of these, and a
/// rebuilt plan shares every subtree the rebuild did not touch.
pub type PlanRef = Arc<PlanNode>;

/// How a correlated join combines outer rows with subquery rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    pub fn name(self) -> &'static str {
        match self {
            JoinType::Inner => "inner",
            JoinType::Left => "left",
            JoinType::Right => "right",
            JoinType::Full => "full",
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which phase of a (potentially split) aggregation a node computes.
///
/// `Single` aggregations consume raw input rows and produce final values.
/// `Partial` consumes raw rows but produces intermediate accumulator states,
/// which a matching `Final` aggregation elsewhere in the plan consumes to
/// produce final values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateStep {
    Single,
    Partial,
    Final,
}

impl AggregateStep {
    pub fn name(self) -> &'static str {
        match self {
            AggregateStep::Single => "single",
            AggregateStep::Partial => "partial",
            AggregateStep::Final => "final",
        }
    }
}

impl fmt::Display for AggregateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sort direction of one `order_by` entry of a window operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        })
    }
}

/// An aggregate or window function application: the resolved signature plus
/// argument expressions over the node's input symbols.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub signature: FunctionSignature,
    pub args: Vec<ScalarExpr>,
}

impl FunctionCall {
    pub fn new(signature: FunctionSignature, args: Vec<ScalarExpr>) -> Self {
        FunctionCall { signature, args }
    }

    /// The call as a plain expression, for analyses that work on
    /// [`ScalarExpr`] (type recomputation in particular).
    pub fn as_expr(&self) -> ScalarExpr {
        ScalarExpr::Call {
            signature: self.signature.clone(),
            args: self.args.clone(),
        }
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.signature.name(), self.args.iter().join(", "))
    }
}

/// The ordered `symbol := expression` map of a [`PlanNodeInner::Project`].
///
/// Entry order is the node's output order. Target symbols are unique within
/// one `Assignments`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignments {
    entries: Vec<(Symbol, ScalarExpr)>,
}

impl Assignments {
    pub fn new(entries: Vec<(Symbol, ScalarExpr)>) -> Self {
        Assignments { entries }
    }

    /// An identity projection over the given symbols.
    pub fn identity<'a, I>(symbols: I) -> Self
    where
        I: IntoIterator<Item = &'a Symbol>,
    {
        Assignments {
            entries: symbols
                .into_iter()
                .map(|symbol| (symbol.clone(), symbol.to_expr()))
                .collect(),
        }
    }

    /// The expression assigned to `target`, if any.
    pub fn get(&self, target: &Symbol) -> Option<&ScalarExpr> {
        self.entries
            .iter()
            .find(|(symbol, _)| symbol == target)
            .map(|(_, expr)| expr)
    }

    pub fn targets(&self) -> impl Iterator<Item = &Symbol> {
        self.entries.iter().map(|(symbol, _)| symbol)
    }

    pub fn expressions(&self) -> impl Iterator<Item = &ScalarExpr> {
        self.entries.iter().map(|(_, expr)| expr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Symbol, ScalarExpr)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether every entry maps a symbol to itself.
    pub fn is_identity(&self) -> bool {
        self.entries
            .iter()
            .all(|(symbol, expr)| matches!(expr, ScalarExpr::Variable(v) if v == symbol))
    }
}

impl FromIterator<(Symbol, ScalarExpr)> for Assignments {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = (Symbol, ScalarExpr)>,
    {
        Assignments {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Assignments {
    type Item = (Symbol, ScalarExpr);
    type IntoIter = std::vec::IntoIter<(Symbol, ScalarExpr)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Assignments {
    type Item = &'a (Symbol, ScalarExpr);
    type IntoIter = std::slice::Iter<'a, (Symbol, ScalarExpr)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for Assignments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (target, expr) in &self.entries {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            match expr {
                // Identity entries print as the bare symbol.
                ScalarExpr::Variable(v) if v == target => write!(f, "{target}")?,
                _ => write!(f, "{target} := {expr}")?,
            }
        }
        Ok(())
    }
}

/// A relational operator.
///
/// Variants carry their children inline; [`PlanNode::children`] and
/// [`PlanNode::replace_children`] expose them generically so that rules and
/// analyses can traverse plans without enumerating operators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, EnumKind)]
#[enum_kind(PlanNodeKind)]
pub enum PlanNodeInner {
    /// Leaf scan of a named table, producing `columns`.
    TableScan {
        table: SqlIdentifier,
        columns: Vec<Symbol>,
    },

    /// Constant relation. Every row has one [`Value`] per output symbol.
    Values {
        outputs: Vec<Symbol>,
        rows: Vec<Vec<Value>>,
    },

    /// Keeps the input rows for which `predicate` evaluates to `TRUE`.
    Filter {
        input: PlanRef,
        predicate: ScalarExpr,
    },

    /// Computes one expression per output symbol.
    Project {
        input: PlanRef,
        assignments: Assignments,
    },

    /// Groups by `group_by` and evaluates one aggregate call per entry of
    /// `aggregates`. With an empty `group_by` this is a global aggregation
    /// producing exactly one row.
    Aggregate {
        input: PlanRef,
        step: AggregateStep,
        group_by: Vec<Symbol>,
        aggregates: Vec<(Symbol, FunctionCall)>,
    },

    /// Evaluates window functions over partitions of the input, appending
    /// one symbol per function to the input's row.
    Window {
        input: PlanRef,
        partition_by: Vec<Symbol>,
        order_by: Vec<(Symbol, SortOrder)>,
        functions: Vec<(Symbol, FunctionCall)>,
    },

    /// Concatenates its inputs. `input_mappings[i]` lists, for input `i`,
    /// the input symbol feeding each output position; every mapping has one
    /// entry per output symbol.
    Union {
        inputs: Vec1<PlanRef>,
        outputs: Vec<Symbol>,
        input_mappings: Vec<Vec<Symbol>>,
    },

    /// Correlated join: conceptually, for each row of `input` the `subquery`
    /// is evaluated with the `correlation` symbols bound to that row's
    /// values. An empty correlation list makes this an ordinary lateral
    /// join, which the execution layers can actually run.
    LateralJoin {
        input: PlanRef,
        subquery: PlanRef,
        correlation: Vec<Symbol>,
        join_type: JoinType,
        filter: ScalarExpr,
    },

    /// Asserts at runtime that its input produces at most one row, failing
    /// the query otherwise; produces exactly one row (padding with NULLs if
    /// the input is empty).
    EnforceSingleRow { input: PlanRef },

    /// Appends a boolean `marker` symbol that is `TRUE` for the first
    /// occurrence of each combination of `distinct_symbols` and `FALSE` for
    /// later duplicates.
    MarkDistinct {
        input: PlanRef,
        marker: Symbol,
        distinct_symbols: Vec<Symbol>,
    },

    /// Appends a synthetic `id_symbol` that is distinct on every input row.
    AssignUniqueId { input: PlanRef, id_symbol: Symbol },

    /// Keeps at most `count` input rows.
    Limit { input: PlanRef, count: u64 },

    /// Writes its input to `target` and produces a single row holding the
    /// written-row count in `rows_symbol`.
    TableFinish {
        input: PlanRef,
        target: SqlIdentifier,
        rows_symbol: Symbol,
    },

    /// Indirection through a memo group: stands for whatever node currently
    /// represents the group. Appears only in memo-resident plans, never in
    /// extracted ones.
    GroupReference { group: GroupId, outputs: Vec<Symbol> },
}

impl PlanNodeInner {
    /// A one-line operator summary, used by tree and graphviz rendering.
    pub fn description(&self) -> String {
        use PlanNodeInner::*;

        match self {
            TableScan { table, .. } => format!("TableScan({table})"),
            Values { rows, .. } => format!("Values({} rows)", rows.len()),
            Filter { predicate, .. } => format!("Filter({predicate})"),
            Project { assignments, .. } => format!("Project({assignments})"),
            Aggregate {
                step,
                group_by,
                aggregates,
                ..
            } => format!(
                "Aggregate[{step}]({}) group by [{}]",
                aggregates
                    .iter()
                    .format_with(", ", |(symbol, call), f| f(&format_args!(
                        "{symbol} := {call}"
                    ))),
                group_by.iter().join(", "),
            ),
            Window {
                partition_by,
                functions,
                ..
            } => format!(
                "Window({}) partition by [{}]",
                functions
                    .iter()
                    .format_with(", ", |(symbol, call), f| f(&format_args!(
                        "{symbol} := {call}"
                    ))),
                partition_by.iter().join(", "),
            ),
            Union { inputs, .. } => format!("Union({} inputs)", inputs.len()),
            LateralJoin {
                correlation,
                join_type,
                filter,
                ..
            } => format!(
                "LateralJoin[{join_type}] correlation [{}] filter {filter}",
                correlation.iter().join(", "),
            ),
            EnforceSingleRow { .. } => "EnforceSingleRow".to_owned(),
            MarkDistinct {
                marker,
                distinct_symbols,
                ..
            } => format!(
                "MarkDistinct({marker} := distinct [{}])",
                distinct_symbols.iter().join(", "),
            ),
            AssignUniqueId { id_symbol, .. } => format!("AssignUniqueId({id_symbol})"),
            Limit { count, .. } => format!("Limit({count})"),
            TableFinish { target, .. } => format!("TableFinish({target})"),
            GroupReference { group, .. } => format!("GroupReference(g{})", group.index()),
        }
    }
}

/// A plan operator together with its stable identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanNode {
    pub id: PlanNodeId,
    pub inner: PlanNodeInner,
}

impl PlanNode {
    pub fn new(id: PlanNodeId, inner: PlanNodeInner) -> Self {
        PlanNode { id, inner }
    }

    /// Like [`PlanNode::new`], but behind a [`PlanRef`], which is how nearly
    /// every construction site wants the node.
    pub fn shared(id: PlanNodeId, inner: PlanNodeInner) -> PlanRef {
        Arc::new(PlanNode::new(id, inner))
    }

    pub fn kind(&self) -> PlanNodeKind {
        PlanNodeKind::from(&self.inner)
    }

    /// If this node is a memo reference, the group it points at.
    pub fn as_group(&self) -> Option<GroupId> {
        match &self.inner {
            PlanNodeInner::GroupReference { group, .. } => Some(*group),
            _ => None,
        }
    }

    /// The symbols this node outputs, in order.
    ///
    /// Pass-through operators delegate to their input, so this terminates at
    /// leaves and at group references (which record the outputs of the group
    /// they stand for).
    pub fn outputs(&self) -> Vec<Symbol> {
        use PlanNodeInner::*;

        match &self.inner {
            TableScan { columns, .. } => columns.clone(),
            Values { outputs, .. } => outputs.clone(),
            Filter { input, .. } | EnforceSingleRow { input } | Limit { input, .. } => {
                input.outputs()
            }
            Project { assignments, .. } => assignments.targets().cloned().collect(),
            Aggregate {
                group_by,
                aggregates,
                ..
            } => group_by
                .iter()
                .cloned()
                .chain(aggregates.iter().map(|(symbol, _)| symbol.clone()))
                .collect(),
            Window {
                input, functions, ..
            } => input
                .outputs()
                .into_iter()
                .chain(functions.iter().map(|(symbol, _)| symbol.clone()))
                .collect(),
            Union { outputs, .. } => outputs.clone(),
            LateralJoin {
                input, subquery, ..
            } => {
                let mut outputs = input.outputs();
                outputs.extend(subquery.outputs());
                outputs
            }
            MarkDistinct { input, marker, .. } => {
                let mut outputs = input.outputs();
                outputs.push(marker.clone());
                outputs
            }
            AssignUniqueId { input, id_symbol } => {
                let mut outputs = input.outputs();
                outputs.push(id_symbol.clone());
                outputs
            }
            TableFinish { rows_symbol, .. } => vec![rows_symbol.clone()],
            GroupReference { outputs, .. } => outputs.clone(),
        }
    }

    /// The node's children in child-position order.
    pub fn children(&self) -> Vec<&PlanRef> {
        use PlanNodeInner::*;

        match &self.inner {
            TableScan { .. } | Values { .. } | GroupReference { .. } => vec![],
            Filter { input, .. }
            | Project { input, .. }
            | Aggregate { input, .. }
            | Window { input, .. }
            | EnforceSingleRow { input }
            | MarkDistinct { input, .. }
            | AssignUniqueId { input, .. }
            | Limit { input, .. }
            | TableFinish { input, .. } => vec![input],
            Union { inputs, .. } => inputs.iter().collect(),
            LateralJoin {
                input, subquery, ..
            } => vec![input, subquery],
        }
    }

    /// The same operator over new children, preserving this node's id.
    ///
    /// The replacement list must match the current arity.
    pub fn replace_children(&self, new_children: Vec<PlanRef>) -> BasaltResult<PlanNode> {
        use PlanNodeInner::*;

        invariant_eq!(
            new_children.len(),
            self.children().len(),
            "wrong number of children for {:?} node {}",
            self.kind(),
            self.id
        );
        let inner = match &self.inner {
            TableScan { .. } | Values { .. } | GroupReference { .. } => self.inner.clone(),
            Filter { predicate, .. } => Filter {
                input: one_child(new_children)?,
                predicate: predicate.clone(),
            },
            Project { assignments, .. } => Project {
                input: one_child(new_children)?,
                assignments: assignments.clone(),
            },
            Aggregate {
                step,
                group_by,
                aggregates,
                ..
            } => Aggregate {
                input: one_child(new_children)?,
                step: *step,
                group_by: group_by.clone(),
                aggregates: aggregates.clone(),
            },
            Window {
                partition_by,
                order_by,
                functions,
                ..
            } => Window {
                input: one_child(new_children)?,
                partition_by: partition_by.clone(),
                order_by: order_by.clone(),
                functions: functions.clone(),
            },
            Union {
                outputs,
                input_mappings,
                ..
            } => Union {
                inputs: Vec1::try_from_vec(new_children)
                    .map_err(|_| internal_err!("union requires at least one input"))?,
                outputs: outputs.clone(),
                input_mappings: input_mappings.clone(),
            },
            LateralJoin {
                correlation,
                join_type,
                filter,
                ..
            } => {
                let (input, subquery) = two_children(new_children)?;
                LateralJoin {
                    input,
                    subquery,
                    correlation: correlation.clone(),
                    join_type: *join_type,
                    filter: filter.clone(),
                }
            }
            EnforceSingleRow { .. } => EnforceSingleRow {
                input: one_child(new_children)?,
            },
            MarkDistinct {
                marker,
                distinct_symbols,
                ..
            } => MarkDistinct {
                input: one_child(new_children)?,
                marker: marker.clone(),
                distinct_symbols: distinct_symbols.clone(),
            },
            AssignUniqueId { id_symbol, .. } => AssignUniqueId {
                input: one_child(new_children)?,
                id_symbol: id_symbol.clone(),
            },
            Limit { count, .. } => Limit {
                input: one_child(new_children)?,
                count: *count,
            },
            TableFinish {
                target, rows_symbol, ..
            } => TableFinish {
                input: one_child(new_children)?,
                target: target.clone(),
                rows_symbol: rows_symbol.clone(),
            },
        };
        Ok(PlanNode::new(self.id, inner))
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(
            f,
            "{:indent$}{} {} -> [{}]",
            "",
            self.id,
            self.inner.description(),
            self.outputs().iter().join(", "),
            indent = depth * 2,
        )?;
        for child in self.children() {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

fn one_child(children: Vec<PlanRef>) -> BasaltResult<PlanRef> {
    let [child]: [PlanRef; 1] = children
        .try_into()
        .map_err(|cs: Vec<PlanRef>| internal_err!("expected exactly one child, got {}", cs.len()))?;
    Ok(child)
}

fn two_children(children: Vec<PlanRef>) -> BasaltResult<(PlanRef, PlanRef)> {
    let [first, second]: [PlanRef; 2] = children
        .try_into()
        .map_err(|cs: Vec<PlanRef>| {
            internal_err!("expected exactly two children, got {}", cs.len())
        })?;
    Ok((first, second))
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use basalt_data::DataType;
    use pretty_assertions::assert_eq;

    use super::*;

    fn sym(name: &str, ty: DataType) -> Symbol {
        Symbol::new(name, ty)
    }

    fn scan(id: u32, table: &str, columns: Vec<Symbol>) -> PlanRef {
        PlanNode::shared(
            PlanNodeId(id),
            PlanNodeInner::TableScan {
                table: table.into(),
                columns,
            },
        )
    }

    #[test]
    fn pass_through_operators_delegate_outputs() {
        let a = sym("a", DataType::BigInt);
        let b = sym("b", DataType::Text);
        let input = scan(0, "t", vec![a.clone(), b.clone()]);
        let filter = PlanNode::shared(
            PlanNodeId(1),
            PlanNodeInner::Filter {
                input,
                predicate: ScalarExpr::TRUE,
            },
        );
        assert_eq!(filter.outputs(), vec![a, b]);
    }

    #[test]
    fn appending_operators_extend_outputs() {
        let a = sym("a", DataType::BigInt);
        let marker = sym("is_distinct", DataType::Boolean);
        let input = scan(0, "t", vec![a.clone()]);
        let mark = PlanNode::shared(
            PlanNodeId(1),
            PlanNodeInner::MarkDistinct {
                input,
                marker: marker.clone(),
                distinct_symbols: vec![a.clone()],
            },
        );
        assert_eq!(mark.outputs(), vec![a, marker]);
    }

    #[test]
    fn lateral_join_concatenates_outputs() {
        let a = sym("a", DataType::BigInt);
        let x = sym("x", DataType::BigInt);
        let join = PlanNode::shared(
            PlanNodeId(2),
            PlanNodeInner::LateralJoin {
                input: scan(0, "outer", vec![a.clone()]),
                subquery: scan(1, "inner", vec![x.clone()]),
                correlation: vec![a.clone()],
                join_type: JoinType::Inner,
                filter: ScalarExpr::TRUE,
            },
        );
        assert_eq!(join.outputs(), vec![a, x]);
    }

    #[test]
    fn replace_children_preserves_identity() {
        let a = sym("a", DataType::BigInt);
        let filter = PlanNode::new(
            PlanNodeId(1),
            PlanNodeInner::Filter {
                input: scan(0, "t", vec![a.clone()]),
                predicate: ScalarExpr::TRUE,
            },
        );
        let replacement_child = scan(7, "u", vec![a.clone()]);
        let rebuilt = filter
            .replace_children(vec![replacement_child.clone()])
            .unwrap();
        assert_eq!(rebuilt.id, PlanNodeId(1));
        assert_eq!(rebuilt.children(), vec![&replacement_child]);
    }

    #[test]
    fn replace_children_rejects_wrong_arity() {
        let a = sym("a", DataType::BigInt);
        let filter = PlanNode::new(
            PlanNodeId(1),
            PlanNodeInner::Filter {
                input: scan(0, "t", vec![a.clone()]),
                predicate: ScalarExpr::TRUE,
            },
        );
        let err = filter.replace_children(vec![]).unwrap_err();
        assert!(err.is_internal(), "unexpected error: {err}");
    }

    #[test]
    fn identity_assignments_round_trip_symbols() {
        let a = sym("a", DataType::BigInt);
        let b = sym("b", DataType::Text);
        let assignments = Assignments::identity([&a, &b]);
        assert!(assignments.is_identity());
        assert_eq!(assignments.get(&a), Some(&a.to_expr()));
        assert_eq!(
            assignments.targets().cloned().collect::<Vec<_>>(),
            vec![a, b]
        );
    }

    #[test]
    fn assignments_display_marks_computed_entries() {
        let a = sym("a", DataType::BigInt);
        let b = sym("b", DataType::BigInt);
        let assignments = Assignments::new(vec![
            (a.clone(), a.to_expr()),
            (b.clone(), ScalarExpr::literal(1i64)),
        ]);
        assert_eq!(assignments.to_string(), "a, b := 1");
    }

    #[test]
    fn display_renders_an_indented_tree() {
        let a = sym("a", DataType::BigInt);
        let plan = PlanNode::new(
            PlanNodeId(1),
            PlanNodeInner::Filter {
                input: scan(0, "t", vec![a.clone()]),
                predicate: ScalarExpr::TRUE,
            },
        );
        let rendered = plan.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("n1 Filter(TRUE)"), "{rendered}");
        assert!(lines[1].starts_with("  n0 TableScan(t)"), "{rendered}");
    }

    #[test]
    fn plans_round_trip_through_serde() {
        let a = sym("a", DataType::BigInt);
        let plan = PlanNode::shared(
            PlanNodeId(2),
            PlanNodeInner::Limit {
                input: PlanNode::shared(
                    PlanNodeId(1),
                    PlanNodeInner::Filter {
                        input: scan(0, "t", vec![a.clone()]),
                        predicate: ScalarExpr::TRUE,
                    },
                ),
                count: 10,
            },
        );
        let encoded = serde_json::to_string(&plan).unwrap();
        let decoded: PlanRef = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, plan);
    }
}
