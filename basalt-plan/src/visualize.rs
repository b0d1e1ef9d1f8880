//! Debug rendering of plans and memos as graphviz documents.
//!
//! The output is meant for `dot -Tsvg` while debugging a rewrite, and is
//! occasionally dumped through trace logging. Nothing parses it back.

use itertools::Itertools;

use crate::memo::Memo;
use crate::node::PlanRef;

pub trait GraphViz {
    fn to_graphviz(&self) -> String;
}

impl GraphViz for PlanRef {
    fn to_graphviz(&self) -> String {
        fn visit(node: &PlanRef, out: &mut String) {
            out.push_str(&format!(
                "    \"{}\" [label=\"{} {} | [{}]\"]\n",
                node.id,
                node.id,
                escape(&node.inner.description()),
                escape(&node.outputs().iter().join(", ")),
            ));
            for child in node.children() {
                out.push_str(&format!("    \"{}\" -> \"{}\"\n", node.id, child.id));
                visit(child, out);
            }
        }

        let mut out = String::from("digraph {\n    node [shape=record, fontsize=10]\n");
        visit(self, &mut out);
        out.push_str("}\n");
        out
    }
}

impl GraphViz for Memo {
    fn to_graphviz(&self) -> String {
        let mut out = String::from("digraph {\n    node [shape=record, fontsize=10]\n");
        for (group, representative) in self.groups() {
            out.push_str(&format!(
                "    \"g{}\" [label=\"g{} | {}\"]\n",
                group.index(),
                group.index(),
                escape(&representative.inner.description()),
            ));
            for (position, child) in representative.children().into_iter().enumerate() {
                if let Some(child_group) = child.as_group() {
                    out.push_str(&format!(
                        "    \"g{}\" -> \"g{}\" [label=\"{}\"]\n",
                        group.index(),
                        child_group.index(),
                        position,
                    ));
                }
            }
        }
        out.push_str("}\n");
        out
    }
}

/// Escapes the characters graphviz record labels treat specially.
fn escape(label: &str) -> String {
    let mut escaped = String::with_capacity(label.len());
    for c in label.chars() {
        if matches!(c, '"' | '|' | '{' | '}' | '<' | '>') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
