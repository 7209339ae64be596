//! Graph and automaton to DOT (Graphviz) conversion.
//!
//! Render with `dot -Tpng out.dot -o out.png` or any online viewer.
//! Conventions: final states are double circles, start states get an arrow
//! from an invisible source point, edge labels carry the transition symbol.

use std::fmt::Display;
use std::fmt::Write as _;

use crate::fa::Nfa;
use crate::graph::LabeledGraph;

/// Renders a labeled graph as DOT.
pub fn graph_to_dot(graph: &LabeledGraph) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph g {{");
    let _ = writeln!(out, "  rankdir=LR;");
    for &v in graph.vertices() {
        let _ = writeln!(out, "  {v} [shape=circle];");
    }
    for edge in graph.edges() {
        let _ = writeln!(
            out,
            "  {} -> {} [label=\"{}\"];",
            edge.from, edge.to, edge.label
        );
    }
    let _ = writeln!(out, "}}");
    out
}

/// Renders an automaton as DOT.
pub fn nfa_to_dot<S: Clone + Ord + Display>(nfa: &Nfa<S>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph nfa {{");
    let _ = writeln!(out, "  rankdir=LR;");
    for (i, state) in nfa.states().iter().enumerate() {
        let shape = if nfa.final_states().contains(state) {
            "doublecircle"
        } else {
            "circle"
        };
        let _ = writeln!(out, "  n{i} [shape={shape}, label=\"{state}\"];");
        if nfa.start_states().contains(state) {
            let _ = writeln!(out, "  s{i} [shape=point, style=invis];");
            let _ = writeln!(out, "  s{i} -> n{i};");
        }
    }
    let index = |s: &S| nfa.states().iter().position(|t| t == s).expect("state exists");
    for (from, label, to) in nfa.transitions() {
        let _ = writeln!(
            out,
            "  n{} -> n{} [label=\"{label}\"];",
            index(from),
            index(to)
        );
    }
    let _ = writeln!(out, "}}");
    out
}
