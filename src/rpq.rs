//! Regular path queries: which vertex pairs are connected by a path whose
//! label sequence matches a regular expression.
//!
//! Two interchangeable strategies:
//! - [`regular_path_query`]: Kronecker product of the graph automaton with
//!   the regex DFA, then one transitive closure over the merged product
//!   matrix.
//! - [`regular_path_query_bfs`]: per-start-vertex BFS fronts over the
//!   (DFA state × graph vertex) space, no product matrix.
//!
//! Both report `(v, v)` when the regex accepts the empty word and `v` is in
//! both vertex sets: the empty path at `v` has label sequence ε.

use std::collections::BTreeSet;

use log::debug;

use crate::automaton::AutomatonMatrix;
use crate::bitset::BitSet;
use crate::budget::FixpointBudget;
use crate::error::QueryError;
use crate::fa::graph_to_nfa;
use crate::graph::{LabeledGraph, Vertex};
use crate::regex::Regex;

/// Evaluates `regex` over `graph` between the given vertex sets
/// (`None` = all vertices). Returns the matching `(source, target)` pairs.
pub fn regular_path_query(
    graph: &LabeledGraph,
    starts: Option<&BTreeSet<Vertex>>,
    finals: Option<&BTreeSet<Vertex>>,
    regex: &str,
) -> Result<BTreeSet<(Vertex, Vertex)>, QueryError> {
    regular_path_query_budgeted(graph, starts, finals, regex, &FixpointBudget::unlimited())
}

/// [`regular_path_query`] with an explicit fixpoint budget.
pub fn regular_path_query_budgeted(
    graph: &LabeledGraph,
    starts: Option<&BTreeSet<Vertex>>,
    finals: Option<&BTreeSet<Vertex>>,
    regex: &str,
    budget: &FixpointBudget,
) -> Result<BTreeSet<(Vertex, Vertex)>, QueryError> {
    let dfa = Regex::parse(regex)?.to_dfa();
    let graph_mat = AutomatonMatrix::from_nfa(&graph_to_nfa(graph, starts, finals));
    let dfa_mat = AutomatonMatrix::from_nfa(&dfa.to_nfa());
    let n2 = dfa_mat.size();

    let product = graph_mat.intersect(&dfa_mat);
    let closure = product.merged_matrix().transitive_closure_budgeted(budget)?;
    let start_idx = product.start_indices();
    let final_idx = product.final_indices();

    debug!(
        "rpq: product size {}, closure nnz {}",
        product.size(),
        closure.nnz()
    );

    let mut result = BTreeSet::new();
    for (u, v) in closure.iter() {
        if start_idx.contains(u) && final_idx.contains(v) {
            result.insert((*graph_mat.state_of(u / n2), *graph_mat.state_of(v / n2)));
        }
    }
    // Empty-word pairs: a composite state that is both start and final means
    // the regex accepts ε and the vertex is in both vertex sets.
    for c in start_idx.iter() {
        if final_idx.contains(c) {
            let v = *graph_mat.state_of(c / n2);
            result.insert((v, v));
        }
    }
    Ok(result)
}

/// BFS-based regular path query: one front per start vertex, propagated
/// through the (DFA state × graph vertex) space. Result sets are identical
/// to [`regular_path_query`].
pub fn regular_path_query_bfs(
    graph: &LabeledGraph,
    starts: Option<&BTreeSet<Vertex>>,
    finals: Option<&BTreeSet<Vertex>>,
    regex: &str,
) -> Result<BTreeSet<(Vertex, Vertex)>, QueryError> {
    regular_path_query_bfs_budgeted(graph, starts, finals, regex, &FixpointBudget::unlimited())
}

/// [`regular_path_query_bfs`] with an explicit fixpoint budget.
pub fn regular_path_query_bfs_budgeted(
    graph: &LabeledGraph,
    starts: Option<&BTreeSet<Vertex>>,
    finals: Option<&BTreeSet<Vertex>>,
    regex: &str,
    budget: &FixpointBudget,
) -> Result<BTreeSet<(Vertex, Vertex)>, QueryError> {
    let dfa = Regex::parse(regex)?.to_dfa();
    let graph_nfa = graph_to_nfa(graph, starts, finals);
    let graph_mat = AutomatonMatrix::from_nfa(&graph_nfa);
    let n = graph_mat.size();
    let m = dfa.num_states() as usize;

    let final_vertex_idx: BitSet = graph_mat.final_indices();
    let dfa_transitions: Vec<(usize, &str, usize)> = dfa
        .transitions()
        .map(|(q, label, q2)| (q as usize, label, q2 as usize))
        .collect();

    let mut result = BTreeSet::new();
    for start_state in graph_mat.start_states() {
        let si = graph_mat
            .index_of(start_state)
            .expect("start state is in the arena");

        // visited[q]: graph vertices reached while the DFA sits in state q.
        let mut visited: Vec<BitSet> = vec![BitSet::new(n); m];
        let mut front: Vec<BitSet> = vec![BitSet::new(n); m];
        visited[dfa.start() as usize].insert(si);
        front[dfa.start() as usize].insert(si);

        let mut iteration = 0usize;
        loop {
            budget.check(iteration)?;
            iteration += 1;

            let mut next: Vec<BitSet> = vec![BitSet::new(n); m];
            for &(q, label, q2) in &dfa_transitions {
                if front[q].is_empty() {
                    continue;
                }
                let Some(matrix) = graph_mat.transitions().get(label) else {
                    continue;
                };
                for v in front[q].iter() {
                    next[q2].union_with(matrix.row(v));
                }
            }

            let mut changed = false;
            for q in 0..m {
                let mut fresh = BitSet::new(n);
                for v in next[q].iter() {
                    if !visited[q].contains(v) {
                        fresh.insert(v);
                    }
                }
                visited[q].union_with(&fresh);
                changed |= !fresh.is_empty();
                front[q] = fresh;
            }
            if !changed {
                break;
            }
        }

        for &qf in dfa.final_states() {
            for v in visited[qf as usize].iter() {
                if final_vertex_idx.contains(v) {
                    result.insert((*start_state, *graph_mat.state_of(v)));
                }
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn pairs(items: &[(Vertex, Vertex)]) -> BTreeSet<(Vertex, Vertex)> {
        items.iter().copied().collect()
    }

    fn both(
        graph: &LabeledGraph,
        starts: Option<&BTreeSet<Vertex>>,
        finals: Option<&BTreeSet<Vertex>>,
        regex: &str,
    ) -> BTreeSet<(Vertex, Vertex)> {
        let tensor = regular_path_query(graph, starts, finals, regex).unwrap();
        let bfs = regular_path_query_bfs(graph, starts, finals, regex).unwrap();
        assert_eq!(tensor, bfs, "strategies disagree for {regex:?}");
        tensor
    }

    #[test]
    fn test_chain_with_star() {
        let g = LabeledGraph::from_edges([(0, "a", 1), (1, "b", 2), (2, "c", 0)]);
        let starts = BTreeSet::from([0]);
        let finals = BTreeSet::from([2]);
        let result = both(&g, Some(&starts), Some(&finals), "a.b.c*");
        assert_eq!(result, pairs(&[(0, 2)]));
    }

    #[test]
    fn test_empty_graph() {
        let g = LabeledGraph::new();
        let starts = BTreeSet::from([0]);
        let finals = BTreeSet::from([1]);
        let result = both(&g, Some(&starts), Some(&finals), "a");
        assert!(result.is_empty());
    }

    #[test]
    fn test_no_matching_paths() {
        let g = LabeledGraph::from_edges([(0, "b", 1)]);
        let starts = BTreeSet::from([0]);
        let finals = BTreeSet::from([1]);
        let result = both(&g, Some(&starts), Some(&finals), "a");
        assert!(result.is_empty());
    }

    #[test]
    fn test_self_loop_star() {
        let g = LabeledGraph::from_edges([(0, "a", 0)]);
        let starts = BTreeSet::from([0]);
        let result = both(&g, Some(&starts), Some(&starts), "a*");
        assert_eq!(result, pairs(&[(0, 0)]));
    }

    #[test]
    fn test_multiple_edges_between_same_nodes() {
        let mut g = LabeledGraph::new();
        g.add_edge(0, "a", 0);
        g.add_edge(0, "b", 0);
        let starts = BTreeSet::from([0]);
        let result = both(&g, Some(&starts), Some(&starts), "a.b");
        assert_eq!(result, pairs(&[(0, 0)]));
    }

    #[test]
    fn test_epsilon_pair_on_edgeless_vertex() {
        let mut g = LabeledGraph::new();
        g.add_vertex(3);
        let starts = BTreeSet::from([3]);
        // a* accepts the empty word, and the empty path at 3 has label ε.
        let result = both(&g, Some(&starts), Some(&starts), "a*");
        assert_eq!(result, pairs(&[(3, 3)]));
        // A regex that needs at least one symbol does not match.
        let result = both(&g, Some(&starts), Some(&starts), "a");
        assert!(result.is_empty());
    }

    #[test]
    fn test_default_vertex_sets() {
        let g = LabeledGraph::from_edges([(0, "a", 1), (1, "a", 2)]);
        let result = both(&g, None, None, "a.a");
        assert_eq!(result, pairs(&[(0, 2)]));
        let result = both(&g, None, None, "a");
        assert_eq!(result, pairs(&[(0, 1), (1, 2)]));
    }

    #[test]
    fn test_disjoint_graphs_queried_independently() {
        let g1 = LabeledGraph::from_edges([(0, "a", 0)]);
        let g2 = LabeledGraph::from_edges([(1, "b", 1)]);
        let s0 = BTreeSet::from([0]);
        let s1 = BTreeSet::from([1]);

        let mut combined = both(&g1, Some(&s0), Some(&s0), "a");
        combined.extend(both(&g2, Some(&s1), Some(&s1), "b"));
        assert_eq!(combined, pairs(&[(0, 0), (1, 1)]));
    }

    #[test]
    fn test_malformed_regex_is_rejected_up_front() {
        let g = LabeledGraph::from_edges([(0, "a", 1)]);
        let err = regular_path_query(&g, None, None, "(a").unwrap_err();
        assert!(matches!(err, QueryError::MalformedRegex(_)));
    }

    #[test]
    fn test_budget_cancellation() {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;

        let g = LabeledGraph::from_edges([(0, "a", 1), (1, "a", 0)]);
        let flag = Arc::new(AtomicBool::new(true));
        let budget = FixpointBudget::unlimited().with_cancel_flag(flag);
        let err = regular_path_query_budgeted(&g, None, None, "a*", &budget).unwrap_err();
        assert_eq!(err, QueryError::Cancelled);
    }
}
