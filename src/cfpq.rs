//! Context-free path queries: which vertex pairs are connected by a path
//! whose label sequence is derivable from a grammar's start symbol.
//!
//! Three interchangeable strategies, required to produce identical result
//! sets on the same inputs:
//!
//! - [`cfpq_with_hellings`]: worklist propagation over a
//!   (nonterminal, source, target) triple relation;
//! - [`cfpq_with_matrix`]: one boolean vertex matrix per nonterminal,
//!   saturated under `m[head] |= m[B] * m[C]`;
//! - [`cfpq_with_tensor`]: repeated Kronecker product of the flattened RSM
//!   matrix with a growing graph matrix.
//!
//! ε-derivable nonterminals relate every vertex to itself: the empty path
//! at `v` has label sequence ε. The tensor strategy encodes this by seeding
//! identity matrices for ε-capable labels; Hellings and the matrix strategy
//! seed `(N, v, v)` triples / diagonal cells directly.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::debug;

use crate::automaton::AutomatonMatrix;
use crate::budget::FixpointBudget;
use crate::cfg::{Grammar, Sym};
use crate::error::QueryError;
use crate::fa::graph_to_nfa;
use crate::graph::{LabeledGraph, Vertex};
use crate::matrix::BoolMatrix;
use crate::rsm::Rsm;

/// The vertices a query ranges over: the graph's vertices plus any vertex
/// named in the caller's start/final sets. All strategies agree on this
/// universe, which is what keeps their ε-pair handling identical.
fn vertex_universe(
    graph: &LabeledGraph,
    starts: Option<&BTreeSet<Vertex>>,
    finals: Option<&BTreeSet<Vertex>>,
) -> BTreeSet<Vertex> {
    let mut universe = graph.vertices().clone();
    if let Some(set) = starts {
        universe.extend(set.iter().copied());
    }
    if let Some(set) = finals {
        universe.extend(set.iter().copied());
    }
    universe
}

/// Resolves an optional vertex filter against the graph (default: all
/// graph vertices).
fn resolve_filter(
    graph: &LabeledGraph,
    set: Option<&BTreeSet<Vertex>>,
) -> BTreeSet<Vertex> {
    match set {
        Some(set) => set.clone(),
        None => graph.vertices().clone(),
    }
}

/// Evaluates a context-free path query. Delegates to
/// [`cfpq_with_hellings`].
pub fn evaluate_cfpq(
    grammar: &Grammar,
    graph: &LabeledGraph,
    starts: Option<&BTreeSet<Vertex>>,
    finals: Option<&BTreeSet<Vertex>>,
) -> Result<BTreeSet<(Vertex, Vertex)>, QueryError> {
    cfpq_with_hellings(grammar, graph, starts, finals)
}

// ---------------------------------------------------------------------------
// Hellings worklist
// ---------------------------------------------------------------------------

/// Derived triples plus the two access paths the propagation step needs.
struct TripleStore<'g> {
    relation: BTreeSet<(&'g str, Vertex, Vertex)>,
    /// target -> (nonterminal, source) of triples ending there
    incoming: BTreeMap<Vertex, Vec<(&'g str, Vertex)>>,
    /// source -> (nonterminal, target) of triples starting there
    outgoing: BTreeMap<Vertex, Vec<(&'g str, Vertex)>>,
}

impl<'g> TripleStore<'g> {
    fn new() -> Self {
        Self {
            relation: BTreeSet::new(),
            incoming: BTreeMap::new(),
            outgoing: BTreeMap::new(),
        }
    }

    /// Inserts a triple. Returns true if it is new.
    fn insert(&mut self, var: &'g str, source: Vertex, target: Vertex) -> bool {
        if !self.relation.insert((var, source, target)) {
            return false;
        }
        self.incoming.entry(target).or_default().push((var, source));
        self.outgoing.entry(source).or_default().push((var, target));
        true
    }
}

/// CFPQ by Hellings-style worklist propagation over a triple relation.
pub fn cfpq_with_hellings(
    grammar: &Grammar,
    graph: &LabeledGraph,
    starts: Option<&BTreeSet<Vertex>>,
    finals: Option<&BTreeSet<Vertex>>,
) -> Result<BTreeSet<(Vertex, Vertex)>, QueryError> {
    cfpq_with_hellings_budgeted(grammar, graph, starts, finals, &FixpointBudget::unlimited())
}

/// [`cfpq_with_hellings`] with an explicit fixpoint budget (checked once
/// per popped triple).
pub fn cfpq_with_hellings_budgeted(
    grammar: &Grammar,
    graph: &LabeledGraph,
    starts: Option<&BTreeSet<Vertex>>,
    finals: Option<&BTreeSet<Vertex>>,
    budget: &FixpointBudget,
) -> Result<BTreeSet<(Vertex, Vertex)>, QueryError> {
    let wnf = grammar.to_weak_normal_form();

    // Production indexes over the weak normal form.
    let mut by_terminal: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut eps_heads: Vec<&str> = Vec::new();
    // (first, second) -> heads of the binary productions with that body.
    let mut by_body: BTreeMap<(&str, &str), Vec<&str>> = BTreeMap::new();
    for p in wnf.productions() {
        match p.body.as_slice() {
            [] => eps_heads.push(&p.head),
            [Sym::Term(t)] => by_terminal.entry(t).or_default().push(&p.head),
            [Sym::Var(b), Sym::Var(c)] => {
                by_body.entry((b, c)).or_default().push(&p.head);
            }
            other => unreachable!("not in weak normal form: {other:?}"),
        }
    }

    let mut store = TripleStore::new();
    let mut queue: VecDeque<(&str, Vertex, Vertex)> = VecDeque::new();

    // Seed: single-terminal productions over edges, ε productions over the
    // whole vertex universe.
    for edge in graph.edges() {
        if let Some(heads) = by_terminal.get(edge.label.as_str()) {
            for &head in heads {
                if store.insert(head, edge.from, edge.to) {
                    queue.push_back((head, edge.from, edge.to));
                }
            }
        }
    }
    for &v in &vertex_universe(graph, starts, finals) {
        for &head in &eps_heads {
            if store.insert(head, v, v) {
                queue.push_back((head, v, v));
            }
        }
    }

    let mut iteration = 0usize;
    while let Some((ni, v, u)) = queue.pop_front() {
        budget.check(iteration)?;
        iteration += 1;

        // The popped triple as the *right* part: existing (Nj, w, v) chains
        // into it under Nk -> Nj Ni.
        let left_partners: Vec<(&str, Vertex)> =
            store.incoming.get(&v).cloned().unwrap_or_default();
        for (nj, w) in left_partners {
            if let Some(heads) = by_body.get(&(nj, ni)) {
                for &nk in heads {
                    if store.insert(nk, w, u) {
                        queue.push_back((nk, w, u));
                    }
                }
            }
        }

        // The popped triple as the *left* part: it chains into existing
        // (Nj, u, w) under Nk -> Ni Nj.
        let right_partners: Vec<(&str, Vertex)> =
            store.outgoing.get(&u).cloned().unwrap_or_default();
        for (nj, w) in right_partners {
            if let Some(heads) = by_body.get(&(ni, nj)) {
                for &nk in heads {
                    if store.insert(nk, v, w) {
                        queue.push_back((nk, v, w));
                    }
                }
            }
        }
    }

    debug!(
        "hellings: {} triples derived in {} pops",
        store.relation.len(),
        iteration
    );

    let start_filter = resolve_filter(graph, starts);
    let final_filter = resolve_filter(graph, finals);
    Ok(store
        .relation
        .iter()
        .filter(|(var, v, u)| {
            *var == wnf.start() && start_filter.contains(v) && final_filter.contains(u)
        })
        .map(|&(_, v, u)| (v, u))
        .collect())
}

// ---------------------------------------------------------------------------
// Production-matrix fixpoint
// ---------------------------------------------------------------------------

/// CFPQ by saturating one boolean vertex matrix per nonterminal under the
/// binary productions.
pub fn cfpq_with_matrix(
    grammar: &Grammar,
    graph: &LabeledGraph,
    starts: Option<&BTreeSet<Vertex>>,
    finals: Option<&BTreeSet<Vertex>>,
) -> Result<BTreeSet<(Vertex, Vertex)>, QueryError> {
    cfpq_with_matrix_budgeted(grammar, graph, starts, finals, &FixpointBudget::unlimited())
}

/// [`cfpq_with_matrix`] with an explicit fixpoint budget.
pub fn cfpq_with_matrix_budgeted(
    grammar: &Grammar,
    graph: &LabeledGraph,
    starts: Option<&BTreeSet<Vertex>>,
    finals: Option<&BTreeSet<Vertex>>,
    budget: &FixpointBudget,
) -> Result<BTreeSet<(Vertex, Vertex)>, QueryError> {
    let wnf = grammar.to_weak_normal_form();

    let vertices: Vec<Vertex> = vertex_universe(graph, starts, finals).into_iter().collect();
    let index: BTreeMap<Vertex, usize> =
        vertices.iter().enumerate().map(|(i, &v)| (v, i)).collect();
    let n = vertices.len();

    let mut matrices: BTreeMap<&str, BoolMatrix> = wnf
        .variables()
        .iter()
        .map(|v| (v.as_str(), BoolMatrix::new(n)))
        .collect();
    let mut binaries: Vec<(&str, &str, &str)> = Vec::new();

    for p in wnf.productions() {
        match p.body.as_slice() {
            [] => {
                let m = matrices.get_mut(p.head.as_str()).expect("head is a variable");
                m.or_assign(&BoolMatrix::identity(n));
            }
            [Sym::Term(t)] => {
                for edge in graph.edges() {
                    if edge.label == *t {
                        matrices
                            .get_mut(p.head.as_str())
                            .expect("head is a variable")
                            .set(index[&edge.from], index[&edge.to]);
                    }
                }
            }
            [Sym::Var(b), Sym::Var(c)] => binaries.push((&p.head, b, c)),
            other => unreachable!("not in weak normal form: {other:?}"),
        }
    }

    let mut iteration = 0usize;
    loop {
        budget.check(iteration)?;
        iteration += 1;

        let mut changed = false;
        for &(head, b, c) in &binaries {
            let product = matrices[b].mul(&matrices[c]);
            changed |= matrices
                .get_mut(head)
                .expect("head is a variable")
                .or_assign(&product);
        }
        if !changed {
            break;
        }
    }
    debug!("matrix cfpq: fixpoint after {} iterations", iteration);

    let start_filter = resolve_filter(graph, starts);
    let final_filter = resolve_filter(graph, finals);
    let mut result = BTreeSet::new();
    if let Some(matrix) = matrices.get(wnf.start()) {
        for (i, j) in matrix.iter() {
            let (v, u) = (vertices[i], vertices[j]);
            if start_filter.contains(&v) && final_filter.contains(&u) {
                result.insert((v, u));
            }
        }
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tensor fixpoint
// ---------------------------------------------------------------------------

/// CFPQ by the tensor algorithm: intersect the flattened RSM matrix with a
/// growing graph matrix; every closure path from a box start to a final of
/// the *same* box adds a nonterminal-labeled graph edge; stop when the
/// graph matrix stops growing.
pub fn cfpq_with_tensor(
    rsm: &Rsm,
    graph: &LabeledGraph,
    starts: Option<&BTreeSet<Vertex>>,
    finals: Option<&BTreeSet<Vertex>>,
) -> Result<BTreeSet<(Vertex, Vertex)>, QueryError> {
    cfpq_with_tensor_budgeted(rsm, graph, starts, finals, &FixpointBudget::unlimited())
}

/// [`cfpq_with_tensor`] with an explicit fixpoint budget.
pub fn cfpq_with_tensor_budgeted(
    rsm: &Rsm,
    graph: &LabeledGraph,
    starts: Option<&BTreeSet<Vertex>>,
    finals: Option<&BTreeSet<Vertex>>,
    budget: &FixpointBudget,
) -> Result<BTreeSet<(Vertex, Vertex)>, QueryError> {
    let (rsm_mat, epsilon_labels) = rsm.to_matrix();
    let mut graph_mat = AutomatonMatrix::from_nfa(&graph_to_nfa(graph, starts, finals));
    let n = graph_mat.size();
    if n == 0 {
        return Ok(BTreeSet::new());
    }

    // An ε-derivable nonterminal accepts the empty path at every vertex:
    // seed its graph matrix with the identity before the loop.
    for label in &epsilon_labels {
        graph_mat.matrix_mut(label).or_assign(&BoolMatrix::identity(n));
    }

    let rsm_start_idx = rsm_mat.start_indices();
    let rsm_final_idx = rsm_mat.final_indices();

    let mut last_nnz = graph_mat.nnz();
    let mut iteration = 0usize;
    loop {
        budget.check(iteration)?;
        iteration += 1;

        // RSM first, graph second: composite = rsm_index * n + graph_index.
        let product = rsm_mat.intersect(&graph_mat);
        let closure = product.merged_matrix().transitive_closure_budgeted(budget)?;

        for (i, j) in closure.iter() {
            let (r1, g1) = (i / n, i % n);
            let (r2, g2) = (j / n, j % n);
            if !rsm_start_idx.contains(r1) || !rsm_final_idx.contains(r2) {
                continue;
            }
            let s1 = rsm_mat.state_of(r1);
            let s2 = rsm_mat.state_of(r2);
            // A start→final path inside one box is a completed derivation
            // of that box's nonterminal.
            if s1.variable == s2.variable {
                graph_mat.matrix_mut(&s1.variable).set(g1, g2);
            }
        }

        let nnz = graph_mat.nnz();
        debug!("tensor iteration {}: graph nnz {}", iteration, nnz);
        if nnz == last_nnz {
            break;
        }
        last_nnz = nnz;
    }

    let start_filter = resolve_filter(graph, starts);
    let final_filter = resolve_filter(graph, finals);
    let mut result = BTreeSet::new();
    if let Some(matrix) = graph_mat.transitions().get(rsm.start()) {
        for (i, j) in matrix.iter() {
            let (v, u) = (*graph_mat.state_of(i), *graph_mat.state_of(j));
            if start_filter.contains(&v) && final_filter.contains(&u) {
                result.insert((v, u));
            }
        }
    }
    Ok(result)
}
