//! The automaton matrix model: finite automata as decomposed boolean
//! adjacency matrices.
//!
//! An [`AutomatonMatrix`] keeps one [`BoolMatrix`] per transition label,
//! plus the start/final *state* sets and a dense state arena. States stay
//! opaque values; matrices are indexed by their arena position. The arena is
//! sorted before numbering, so the state ↔ index bijection is deterministic
//! for a given automaton.
//!
//! The two operations everything else is built on live here: the Kronecker
//! product intersection ([`AutomatonMatrix::intersect`]) and the
//! label-merged transitive closure ([`AutomatonMatrix::transitive_closure`]).

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::bitset::BitSet;
use crate::fa::Nfa;
use crate::matrix::BoolMatrix;

/// A finite automaton in matrix form.
///
/// Invariant: every matrix in `transitions` is N×N where N is the arena
/// size, and the arena is a total bijection between states and `[0, N)`.
#[derive(Debug, Clone)]
pub struct AutomatonMatrix<S> {
    transitions: BTreeMap<String, BoolMatrix>,
    start_states: BTreeSet<S>,
    final_states: BTreeSet<S>,
    /// Arena: index -> state.
    states: Vec<S>,
    /// Side table: state -> index.
    index: BTreeMap<S, usize>,
}

impl<S: Clone + Ord> AutomatonMatrix<S> {
    /// Decomposes an NFA into one boolean matrix per label.
    ///
    /// A nondeterministic transition to a set of targets sets one cell per
    /// target. States are numbered in sorted order.
    pub fn from_nfa(nfa: &Nfa<S>) -> Self {
        let states: Vec<S> = nfa.states().iter().cloned().collect();
        let index: BTreeMap<S, usize> = states
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        let n = states.len();

        let mut transitions: BTreeMap<String, BoolMatrix> = BTreeMap::new();
        for (from, label, to) in nfa.transitions() {
            transitions
                .entry(label.to_string())
                .or_insert_with(|| BoolMatrix::new(n))
                .set(index[from], index[to]);
        }

        Self {
            transitions,
            start_states: nfa.start_states().clone(),
            final_states: nfa.final_states().clone(),
            states,
            index,
        }
    }

    /// Rebuilds the NFA. Exact left inverse of [`from_nfa`](Self::from_nfa)
    /// (states, transitions, and start/final sets are reproduced verbatim).
    pub fn to_nfa(&self) -> Nfa<S> {
        let mut nfa = Nfa::new();
        for state in &self.states {
            nfa.add_state(state.clone());
        }
        for (label, matrix) in &self.transitions {
            for (i, j) in matrix.iter() {
                nfa.add_transition(self.states[i].clone(), label.clone(), self.states[j].clone());
            }
        }
        for s in &self.start_states {
            nfa.add_start_state(s.clone());
        }
        for f in &self.final_states {
            nfa.add_final_state(f.clone());
        }
        nfa
    }

    /// Number of states.
    pub fn size(&self) -> usize {
        self.states.len()
    }

    /// The state arena, index order.
    pub fn states(&self) -> &[S] {
        &self.states
    }

    /// The state at arena index `i`.
    pub fn state_of(&self, i: usize) -> &S {
        &self.states[i]
    }

    /// The arena index of `state`, if it exists.
    pub fn index_of(&self, state: &S) -> Option<usize> {
        self.index.get(state).copied()
    }

    pub fn start_states(&self) -> &BTreeSet<S> {
        &self.start_states
    }

    pub fn final_states(&self) -> &BTreeSet<S> {
        &self.final_states
    }

    /// Label → matrix map.
    pub fn transitions(&self) -> &BTreeMap<String, BoolMatrix> {
        &self.transitions
    }

    /// The matrix for `label`, created zeroed if absent. This is how the
    /// tensor evaluator grows the graph matrix with nonterminal labels.
    pub fn matrix_mut(&mut self, label: &str) -> &mut BoolMatrix {
        let n = self.states.len();
        self.transitions
            .entry(label.to_string())
            .or_insert_with(|| BoolMatrix::new(n))
    }

    /// Total number of set cells across all label matrices.
    pub fn nnz(&self) -> usize {
        self.transitions.values().map(BoolMatrix::nnz).sum()
    }

    /// Start states as arena indices.
    pub fn start_indices(&self) -> BitSet {
        self.start_states
            .iter()
            .filter_map(|s| self.index_of(s))
            .collect()
    }

    /// Final states as arena indices.
    pub fn final_indices(&self) -> BitSet {
        self.final_states
            .iter()
            .filter_map(|s| self.index_of(s))
            .collect()
    }

    /// Simulates the automaton on `word` from the start-state set.
    pub fn accepts<'a>(&self, word: impl IntoIterator<Item = &'a str>) -> bool {
        let mut current = self.start_indices();
        for symbol in word {
            let Some(matrix) = self.transitions.get(symbol) else {
                return false;
            };
            let mut next = BitSet::new(self.size());
            for i in current.iter() {
                next.union_with(matrix.row(i));
            }
            if next.is_empty() {
                return false;
            }
            current = next;
        }
        current.intersects(&self.final_indices())
    }

    /// True iff the automaton accepts no word at all.
    ///
    /// This is the strong, reachability-based reading: the automaton is
    /// non-empty if a start state is also final (the empty word), or if a
    /// final state is reachable from a start state through the closure of
    /// the merged matrix. "No transition matrix has a set cell" is a weaker
    /// condition and is *not* what this method checks.
    pub fn is_empty(&self) -> bool {
        if self.start_states.iter().any(|s| self.final_states.contains(s)) {
            return false;
        }
        if self.states.is_empty() {
            return true;
        }
        let closure = self.transitive_closure();
        let finals = self.final_indices();
        !self
            .start_indices()
            .iter()
            .any(|i| closure.row(i).intersects(&finals))
    }

    /// OR of all per-label matrices: the label-blind adjacency matrix.
    pub fn merged_matrix(&self) -> BoolMatrix {
        let mut merged = BoolMatrix::new(self.size());
        for matrix in self.transitions.values() {
            merged.or_assign(matrix);
        }
        merged
    }

    /// Transitive closure of the merged matrix.
    pub fn transitive_closure(&self) -> BoolMatrix {
        self.merged_matrix().transitive_closure()
    }

    /// Kronecker-product intersection.
    ///
    /// Only labels present in both operands survive; each surviving label's
    /// matrix is the Kronecker product of the operand matrices. The product
    /// runs over composite indices `i1 * N2 + i2` (second operand fastest),
    /// and its state arena is the identity over those indices. A composite
    /// state is start (final) iff both components are.
    ///
    /// Operands sharing no labels still produce meaningful start/final
    /// sets; the product then accepts at most the empty word.
    pub fn intersect<T: Clone + Ord>(&self, other: &AutomatonMatrix<T>) -> AutomatonMatrix<usize> {
        let n1 = self.size();
        let n2 = other.size();

        let mut transitions = BTreeMap::new();
        for (label, lhs) in &self.transitions {
            if let Some(rhs) = other.transitions.get(label) {
                transitions.insert(label.clone(), lhs.kronecker(rhs));
            }
        }

        let mut start_states = BTreeSet::new();
        for u in &self.start_states {
            for v in &other.start_states {
                start_states.insert(self.index[u] * n2 + other.index[v]);
            }
        }
        let mut final_states = BTreeSet::new();
        for u in &self.final_states {
            for v in &other.final_states {
                final_states.insert(self.index[u] * n2 + other.index[v]);
            }
        }

        let states: Vec<usize> = (0..n1 * n2).collect();
        let index = states.iter().map(|&i| (i, i)).collect();

        debug!(
            "product automaton: {} x {} states, {} shared labels",
            n1,
            n2,
            transitions.len()
        );

        AutomatonMatrix {
            transitions,
            start_states,
            final_states,
            states,
            index,
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn word(s: &str) -> Vec<&str> {
        if s.is_empty() {
            vec![]
        } else {
            s.split(' ').collect()
        }
    }

    fn sample_nfa() -> Nfa<u32> {
        let mut nfa = Nfa::new();
        nfa.add_transition(0u32, "a", 1);
        nfa.add_transition(0, "a", 2);
        nfa.add_transition(1, "b", 2);
        nfa.add_transition(2, "b", 2);
        nfa.add_start_state(0);
        nfa.add_final_state(2);
        nfa
    }

    #[test]
    fn test_from_nfa_shapes() {
        let m = AutomatonMatrix::from_nfa(&sample_nfa());
        assert_eq!(m.size(), 3);
        assert_eq!(m.transitions().len(), 2);
        // Nondeterministic a-transition sets two cells
        assert_eq!(m.transitions()["a"].nnz(), 2);
        assert_eq!(m.transitions()["b"].nnz(), 2);
    }

    #[test]
    fn test_round_trip_exact() {
        let nfa = sample_nfa();
        let back = AutomatonMatrix::from_nfa(&nfa).to_nfa();
        assert_eq!(back, nfa);
    }

    #[test]
    fn test_accepts() {
        let m = AutomatonMatrix::from_nfa(&sample_nfa());
        assert!(m.accepts(word("a")));
        assert!(m.accepts(word("a b b")));
        assert!(!m.accepts(word("b")));
        assert!(!m.accepts(word("")));
        assert!(!m.accepts(word("a c")));
    }

    #[test]
    fn test_is_empty_is_reachability() {
        // Edges exist, but no final state is reachable from the start.
        let mut nfa = Nfa::new();
        nfa.add_transition(0u32, "a", 1);
        nfa.add_transition(2, "b", 3);
        nfa.add_start_state(0);
        nfa.add_final_state(3);
        assert!(AutomatonMatrix::from_nfa(&nfa).is_empty());

        // The empty word: start == final, no edges at all.
        let mut nfa = Nfa::new();
        nfa.add_start_state(0u32);
        nfa.add_final_state(0);
        assert!(!AutomatonMatrix::from_nfa(&nfa).is_empty());
    }

    #[test]
    fn test_intersect_composite_indexing() {
        let mut a = Nfa::new();
        a.add_transition(0u32, "x", 1);
        a.add_start_state(0);
        a.add_final_state(1);

        let mut b = Nfa::new();
        b.add_transition(0u32, "x", 1);
        b.add_transition(1, "x", 1);
        b.add_start_state(0);
        b.add_final_state(1);

        let ma = AutomatonMatrix::from_nfa(&a);
        let mb = AutomatonMatrix::from_nfa(&b);
        let product = ma.intersect(&mb);

        assert_eq!(product.size(), 4);
        // (0,0) -> (1,1): composite 0*2+0 = 0 to 1*2+1 = 3
        assert!(product.transitions()["x"].get(0, 3));
        assert!(product.start_states().contains(&0));
        assert!(product.final_states().contains(&3));
        assert!(product.accepts(word("x")));
    }

    #[test]
    fn test_intersect_commutes_up_to_relabeling() {
        let ma = AutomatonMatrix::from_nfa(&sample_nfa());

        let mut other = Nfa::new();
        other.add_transition(0u32, "a", 0);
        other.add_transition(0, "b", 1);
        other.add_transition(1, "b", 1);
        other.add_start_state(0);
        other.add_final_state(1);
        let mb = AutomatonMatrix::from_nfa(&other);

        let ab = ma.intersect(&mb);
        let ba = mb.intersect(&ma);
        for w in ["", "a", "b", "a b", "a b b", "b a", "a a b"] {
            assert_eq!(ab.accepts(word(w)), ba.accepts(word(w)), "word {w:?}");
        }
    }

    #[test]
    fn test_intersect_disjoint_labels() {
        let mut a = Nfa::new();
        a.add_transition(0u32, "x", 1);
        a.add_start_state(0);
        a.add_final_state(0);

        let mut b = Nfa::new();
        b.add_transition(0u32, "y", 1);
        b.add_start_state(0);
        b.add_final_state(0);

        let product = AutomatonMatrix::from_nfa(&a).intersect(&AutomatonMatrix::from_nfa(&b));
        // No shared labels: no transition matrices, but start/final survive
        // and the product still accepts the empty word.
        assert!(product.transitions().is_empty());
        assert!(!product.is_empty());
        assert!(!product.accepts(word("x")));
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    fn arb_nfa() -> impl Strategy<Value = Nfa<u32>> {
        (1u32..6).prop_flat_map(|n| {
            let edge = (0..n, prop::sample::select(vec!["a", "b"]), 0..n);
            (
                Just(n),
                prop::collection::vec(edge, 0..12),
                prop::collection::btree_set(0..n, 0..=n as usize),
                prop::collection::btree_set(0..n, 0..=n as usize),
            )
                .prop_map(|(n, edges, starts, finals)| {
                    let mut nfa = Nfa::new();
                    for s in 0..n {
                        nfa.add_state(s);
                    }
                    for (from, label, to) in edges {
                        nfa.add_transition(from, label, to);
                    }
                    for s in starts {
                        nfa.add_start_state(s);
                    }
                    for f in finals {
                        nfa.add_final_state(f);
                    }
                    nfa
                })
        })
    }

    fn arb_word() -> impl Strategy<Value = Vec<&'static str>> {
        prop::collection::vec(prop::sample::select(vec!["a", "b"]), 0..5)
    }

    proptest! {
        #[test]
        fn round_trip_reproduces_nfa(nfa in arb_nfa()) {
            let back = AutomatonMatrix::from_nfa(&nfa).to_nfa();
            prop_assert_eq!(back, nfa);
        }

        #[test]
        fn matrix_accepts_matches_nfa(nfa in arb_nfa(), word in arb_word()) {
            let matrix = AutomatonMatrix::from_nfa(&nfa);
            prop_assert_eq!(
                matrix.accepts(word.iter().copied()),
                nfa.accepts(word.iter().copied())
            );
        }

        #[test]
        fn closure_is_idempotent(nfa in arb_nfa()) {
            let matrix = AutomatonMatrix::from_nfa(&nfa);
            let once = matrix.transitive_closure();
            prop_assert_eq!(once.transitive_closure(), once);
        }
    }
}
