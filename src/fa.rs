//! Finite automata: NFA over opaque states, dense-state DFA, and the
//! ε-NFA used to compile regular expressions.
//!
//! [`Nfa`] is the exchange format of the crate: graphs become NFAs
//! ([`graph_to_nfa`]), regexes compile through [`EpsilonNfa`] into [`Dfa`]s,
//! and the matrix model ([`crate::automaton::AutomatonMatrix`]) is built
//! from and converts back to NFAs.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::graph::{LabeledGraph, Vertex};

/// A nondeterministic finite automaton over an opaque state type.
///
/// States are any ordered, clonable values; graph automata use vertex ids,
/// RSM automata use compound (nonterminal, inner-state) values. There are no
/// ε-transitions; ε is eliminated during regex compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nfa<S> {
    states: BTreeSet<S>,
    transitions: BTreeMap<S, BTreeMap<String, BTreeSet<S>>>,
    start_states: BTreeSet<S>,
    final_states: BTreeSet<S>,
}

impl<S: Clone + Ord> Nfa<S> {
    /// Creates an empty automaton.
    pub fn new() -> Self {
        Self {
            states: BTreeSet::new(),
            transitions: BTreeMap::new(),
            start_states: BTreeSet::new(),
            final_states: BTreeSet::new(),
        }
    }

    /// Registers a state without any transitions.
    pub fn add_state(&mut self, state: S) {
        self.states.insert(state);
    }

    /// Adds a transition, registering both endpoints as states.
    pub fn add_transition(&mut self, from: S, label: impl Into<String>, to: S) {
        self.states.insert(from.clone());
        self.states.insert(to.clone());
        self.transitions
            .entry(from)
            .or_default()
            .entry(label.into())
            .or_default()
            .insert(to);
    }

    /// Marks a state as a start state, registering it.
    pub fn add_start_state(&mut self, state: S) {
        self.states.insert(state.clone());
        self.start_states.insert(state);
    }

    /// Marks a state as a final state, registering it.
    pub fn add_final_state(&mut self, state: S) {
        self.states.insert(state.clone());
        self.final_states.insert(state);
    }

    pub fn states(&self) -> &BTreeSet<S> {
        &self.states
    }

    pub fn start_states(&self) -> &BTreeSet<S> {
        &self.start_states
    }

    pub fn final_states(&self) -> &BTreeSet<S> {
        &self.final_states
    }

    /// Replaces the start-state set, registering any new states.
    pub fn set_start_states(&mut self, states: BTreeSet<S>) {
        self.states.extend(states.iter().cloned());
        self.start_states = states;
    }

    /// Replaces the final-state set, registering any new states.
    pub fn set_final_states(&mut self, states: BTreeSet<S>) {
        self.states.extend(states.iter().cloned());
        self.final_states = states;
    }

    /// The set of transition labels.
    pub fn symbols(&self) -> BTreeSet<&str> {
        self.transitions
            .values()
            .flat_map(|by_label| by_label.keys().map(String::as_str))
            .collect()
    }

    /// Target states of `from` on `label`, if any.
    pub fn targets(&self, from: &S, label: &str) -> Option<&BTreeSet<S>> {
        self.transitions.get(from)?.get(label)
    }

    /// Iterates over all transitions as `(from, label, to)`.
    pub fn transitions(&self) -> impl Iterator<Item = (&S, &str, &S)> {
        self.transitions.iter().flat_map(|(from, by_label)| {
            by_label.iter().flat_map(move |(label, targets)| {
                targets.iter().map(move |to| (from, label.as_str(), to))
            })
        })
    }

    /// Number of states.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Simulates the automaton on `word`, one symbol per transition.
    /// Accepts iff some reached state is final.
    pub fn accepts<'a>(&self, word: impl IntoIterator<Item = &'a str>) -> bool {
        let mut current: BTreeSet<S> = self.start_states.clone();
        for symbol in word {
            let mut next = BTreeSet::new();
            for state in &current {
                if let Some(targets) = self.targets(state, symbol) {
                    next.extend(targets.iter().cloned());
                }
            }
            if next.is_empty() {
                return false;
            }
            current = next;
        }
        current.iter().any(|s| self.final_states.contains(s))
    }
}

/// Builds the automaton of a labeled graph: one state per vertex, one
/// transition per edge.
///
/// `starts`/`finals` default to *all* vertices when `None`. Vertices named
/// in the sets but absent from the graph are added as isolated states, so a
/// query over a vertex the graph never mentions is well-defined (and empty).
pub fn graph_to_nfa(
    graph: &LabeledGraph,
    starts: Option<&BTreeSet<Vertex>>,
    finals: Option<&BTreeSet<Vertex>>,
) -> Nfa<Vertex> {
    let mut nfa = Nfa::new();
    for &v in graph.vertices() {
        nfa.add_state(v);
    }
    for edge in graph.edges() {
        nfa.add_transition(edge.from, edge.label.clone(), edge.to);
    }
    match starts {
        Some(set) => {
            for &v in set {
                nfa.add_start_state(v);
            }
        }
        None => {
            for &v in graph.vertices() {
                nfa.add_start_state(v);
            }
        }
    }
    match finals {
        Some(set) => {
            for &v in set {
                nfa.add_final_state(v);
            }
        }
        None => {
            for &v in graph.vertices() {
                nfa.add_final_state(v);
            }
        }
    }
    nfa
}

/// A deterministic finite automaton over dense `u32` states.
///
/// Produced by subset construction ([`EpsilonNfa::to_dfa`]). The transition
/// function is partial: a missing entry is an implicit reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dfa {
    num_states: u32,
    start: u32,
    final_states: BTreeSet<u32>,
    transitions: BTreeMap<(u32, String), u32>,
}

impl Dfa {
    pub fn num_states(&self) -> u32 {
        self.num_states
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn final_states(&self) -> &BTreeSet<u32> {
        &self.final_states
    }

    /// The transition from `state` on `label`, if defined.
    pub fn transition(&self, state: u32, label: &str) -> Option<u32> {
        self.transitions.get(&(state, label.to_string())).copied()
    }

    /// Iterates over all transitions as `(from, label, to)`.
    pub fn transitions(&self) -> impl Iterator<Item = (u32, &str, u32)> {
        self.transitions
            .iter()
            .map(|((from, label), &to)| (*from, label.as_str(), to))
    }

    /// The input alphabet.
    pub fn alphabet(&self) -> BTreeSet<&str> {
        self.transitions
            .keys()
            .map(|(_, label)| label.as_str())
            .collect()
    }

    /// True iff the automaton accepts the empty word.
    pub fn accepts_epsilon(&self) -> bool {
        self.final_states.contains(&self.start)
    }

    /// Runs the automaton on `word`.
    pub fn accepts<'a>(&self, word: impl IntoIterator<Item = &'a str>) -> bool {
        let mut state = self.start;
        for symbol in word {
            match self.transition(state, symbol) {
                Some(next) => state = next,
                None => return false,
            }
        }
        self.final_states.contains(&state)
    }

    /// Views the DFA as an NFA (every DFA is one).
    pub fn to_nfa(&self) -> Nfa<u32> {
        let mut nfa = Nfa::new();
        for state in 0..self.num_states {
            nfa.add_state(state);
        }
        for (from, label, to) in self.transitions() {
            nfa.add_transition(from, label, to);
        }
        nfa.add_start_state(self.start);
        for &f in &self.final_states {
            nfa.add_final_state(f);
        }
        nfa
    }
}

/// An NFA with ε-transitions over dense `u32` states.
///
/// The construction target of Thompson compilation and the source of both
/// subset construction (→ [`Dfa`]) and ε-elimination (→ [`Nfa<u32>`]).
#[derive(Debug, Clone, Default)]
pub struct EpsilonNfa {
    num_states: u32,
    start_states: BTreeSet<u32>,
    final_states: BTreeSet<u32>,
    /// `None` label is ε.
    transitions: BTreeMap<(u32, Option<String>), BTreeSet<u32>>,
    alphabet: BTreeSet<String>,
}

impl EpsilonNfa {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh state and returns its id.
    pub fn add_state(&mut self) -> u32 {
        let id = self.num_states;
        self.num_states += 1;
        id
    }

    pub fn num_states(&self) -> u32 {
        self.num_states
    }

    pub fn start_states(&self) -> &BTreeSet<u32> {
        &self.start_states
    }

    pub fn final_states(&self) -> &BTreeSet<u32> {
        &self.final_states
    }

    pub fn add_start_state(&mut self, state: u32) {
        debug_assert!(state < self.num_states);
        self.start_states.insert(state);
    }

    pub fn add_final_state(&mut self, state: u32) {
        debug_assert!(state < self.num_states);
        self.final_states.insert(state);
    }

    /// Adds a labeled transition.
    pub fn add_transition(&mut self, from: u32, label: impl Into<String>, to: u32) {
        debug_assert!(from < self.num_states && to < self.num_states);
        let label = label.into();
        self.alphabet.insert(label.clone());
        self.transitions
            .entry((from, Some(label)))
            .or_default()
            .insert(to);
    }

    /// Adds an ε-transition.
    pub fn add_epsilon_transition(&mut self, from: u32, to: u32) {
        debug_assert!(from < self.num_states && to < self.num_states);
        self.transitions.entry((from, None)).or_default().insert(to);
    }

    /// ε-closure of a set of states, by DFS.
    pub fn epsilon_closure(&self, states: &BTreeSet<u32>) -> BTreeSet<u32> {
        let mut closure = BTreeSet::new();
        let mut stack: Vec<u32> = states.iter().copied().collect();
        while let Some(s) = stack.pop() {
            if !closure.insert(s) {
                continue;
            }
            if let Some(targets) = self.transitions.get(&(s, None)) {
                for &t in targets {
                    if !closure.contains(&t) {
                        stack.push(t);
                    }
                }
            }
        }
        closure
    }

    /// States reachable from the (already ε-closed) set `states` on `symbol`,
    /// ε-closed afterwards.
    fn move_on(&self, states: &BTreeSet<u32>, symbol: &str) -> BTreeSet<u32> {
        let mut reached = BTreeSet::new();
        for &s in states {
            if let Some(targets) = self.transitions.get(&(s, Some(symbol.to_string()))) {
                reached.extend(targets.iter().copied());
            }
        }
        self.epsilon_closure(&reached)
    }

    /// Subset construction. Powerset states are interned as dense `u32` ids;
    /// the empty set is a valid (sink) state so the start id always exists.
    pub fn to_dfa(&self) -> Dfa {
        let mut intern: HashMap<Vec<u32>, u32> = HashMap::new();
        let mut sets: Vec<BTreeSet<u32>> = Vec::new();
        let mut transitions = BTreeMap::new();
        let mut finals = BTreeSet::new();

        let start_set = self.epsilon_closure(&self.start_states);
        let start_key: Vec<u32> = start_set.iter().copied().collect();
        intern.insert(start_key, 0);
        sets.push(start_set);

        let mut queue: VecDeque<u32> = VecDeque::from([0]);
        while let Some(id) = queue.pop_front() {
            let set = sets[id as usize].clone();
            if set.iter().any(|s| self.final_states.contains(s)) {
                finals.insert(id);
            }
            for symbol in &self.alphabet {
                let target = self.move_on(&set, symbol);
                if target.is_empty() {
                    continue;
                }
                let key: Vec<u32> = target.iter().copied().collect();
                let target_id = match intern.get(&key) {
                    Some(&existing) => existing,
                    None => {
                        let fresh = sets.len() as u32;
                        intern.insert(key, fresh);
                        sets.push(target);
                        queue.push_back(fresh);
                        fresh
                    }
                };
                transitions.insert((id, symbol.clone()), target_id);
            }
        }

        Dfa {
            num_states: sets.len() as u32,
            start: 0,
            final_states: finals,
            transitions,
        }
    }

    /// Eliminates ε-transitions: `δ'(s, a) = closure(move(closure(s), a))`,
    /// and a state becomes final iff its closure contains a final state.
    pub fn into_nfa(self) -> Nfa<u32> {
        let mut nfa = Nfa::new();
        for s in 0..self.num_states {
            nfa.add_state(s);
        }
        for s in 0..self.num_states {
            let closure = self.epsilon_closure(&BTreeSet::from([s]));
            if closure.iter().any(|t| self.final_states.contains(t)) {
                nfa.add_final_state(s);
            }
            for symbol in &self.alphabet {
                for t in self.move_on(&closure, symbol) {
                    nfa.add_transition(s, symbol.clone(), t);
                }
            }
        }
        for &s in &self.start_states {
            nfa.add_start_state(s);
        }
        nfa
    }

    /// Copies `other` into `self`, renumbering its states by a fixed offset.
    /// Returns the offset.
    fn append(&mut self, other: &EpsilonNfa) -> u32 {
        let offset = self.num_states;
        self.num_states += other.num_states;
        for ((from, label), targets) in &other.transitions {
            let entry = self
                .transitions
                .entry((from + offset, label.clone()))
                .or_default();
            for &t in targets {
                entry.insert(t + offset);
            }
        }
        self.alphabet.extend(other.alphabet.iter().cloned());
        offset
    }

    /// Language union. States of both operands are renumbered.
    pub fn union(&self, other: &EpsilonNfa) -> EpsilonNfa {
        let mut out = self.clone();
        let offset = out.append(other);
        for &s in &other.start_states {
            out.start_states.insert(s + offset);
        }
        for &f in &other.final_states {
            out.final_states.insert(f + offset);
        }
        out
    }

    /// Language concatenation: ε-edges from every final of `self` to every
    /// start of `other`.
    pub fn concat(&self, other: &EpsilonNfa) -> EpsilonNfa {
        let mut out = self.clone();
        let offset = out.append(other);
        for &f in &self.final_states {
            for &s in &other.start_states {
                out.add_epsilon_transition(f, s + offset);
            }
        }
        out.final_states = other.final_states.iter().map(|&f| f + offset).collect();
        out
    }

    /// Kleene star: a fresh hub state that is both the only start and the
    /// only final, ε-connected to the old starts and from the old finals.
    pub fn star(&self) -> EpsilonNfa {
        let mut out = self.clone();
        let hub = out.add_state();
        for &s in &self.start_states {
            out.add_epsilon_transition(hub, s);
        }
        for &f in &self.final_states {
            out.add_epsilon_transition(f, hub);
        }
        out.start_states = BTreeSet::from([hub]);
        out.final_states = BTreeSet::from([hub]);
        out
    }

    /// Renumbers an [`Nfa<u32>`] into a dense ε-NFA. The original state ids
    /// are not preserved.
    pub fn from_nfa(nfa: &Nfa<u32>) -> EpsilonNfa {
        let index: BTreeMap<u32, u32> = nfa
            .states()
            .iter()
            .enumerate()
            .map(|(i, &s)| (s, i as u32))
            .collect();
        let mut out = EpsilonNfa::new();
        for _ in 0..index.len() {
            out.add_state();
        }
        for (from, label, to) in nfa.transitions() {
            out.add_transition(index[from], label, index[to]);
        }
        for s in nfa.start_states() {
            out.add_start_state(index[s]);
        }
        for f in nfa.final_states() {
            out.add_final_state(index[f]);
        }
        out
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

    #[test]
    fn test_nfa_accepts() {
        let mut nfa = Nfa::new();
        nfa.add_transition(0u32, "a", 1);
        nfa.add_transition(0, "a", 2);
        nfa.add_transition(2, "b", 3);
        nfa.add_start_state(0);
        nfa.add_final_state(3);

        assert!(nfa.accepts(word("a b")));
        assert!(!nfa.accepts(word("a")));
        assert!(!nfa.accepts(word("b")));
        assert!(!nfa.accepts(word("")));
    }

    #[test]
    fn test_graph_to_nfa_defaults() {
        let g = LabeledGraph::from_edges([(0, "a", 1), (1, "b", 2)]);
        let nfa = graph_to_nfa(&g, None, None);
        assert_eq!(nfa.num_states(), 3);
        assert_eq!(nfa.start_states().len(), 3);
        assert_eq!(nfa.final_states().len(), 3);
        assert!(nfa.accepts(word("a b")));
        assert!(nfa.accepts(word("b")));
    }

    #[test]
    fn test_graph_to_nfa_with_sets() {
        let g = LabeledGraph::from_edges([(0, "a", 1)]);
        let starts = BTreeSet::from([0]);
        let finals = BTreeSet::from([5]); // not in the graph
        let nfa = graph_to_nfa(&g, Some(&starts), Some(&finals));
        assert!(nfa.states().contains(&5));
        assert!(!nfa.accepts(word("a")));
    }

    #[test]
    fn test_epsilon_closure() {
        let mut enfa = EpsilonNfa::new();
        let s0 = enfa.add_state();
        let s1 = enfa.add_state();
        let s2 = enfa.add_state();
        enfa.add_epsilon_transition(s0, s1);
        enfa.add_epsilon_transition(s1, s2);

        let closure = enfa.epsilon_closure(&BTreeSet::from([s0]));
        assert_eq!(closure, BTreeSet::from([s0, s1, s2]));
    }

    #[test]
    fn test_subset_construction() {
        // (a|b)* b: nondeterministic on 'b'
        let mut enfa = EpsilonNfa::new();
        let s0 = enfa.add_state();
        let s1 = enfa.add_state();
        enfa.add_transition(s0, "a", s0);
        enfa.add_transition(s0, "b", s0);
        enfa.add_transition(s0, "b", s1);
        enfa.add_start_state(s0);
        enfa.add_final_state(s1);

        let dfa = enfa.to_dfa();
        assert!(dfa.accepts(word("b")));
        assert!(dfa.accepts(word("a b a b")));
        assert!(!dfa.accepts(word("a")));
        assert!(!dfa.accepts(word("")));
        // {s0} and {s0, s1} are the only reachable subsets
        assert_eq!(dfa.num_states(), 2);
    }

    #[test]
    fn test_into_nfa_matches_dfa() {
        let mut enfa = EpsilonNfa::new();
        let s0 = enfa.add_state();
        let s1 = enfa.add_state();
        let s2 = enfa.add_state();
        enfa.add_transition(s0, "a", s1);
        enfa.add_epsilon_transition(s1, s2);
        enfa.add_transition(s2, "b", s0);
        enfa.add_start_state(s0);
        enfa.add_final_state(s2);

        let dfa = enfa.clone().to_dfa();
        let nfa = enfa.into_nfa();
        for w in ["", "a", "a b", "a b a", "b"] {
            assert_eq!(nfa.accepts(word(w)), dfa.accepts(word(w)), "word {w:?}");
        }
    }

    #[test]
    fn test_combinators() {
        let mut a = EpsilonNfa::new();
        let a0 = a.add_state();
        let a1 = a.add_state();
        a.add_transition(a0, "a", a1);
        a.add_start_state(a0);
        a.add_final_state(a1);

        let mut b = EpsilonNfa::new();
        let b0 = b.add_state();
        let b1 = b.add_state();
        b.add_transition(b0, "b", b1);
        b.add_start_state(b0);
        b.add_final_state(b1);

        let union = a.union(&b).to_dfa();
        assert!(union.accepts(word("a")));
        assert!(union.accepts(word("b")));
        assert!(!union.accepts(word("a b")));

        let concat = a.concat(&b).to_dfa();
        assert!(concat.accepts(word("a b")));
        assert!(!concat.accepts(word("a")));

        let star = a.star().to_dfa();
        assert!(star.accepts(word("")));
        assert!(star.accepts(word("a a a")));
        assert!(!star.accepts(word("b")));
    }
}
