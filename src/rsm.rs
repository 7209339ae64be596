//! Recursive state machines: one DFA "box" per grammar nonterminal.
//!
//! A box recognizes the right-hand sides of its nonterminal's productions as
//! words over {terminals ∪ nonterminals}; a nonterminal occurring in a body
//! is an ordinary transition label of the box, and a completed start→final
//! path *inside one box* stands for a completed derivation of that box's
//! nonterminal. Flattening produces a single [`AutomatonMatrix`] whose
//! states carry their owning nonterminal, so states of different boxes never
//! collide.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::automaton::AutomatonMatrix;
use crate::cfg::Grammar;
use crate::error::QueryError;
use crate::fa::{Dfa, Nfa};
use crate::regex::Regex;

/// A flattened RSM state: the owning nonterminal plus the inner DFA state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RsmState {
    pub variable: String,
    pub state: u32,
}

impl RsmState {
    pub fn new(variable: impl Into<String>, state: u32) -> Self {
        Self {
            variable: variable.into(),
            state,
        }
    }
}

impl fmt::Display for RsmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.variable, self.state)
    }
}

/// A recursive state machine: a designated start nonterminal and one
/// deterministic box per nonterminal.
#[derive(Debug, Clone)]
pub struct Rsm {
    start: String,
    boxes: BTreeMap<String, Dfa>,
}

impl Rsm {
    /// Builds the RSM of a context-free grammar.
    ///
    /// The grammar is converted to weak normal form first; skipping that
    /// conversion would leave unit productions and useless symbols in the
    /// boxes and change the recognized relation.
    pub fn from_grammar(grammar: &Grammar) -> Rsm {
        let wnf = grammar.to_weak_normal_form();

        let mut regexes: BTreeMap<String, Regex> = BTreeMap::new();
        for p in wnf.productions() {
            let body = if p.body.is_empty() {
                Regex::Epsilon
            } else {
                let mut syms = p.body.iter().map(|sym| Regex::symbol(sym.name()));
                let first = syms.next().expect("body is nonempty");
                syms.fold(first, Regex::concat)
            };
            regexes
                .entry(p.head.clone())
                .and_modify(|r| *r = Regex::union(r.clone(), body.clone()))
                .or_insert(body);
        }

        let boxes = regexes
            .into_iter()
            .map(|(var, regex)| (var, regex.to_dfa()))
            .collect();
        Rsm {
            start: wnf.start().to_string(),
            boxes,
        }
    }

    /// Builds an RSM from EBNF text: lines of `Head -> regex`, where the
    /// regex ranges over terminals and nonterminal names (see
    /// [`Regex::parse`] for the syntax). Repeated heads are unioned; an
    /// empty body is the empty word. Start nonterminal is `S`.
    pub fn from_ebnf(text: &str) -> Result<Rsm, QueryError> {
        Self::from_ebnf_with_start(text, "S")
    }

    /// [`from_ebnf`](Self::from_ebnf) with an explicit start nonterminal.
    pub fn from_ebnf_with_start(text: &str, start: &str) -> Result<Rsm, QueryError> {
        let mut regexes: BTreeMap<String, Regex> = BTreeMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((head, body)) = line.split_once("->") else {
                return Err(QueryError::MalformedGrammar(format!(
                    "line {}: missing `->`",
                    lineno + 1
                )));
            };
            let head = head.trim();
            if head.is_empty() || head.split_whitespace().count() != 1 {
                return Err(QueryError::MalformedGrammar(format!(
                    "line {}: head must be a single symbol",
                    lineno + 1
                )));
            }
            let body = body.trim();
            let regex = if body.is_empty() {
                Regex::Epsilon
            } else {
                Regex::parse(body)?
            };
            regexes
                .entry(head.to_string())
                .and_modify(|r| *r = Regex::union(r.clone(), regex.clone()))
                .or_insert(regex);
        }
        let boxes = regexes
            .into_iter()
            .map(|(var, regex)| (var, regex.to_dfa()))
            .collect();
        Ok(Rsm {
            start: start.to_string(),
            boxes,
        })
    }

    /// The start nonterminal.
    pub fn start(&self) -> &str {
        &self.start
    }

    /// The nonterminal symbols (one per box).
    pub fn labels(&self) -> BTreeSet<&str> {
        self.boxes.keys().map(String::as_str).collect()
    }

    /// Nonterminal → box.
    pub fn boxes(&self) -> &BTreeMap<String, Dfa> {
        &self.boxes
    }

    /// Flattens the RSM into matrix form.
    ///
    /// Returns the automaton matrix (start/final states are every box's
    /// start/final states, tagged with the owning nonterminal) and the set
    /// of ε-capable labels: nonterminals whose box accepts the empty word.
    /// ε-capable labels are not encoded as matrix cells; evaluators layer
    /// them onto the graph side as identity (reflexive) matrices.
    pub fn to_matrix(&self) -> (AutomatonMatrix<RsmState>, BTreeSet<String>) {
        let mut nfa = Nfa::new();
        for (var, dfa) in &self.boxes {
            for state in 0..dfa.num_states() {
                nfa.add_state(RsmState::new(var.clone(), state));
            }
            for (from, label, to) in dfa.transitions() {
                nfa.add_transition(
                    RsmState::new(var.clone(), from),
                    label,
                    RsmState::new(var.clone(), to),
                );
            }
            nfa.add_start_state(RsmState::new(var.clone(), dfa.start()));
            for &f in dfa.final_states() {
                nfa.add_final_state(RsmState::new(var.clone(), f));
            }
        }

        let epsilon_labels = self
            .boxes
            .iter()
            .filter(|(_, dfa)| dfa.accepts_epsilon())
            .map(|(var, _)| var.clone())
            .collect();

        (AutomatonMatrix::from_nfa(&nfa), epsilon_labels)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_from_ebnf_boxes() {
        let rsm = Rsm::from_ebnf("S -> a S b | epsilon").unwrap();
        assert_eq!(rsm.start(), "S");
        assert_eq!(rsm.labels().into_iter().collect::<Vec<_>>(), vec!["S"]);

        let s_box = &rsm.boxes()["S"];
        assert!(s_box.accepts_epsilon());
        assert!(s_box.accepts(["a", "S", "b"]));
        assert!(!s_box.accepts(["a", "b"]));
    }

    #[test]
    fn test_from_ebnf_merges_repeated_heads() {
        let rsm = Rsm::from_ebnf("S -> a\nS -> b").unwrap();
        let s_box = &rsm.boxes()["S"];
        assert!(s_box.accepts(["a"]));
        assert!(s_box.accepts(["b"]));
        assert!(!s_box.accepts_epsilon());
    }

    #[test]
    fn test_from_ebnf_star() {
        let rsm = Rsm::from_ebnf("S -> (a | b)* c").unwrap();
        let s_box = &rsm.boxes()["S"];
        assert!(s_box.accepts(["c"]));
        assert!(s_box.accepts(["a", "b", "a", "c"]));
        assert!(!s_box.accepts(["a"]));
    }

    #[test]
    fn test_from_grammar_goes_through_wnf() {
        let grammar =
            Grammar::from_text("S -> A B | B S | C\nA -> a\nB -> b b b\nC -> C c").unwrap();
        let rsm = Rsm::from_grammar(&grammar);
        // C is useless and must not get a box.
        assert!(!rsm.labels().contains("C"));
        assert!(rsm.labels().contains("S"));
        assert!(rsm.labels().contains("A"));
        assert!(rsm.labels().contains("B"));
        // Bodies are in weak normal form: every box word has length <= 2.
        let s_box = &rsm.boxes()["S"];
        assert!(s_box.accepts(["A", "B"]));
    }

    #[test]
    fn test_to_matrix_tags_states() {
        let rsm = Rsm::from_ebnf("S -> a T\nT -> b").unwrap();
        let (matrix, epsilon_labels) = rsm.to_matrix();

        assert!(epsilon_labels.is_empty());
        // Two boxes: every state carries its owner.
        assert!(matrix.states().iter().all(|s| s.variable == "S" || s.variable == "T"));
        // One start per box.
        assert_eq!(matrix.start_states().len(), 2);
        // Both boxes contribute label matrices of the full flattened size.
        let size = matrix.size();
        assert!(matrix.transitions().values().all(|m| m.size() == size));
    }

    #[test]
    fn test_to_matrix_epsilon_labels() {
        let rsm = Rsm::from_ebnf("S -> a S | epsilon").unwrap();
        let (_, epsilon_labels) = rsm.to_matrix();
        assert_eq!(epsilon_labels, BTreeSet::from(["S".to_string()]));
    }
}
