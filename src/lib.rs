//! # cfpq-rs: Regular and Context-Free Path Queries in Rust
//!
//! **`cfpq-rs`** evaluates *path queries* over directed, edge-labeled
//! graphs: which pairs of vertices are connected by a path whose label
//! sequence belongs to a language, given as a regular expression or as a
//! context-free grammar (CFPQ).
//!
//! ## How it works
//!
//! Automata are encoded as *decomposed boolean adjacency matrices*: one
//! bit-packed square matrix per transition label, plus start/final state
//! sets and a dense state arena ([`automaton::AutomatonMatrix`]). On top of
//! that encoding sit two algebraic workhorses:
//!
//! - the **Kronecker product** intersection, which runs two automata in
//!   lockstep as a single product automaton, and
//! - the **transitive closure** by repeated boolean squaring, which turns
//!   adjacency into reachability.
//!
//! Context-free queries compile the grammar into a **recursive state
//! machine** ([`rsm::Rsm`]): one DFA box per nonterminal, flattened into a
//! single matrix with nonterminal-tagged states.
//!
//! ## Key Features
//!
//! - **Regular path queries** ([`rpq`]): product + closure, or a BFS
//!   strategy that avoids the product matrix; identical result sets.
//! - **Context-free path queries** ([`cfpq`]): three interchangeable
//!   strategies (Hellings worklist, per-nonterminal matrix fixpoint, and
//!   the tensor RSM-times-graph fixpoint), all returning the same answers.
//! - **Grammar tooling** ([`cfg`]): text parsing, weak Chomsky normal form,
//!   CYK membership.
//! - **Typed query expressions** ([`expr`]): a closed value type, an
//!   immutable environment, and compiled lambda ASTs; misuse surfaces as
//!   [`error::QueryError`], never as silent coercion.
//! - **Bounded evaluation** ([`budget`]): every fixpoint loop can carry an
//!   iteration cap and a cancellation flag.
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::collections::BTreeSet;
//!
//! use cfpq_rs::cfg::Grammar;
//! use cfpq_rs::cfpq::cfpq_with_hellings;
//! use cfpq_rs::graph::LabeledGraph;
//! use cfpq_rs::rpq::regular_path_query;
//!
//! let graph = LabeledGraph::from_edges([(0, "a", 1), (1, "b", 2), (2, "c", 0)]);
//!
//! // Regular path query: vertices connected by a path matching `a.b.c*`.
//! let starts = BTreeSet::from([0]);
//! let finals = BTreeSet::from([2]);
//! let pairs = regular_path_query(&graph, Some(&starts), Some(&finals), "a.b.c*").unwrap();
//! assert_eq!(pairs, BTreeSet::from([(0, 2)]));
//!
//! // Context-free path query: balanced a..b paths.
//! let grammar = Grammar::from_text("S -> a S b | a b").unwrap();
//! let pairs = cfpq_with_hellings(&grammar, &graph, None, None).unwrap();
//! assert_eq!(pairs, BTreeSet::from([(0, 2)])); // the single `a b` path
//! ```
//!
//! ## Core Components
//!
//! - **[`matrix`]** / **[`bitset`]**: bit-packed boolean matrices, boolean
//!   product, Kronecker product, transitive closure.
//! - **[`fa`]** / **[`regex`]** / **[`graph`]**: NFA/DFA/ε-NFA builders and
//!   the regex compiler.
//! - **[`automaton`]**: the matrix model and the product construction.
//! - **[`cfg`]** / **[`rsm`]**: grammars, weak normal form, RSM boxes.
//! - **[`rpq`]** / **[`cfpq`]**: the query evaluators.
//! - **[`expr`]** / **[`error`]** / **[`budget`]**: typed expression
//!   evaluation, the error taxonomy, and fixpoint budgets.
//! - **[`dot`]**: Graphviz export for graphs and automata.

pub mod automaton;
pub mod bitset;
pub mod budget;
pub mod cfg;
pub mod cfpq;
pub mod dot;
pub mod error;
pub mod expr;
pub mod fa;
pub mod graph;
pub mod matrix;
pub mod regex;
pub mod rpq;
pub mod rsm;
