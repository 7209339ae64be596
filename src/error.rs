//! Error types for query construction and evaluation.
//!
//! All failures are surfaced as [`QueryError`]. Malformed inputs are rejected
//! at build time, before any fixpoint loop runs; evaluation never returns a
//! partially-filled result set in place of an error.

use thiserror::Error;

/// Errors produced while building automata/grammars or evaluating queries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The regular-expression text could not be parsed.
    #[error("malformed regex: {0}")]
    MalformedRegex(String),

    /// The grammar (or EBNF) text could not be parsed.
    #[error("malformed grammar: {0}")]
    MalformedGrammar(String),

    /// A binary operation was applied to incompatible operand kinds.
    #[error("operation `{operation}` is not defined for {lhs} and {rhs}")]
    TypeMismatch {
        /// Name of the offending operation.
        operation: &'static str,
        /// Kind of the left operand.
        lhs: &'static str,
        /// Kind of the right operand.
        rhs: &'static str,
    },

    /// A unary operation was applied to an operand of the wrong kind.
    #[error("operation `{operation}` is not defined for {kind}")]
    InvalidOperand {
        /// Name of the offending operation.
        operation: &'static str,
        /// Kind of the operand.
        kind: &'static str,
    },

    /// A name was referenced that is not bound in the environment.
    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),

    /// A fixpoint loop exceeded its iteration budget.
    #[error("fixpoint iteration budget exhausted after {0} iterations")]
    BudgetExhausted(usize),

    /// The evaluation was cancelled via its cancellation flag.
    #[error("query evaluation cancelled")]
    Cancelled,
}
