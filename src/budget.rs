//! Iteration budgets and cancellation for fixpoint loops.
//!
//! Every fixpoint loop in the crate (transitive closure, the CFPQ evaluators,
//! the BFS-based RPQ) checks its budget once per outer iteration. The default
//! budget is unlimited and never allocates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::QueryError;

/// An optional iteration cap and cancellation flag for fixpoint loops.
///
/// Evaluation is pure CPU work with no suspend points; the budget check at
/// the top of each outer iteration is the only place a long-running query
/// can be stopped.
#[derive(Debug, Clone, Default)]
pub struct FixpointBudget {
    max_iterations: Option<usize>,
    cancel: Option<Arc<AtomicBool>>,
}

impl FixpointBudget {
    /// An unlimited budget: never exhausts, never cancels.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Caps the number of outer fixpoint iterations.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Attaches a cancellation flag. Setting the flag to `true` aborts the
    /// evaluation at the next iteration boundary.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Checks the budget at the start of iteration `iteration` (0-based).
    pub fn check(&self, iteration: usize) -> Result<(), QueryError> {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(QueryError::Cancelled);
            }
        }
        if let Some(max) = self.max_iterations {
            if iteration >= max {
                return Err(QueryError::BudgetExhausted(iteration));
            }
        }
        Ok(())
    }
}
