//! Square boolean matrices and the transitive-closure fixpoint.
//!
//! A [`BoolMatrix`] stores one bit-packed row set per row index. This keeps
//! the matrix genuinely sparse in work (operations touch only set words)
//! while the boolean product stays a word-parallel row-OR loop:
//! `out[i] |= other.row(j)` for every `j` in `self.row(i)`.
//!
//! The transitive closure is the asymptotic bottleneck of query evaluation
//! and is implemented by repeated squaring (`closure |= closure * closure`)
//! until the nonzero count stops changing.

use log::debug;

use crate::bitset::BitSet;
use crate::budget::FixpointBudget;
use crate::error::QueryError;

/// A square boolean matrix backed by one [`BitSet`] row per row index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoolMatrix {
    size: usize,
    rows: Vec<BitSet>,
}

impl BoolMatrix {
    /// Creates a `size` x `size` zero matrix.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            rows: vec![BitSet::new(size); size],
        }
    }

    /// Creates a `size` x `size` identity matrix.
    pub fn identity(size: usize) -> Self {
        let mut m = Self::new(size);
        for i in 0..size {
            m.set(i, i);
        }
        m
    }

    /// The number of rows (== columns).
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Sets cell `(i, j)` to true. Returns true if the cell was previously false.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize) -> bool {
        assert!(i < self.size && j < self.size, "index out of bounds");
        self.rows[i].insert(j)
    }

    /// Returns the value of cell `(i, j)`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> bool {
        i < self.size && self.rows[i].contains(j)
    }

    /// Returns row `i` as a bit set over column indices.
    #[inline]
    pub fn row(&self, i: usize) -> &BitSet {
        &self.rows[i]
    }

    /// The number of true cells.
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(BitSet::len).sum()
    }

    /// Returns true if no cell is set.
    pub fn is_zero(&self) -> bool {
        self.rows.iter().all(BitSet::is_empty)
    }

    /// OR-s `other` into `self` cell-wise. Returns true if any new cell was set.
    ///
    /// Panics if the matrices differ in size.
    pub fn or_assign(&mut self, other: &BoolMatrix) -> bool {
        assert_eq!(self.size, other.size, "matrix size mismatch");
        let mut changed = false;
        for (dst, src) in self.rows.iter_mut().zip(other.rows.iter()) {
            changed |= dst.union_with(src);
        }
        changed
    }

    /// Boolean matrix product: `out[i][k]` iff `self[i][j] && other[j][k]`
    /// for some `j`.
    ///
    /// Panics if the matrices differ in size.
    pub fn mul(&self, other: &BoolMatrix) -> BoolMatrix {
        assert_eq!(self.size, other.size, "matrix size mismatch");
        let mut out = BoolMatrix::new(self.size);
        for i in 0..self.size {
            for j in self.rows[i].iter() {
                out.rows[i].union_with(&other.rows[j]);
            }
        }
        out
    }

    /// Kronecker product: the result has size `self.size * other.size`, and
    /// cell `(i1 * n2 + i2, j1 * n2 + j2)` is set iff `self[i1][j1]` and
    /// `other[i2][j2]`. The second operand's index varies fastest, matching
    /// the composite-state numbering of the product automaton.
    pub fn kronecker(&self, other: &BoolMatrix) -> BoolMatrix {
        let n2 = other.size;
        let mut out = BoolMatrix::new(self.size * n2);
        for (i1, j1) in self.iter() {
            for (i2, j2) in other.iter() {
                out.set(i1 * n2 + i2, j1 * n2 + j2);
            }
        }
        out
    }

    /// Iterates over all true cells as `(row, column)` pairs, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row.iter().map(move |j| (i, j)))
    }

    /// Transitive closure by repeated squaring.
    ///
    /// Iterates `closure |= closure * closure` until the nonzero count stops
    /// changing. The change check (not an iteration bound) is what guarantees
    /// termination and correctness on every graph shape, cycles included;
    /// the loop runs at most `ceil(log2(size))` times in practice because
    /// each squaring doubles the reachable path length.
    pub fn transitive_closure(&self) -> BoolMatrix {
        let mut closure = self.clone();
        let mut iteration = 0usize;
        loop {
            let step = closure.mul(&closure);
            let changed = closure.or_assign(&step);
            iteration += 1;
            debug!(
                "closure iteration {}: nnz = {}",
                iteration,
                closure.nnz()
            );
            if !changed {
                break;
            }
        }
        closure
    }

    /// [`transitive_closure`](Self::transitive_closure) with a budget
    /// checked once per squaring step.
    pub fn transitive_closure_budgeted(
        &self,
        budget: &FixpointBudget,
    ) -> Result<BoolMatrix, QueryError> {
        let mut closure = self.clone();
        let mut iteration = 0usize;
        loop {
            budget.check(iteration)?;
            iteration += 1;
            let step = closure.mul(&closure);
            if !closure.or_assign(&step) {
                return Ok(closure);
            }
        }
    }
}
