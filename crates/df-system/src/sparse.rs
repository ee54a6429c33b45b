//! Coordinate-format sparse Jacobian.

use nalgebra::DMatrix;

/// Jacobian stored as `(row, col, value)` triplets.
///
/// Duplicate coordinates are summed. The entry sequence is the structural
/// pattern: it depends only on declarations and instance data, never on
/// values, so explicit zeros are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseJacobian {
    nrows: usize,
    ncols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    vals: Vec<f64>,
}

impl SparseJacobian {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            rows: Vec::new(),
            cols: Vec::new(),
            vals: Vec::new(),
        }
    }

    pub fn with_capacity(nrows: usize, ncols: usize, nnz: usize) -> Self {
        Self {
            nrows,
            ncols,
            rows: Vec::with_capacity(nnz),
            cols: Vec::with_capacity(nnz),
            vals: Vec::with_capacity(nnz),
        }
    }

    pub fn push(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.nrows && col < self.ncols);
        self.rows.push(row);
        self.cols.push(col);
        self.vals.push(value);
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Number of stored triplets, duplicates included.
    pub fn nnz(&self) -> usize {
        self.vals.len()
    }

    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.rows
            .iter()
            .zip(&self.cols)
            .zip(&self.vals)
            .map(|((r, c), v)| (*r, *c, *v))
    }

    /// Structural coordinates in storage order.
    pub fn pattern(&self) -> Vec<(usize, usize)> {
        self.rows.iter().copied().zip(self.cols.iter().copied()).collect()
    }

    /// Summed value at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.triplets()
            .filter(|(r, c, _)| *r == row && *c == col)
            .map(|(_, _, v)| v)
            .sum()
    }

    /// True when row `row` has at least one structural entry.
    pub fn row_has_entries(&self, row: usize) -> bool {
        self.rows.contains(&row)
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut m = DMatrix::zeros(self.nrows, self.ncols);
        for (r, c, v) in self.triplets() {
            m[(r, c)] += v;
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_sum() {
        let mut j = SparseJacobian::new(2, 2);
        j.push(0, 0, 1.0);
        j.push(1, 0, -2.0);
        j.push(0, 0, 0.5);
        assert_eq!(j.nnz(), 3);
        assert_eq!(j.get(0, 0), 1.5);

        let d = j.to_dense();
        assert_eq!(d[(0, 0)], 1.5);
        assert_eq!(d[(1, 0)], -2.0);
        assert_eq!(d[(1, 1)], 0.0);
        assert!(!j.row_has_entries(3));
    }

    #[test]
    fn explicit_zeros_stay_in_pattern() {
        let mut j = SparseJacobian::new(1, 1);
        j.push(0, 0, 0.0);
        assert_eq!(j.pattern(), vec![(0, 0)]);
    }
}
