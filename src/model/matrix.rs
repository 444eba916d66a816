//! Dense square dissimilarity matrix.

use serde::{Deserialize, Serialize};

/// N×N matrix of dissimilarities, stored row-major.
///
/// Once produced by `matrix::build_dissimilarity` every entry is finite and
/// lies in [0, 1], and the largest entry is exactly 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DissimilarityMatrix {
    n: usize,
    values: Vec<f64>,
}

impl DissimilarityMatrix {
    /// Wrap row-major values. Returns `None` unless `values.len() == n * n`.
    pub fn from_row_major(n: usize, values: Vec<f64>) -> Option<Self> {
        (n.checked_mul(n)? == values.len()).then_some(Self { n, values })
    }

    /// Number of rows (and columns).
    pub fn dim(&self) -> usize {
        self.n
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.n..(i + 1) * self.n]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.n.max(1))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Largest entry, or 0.0 for an empty matrix.
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_wrong_length() {
        assert!(DissimilarityMatrix::from_row_major(2, vec![0.0; 3]).is_none());
        assert!(DissimilarityMatrix::from_row_major(2, vec![0.0; 4]).is_some());
    }

    #[test]
    fn test_row_major_indexing() {
        let m = DissimilarityMatrix::from_row_major(2, vec![0.0, 0.25, 1.0, 0.0]).unwrap();
        assert_eq!(m.get(0, 1), 0.25);
        assert_eq!(m.get(1, 0), 1.0);
        assert_eq!(m.row(1), &[1.0, 0.0]);
        assert_eq!(m.rows().count(), 2);
        assert_eq!(m.max(), 1.0);
    }
}
