//! In-memory score source.
//!
//! The reference implementation of `MatrixSource`: a row-major `Vec<f64>`
//! supplied by the caller. Use it for:
//! - Testing the transform and the embedding without touching the filesystem
//! - Embedding ccluster-rs in applications that already hold the scores

use crate::{Error, Result};
use super::{cell_count, MatrixSource};

/// Row-major raw scores held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    scores: Vec<f64>,
}

impl InMemorySource {
    pub fn new(scores: Vec<f64>) -> Self {
        Self { scores }
    }

    /// Flatten rows of equal length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        Self { scores: rows.iter().flatten().copied().collect() }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl MatrixSource for InMemorySource {
    fn describe(&self) -> String {
        format!("in-memory table ({} scores)", self.scores.len())
    }

    fn read_scores(&self, n: usize) -> Result<Vec<f64>> {
        let cells = cell_count(&self.describe(), n)?;
        self.scores.get(..cells).map(<[f64]>::to_vec).ok_or_else(|| {
            Error::malformed(
                self.describe(),
                format!("need {cells} scores for {n} entities"),
            )
        })
    }
}
