//! # Matrix Sources and the Dissimilarity Transform
//!
//! `MatrixSource` is the contract between the pipeline and wherever the raw
//! pairwise scores live. Every source hands back the leading N×N block of its
//! table, row-major; `build_dissimilarity` turns that into a normalized
//! dissimilarity matrix.
//!
//! ## Implementations
//!
//! | Source | Module | Description |
//! |--------|--------|-------------|
//! | `FlatTextSource` | `flat` | One score per line (or whitespace-separated), N² values |
//! | `PackedTableSource` | `packed` | Binary store, reads an N×N sub-block of a larger table |
//! | `InMemorySource` | `memory` | Scores already in memory |
//!
//! ## Transform
//!
//! ```text
//! s  ──clamp──▶ max(s, floor) ──scale──▶ / ceiling ──▶ d = max(-log2(·), 0) ──▶ d / max(d)
//! ```
//!
//! Lower similarity means larger dissimilarity; a score at or above the
//! ceiling maps to 0.

pub mod flat;
pub mod packed;
pub mod memory;

use tracing::debug;

use crate::config::{ScoreSourceConfig, ScoreTransform};
use crate::model::DissimilarityMatrix;
use crate::{Error, Result};

pub use flat::FlatTextSource;
pub use packed::{
    PackedTableSource, PackedElement, PackedHeader, TEXT_TO_PACKED, pack_text_table,
    write_packed_table,
};
pub use memory::InMemorySource;

// ============================================================================
// MatrixSource Trait
// ============================================================================

/// Anything that can produce the leading N×N block of a pairwise score table.
pub trait MatrixSource {
    /// Human-readable origin for diagnostics (usually a path).
    fn describe(&self) -> String;

    /// Read exactly `n * n` raw scores in row-major order.
    ///
    /// Fails with `Error::MalformedInput` when the table holds fewer.
    fn read_scores(&self, n: usize) -> Result<Vec<f64>>;
}

impl<S: MatrixSource + ?Sized> MatrixSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn read_scores(&self, n: usize) -> Result<Vec<f64>> {
        (**self).read_scores(n)
    }
}

/// Open the source a config names.
pub fn open_source(config: &ScoreSourceConfig) -> Box<dyn MatrixSource> {
    match config {
        ScoreSourceConfig::FlatText { path } => Box::new(FlatTextSource::new(path)),
        ScoreSourceConfig::Packed { path } => Box::new(PackedTableSource::new(path)),
    }
}

/// N² as a checked count.
/// Upper bound on scores reserved before a source has shown it holds them.
pub(crate) const PREALLOC_CELLS: usize = 1 << 20;

pub(crate) fn cell_count(origin: &str, n: usize) -> Result<usize> {
    n.checked_mul(n)
        .ok_or_else(|| Error::malformed(origin, format!("entity count {n} is too large")))
}

// ============================================================================
// Dissimilarity transform
// ============================================================================

/// Dissimilarity of one raw score, before normalization.
#[inline]
pub fn score_to_dissimilarity(score: f64, transform: &ScoreTransform) -> f64 {
    let clamped = score.max(transform.floor);
    let d = -(clamped / transform.ceiling).log2();
    // Also maps -0.0 (score == ceiling) to +0.0
    if d > 0.0 { d } else { 0.0 }
}

/// Load N² scores from `source` and produce the normalized matrix.
pub fn build_dissimilarity<S: MatrixSource + ?Sized>(
    source: &S,
    n: usize,
    transform: &ScoreTransform,
) -> Result<DissimilarityMatrix> {
    let scores = source.read_scores(n)?;
    dissimilarity_from_scores(&source.describe(), n, scores, transform)
}

/// Transform and normalize row-major raw scores.
///
/// Every entry of the result is in [0, 1] and the largest is exactly 1.0.
/// A table whose dissimilarities are all zero cannot be normalized and fails
/// with `Error::DivisionByZero`.
pub fn dissimilarity_from_scores(
    origin: &str,
    n: usize,
    mut scores: Vec<f64>,
    transform: &ScoreTransform,
) -> Result<DissimilarityMatrix> {
    let cells = cell_count(origin, n)?;
    if scores.len() < cells {
        return Err(Error::malformed(
            origin,
            format!("need {cells} scores for {n} entities, found {}", scores.len()),
        ));
    }
    scores.truncate(cells);

    if let Some(pos) = scores.iter().position(|s| !s.is_finite()) {
        return Err(Error::malformed(
            origin,
            format!("score at row {}, column {} is not finite", pos / n, pos % n),
        ));
    }

    for s in scores.iter_mut() {
        *s = score_to_dissimilarity(*s, transform);
    }

    let maximum = scores.iter().copied().fold(0.0, f64::max);
    if maximum <= 0.0 {
        return Err(Error::DivisionByZero(format!(
            "every dissimilarity derived from {origin} is 0; the matrix cannot be normalized"
        )));
    }
    debug!(origin, n, maximum, "normalizing dissimilarities");

    for d in scores.iter_mut() {
        *d /= maximum;
    }

    // Length was fixed to n * n above
    DissimilarityMatrix::from_row_major(n, scores)
        .ok_or_else(|| Error::malformed(origin, "score count does not match entity count"))
}
