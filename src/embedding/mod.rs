//! # Embedding
//!
//! `EmbeddingEngine` is the contract with whatever performs dimensionality
//! reduction. The engine sees only a precomputed dissimilarity matrix and
//! answers with one point per row; `EmbeddingCoordinator` owns everything
//! around it: the id ↔ row mapping, output validation, and normalization
//! into [-1, 1]³.
//!
//! ## Engines
//!
//! | Engine | Module | Description |
//! |--------|--------|-------------|
//! | `TsneEngine` | `tsne` | Exact t-SNE, seeded, precomputed distances |
//!
//! Ids travel as an explicit ordered list: row `i` of the matrix belongs to
//! `ids[i]`, and the engine's row `i` is zipped back to the same id. Nothing
//! assumes ids are integers.

pub mod tsne;

use tracing::{debug, info};

use crate::model::{Coordinate, CoordinateMap, DissimilarityMatrix, EntityId};
use crate::{Error, Result};

/// Dimensionality of every layout this crate produces.
pub const OUTPUT_DIMS: usize = 3;

// ============================================================================
// EmbeddingEngine Trait
// ============================================================================

/// Dimensionality reduction over a precomputed dissimilarity matrix.
pub trait EmbeddingEngine {
    /// Place every row of `dissimilarity` in `dims` dimensions.
    ///
    /// Returns one point per matrix row, in row order. The same `seed` must
    /// give the same layout. Non-convergence or unusable input is
    /// `Error::EmbeddingFailure`.
    fn embed(
        &self,
        dissimilarity: &DissimilarityMatrix,
        dims: usize,
        seed: u64,
    ) -> Result<Vec<Vec<f64>>>;
}

impl<E: EmbeddingEngine + ?Sized> EmbeddingEngine for &E {
    fn embed(&self, dissimilarity: &DissimilarityMatrix, dims: usize, seed: u64) -> Result<Vec<Vec<f64>>> {
        (**self).embed(dissimilarity, dims, seed)
    }
}

// ============================================================================
// EmbeddingCoordinator
// ============================================================================

/// Drives an engine and turns its output into normalized coordinates.
#[derive(Debug, Clone)]
pub struct EmbeddingCoordinator<E> {
    engine: E,
    seed: u64,
}

impl<E: EmbeddingEngine> EmbeddingCoordinator<E> {
    pub fn new(engine: E, seed: u64) -> Self {
        Self { engine, seed }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Coordinates for `ids`, where `ids[i]` names row `i` of `matrix`.
    ///
    /// Fewer than two ids yields an empty map and the engine is not invoked.
    /// Every returned coordinate is in [-1, 1] and the largest absolute
    /// component across all of them is exactly 1.0.
    pub fn compute_coordinates(
        &self,
        ids: &[EntityId],
        matrix: &DissimilarityMatrix,
    ) -> Result<CoordinateMap> {
        if ids.len() < 2 {
            debug!(ids = ids.len(), "too few entities to embed");
            return Ok(CoordinateMap::new());
        }
        if ids.len() != matrix.dim() {
            return Err(Error::malformed(
                "embedding input",
                format!("{} ids for a {}×{} matrix", ids.len(), matrix.dim(), matrix.dim()),
            ));
        }

        info!(n = ids.len(), dims = OUTPUT_DIMS, seed = self.seed, "embedding started");
        let raw = self.engine.embed(matrix, OUTPUT_DIMS, self.seed)?;
        info!(n = raw.len(), "embedding finished");

        let points = validate_output(raw, matrix.dim())?;
        let normalized = normalize_coordinates(points)?;
        Ok(ids.iter().cloned().zip(normalized).collect())
    }
}

/// Check shape and finiteness of engine output.
fn validate_output(raw: Vec<Vec<f64>>, n: usize) -> Result<Vec<Coordinate>> {
    if raw.len() != n {
        return Err(Error::EmbeddingFailure(format!(
            "engine returned {} points for {n} rows",
            raw.len()
        )));
    }
    raw.into_iter()
        .enumerate()
        .map(|(row, point)| {
            let coord: Coordinate = point.as_slice().try_into().map_err(|_| {
                Error::EmbeddingFailure(format!(
                    "row {row} has {} dimensions, expected {OUTPUT_DIMS}",
                    point.len()
                ))
            })?;
            if coord.iter().all(|c| c.is_finite()) {
                Ok(coord)
            } else {
                Err(Error::EmbeddingFailure(format!("row {row} is not finite")))
            }
        })
        .collect()
}

/// Scale points so the largest absolute component is exactly 1.0.
///
/// All-zero input fails with `Error::DivisionByZero`.
pub fn normalize_coordinates(mut points: Vec<Coordinate>) -> Result<Vec<Coordinate>> {
    let maximum = points
        .iter()
        .flat_map(|p| p.iter())
        .fold(0.0f64, |acc, c| acc.max(c.abs()));
    if maximum <= 0.0 || !maximum.is_finite() {
        return Err(Error::DivisionByZero(format!(
            "largest coordinate magnitude is {maximum}; the layout cannot be normalized"
        )));
    }
    for p in points.iter_mut() {
        for c in p.iter_mut() {
            *c /= maximum;
        }
    }
    Ok(points)
}
