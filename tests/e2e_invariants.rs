//! Property tests for the numeric invariants of the pipeline.
//!
//! - every normalized dissimilarity is in [0, 1] and the largest is exactly 1.0
//! - every normalized layout is in [-1, 1]³ and its largest magnitude is exactly 1.0
//! - fewer than two ids never reach the engine

use std::cell::Cell;

use proptest::prelude::*;

use ccluster_rs::embedding::normalize_coordinates;
use ccluster_rs::matrix::build_dissimilarity;
use ccluster_rs::{
    DissimilarityMatrix, EmbeddingCoordinator, EmbeddingEngine, EntityId, ErrorKind,
    InMemorySource, ScoreTransform,
};

/// Hands back preset rows and counts invocations.
struct Scripted {
    rows: Vec<Vec<f64>>,
    calls: Cell<usize>,
}

impl EmbeddingEngine for Scripted {
    fn embed(&self, _: &DissimilarityMatrix, _: usize, _: u64) -> ccluster_rs::Result<Vec<Vec<f64>>> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.rows.clone())
    }
}

fn zero_matrix(n: usize) -> DissimilarityMatrix {
    DissimilarityMatrix::from_row_major(n, vec![0.0; n * n]).unwrap()
}

fn scores_strategy() -> impl Strategy<Value = (usize, Vec<f64>)> {
    (1usize..7).prop_flat_map(|n| (Just(n), prop::collection::vec(-0.5f64..2.0, n * n)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_dissimilarities_normalized((n, scores) in scores_strategy()) {
        let transform = ScoreTransform { floor: 0.05, ceiling: 1.0 };
        let all_saturated = scores.iter().all(|&s| s >= transform.ceiling);

        match build_dissimilarity(&InMemorySource::new(scores), n, &transform) {
            Ok(m) => {
                prop_assert!(!all_saturated);
                prop_assert_eq!(m.dim(), n);
                prop_assert!(m.as_slice().iter().all(|d| (0.0..=1.0).contains(d)));
                prop_assert_eq!(m.max(), 1.0);
            }
            Err(e) => {
                prop_assert!(all_saturated);
                prop_assert_eq!(e.kind(), ErrorKind::DivisionByZero);
            }
        }
    }

    #[test]
    fn prop_layout_normalized(
        rows in prop::collection::vec(prop::array::uniform3(-1e3f64..1e3), 2..12)
    ) {
        prop_assume!(rows.iter().flatten().any(|c| *c != 0.0));
        let n = rows.len();
        let engine = Scripted { rows: rows.iter().map(|r| r.to_vec()).collect(), calls: Cell::new(0) };

        let coords = EmbeddingCoordinator::new(&engine, 0)
            .compute_coordinates(&EntityId::sequential(n), &zero_matrix(n))
            .unwrap();

        prop_assert_eq!(coords.len(), n);
        let max = coords.values().flatten().fold(0.0f64, |acc, c| acc.max(c.abs()));
        prop_assert_eq!(max, 1.0);
        prop_assert!(coords.values().flatten().all(|c| (-1.0..=1.0).contains(c)));
    }

    #[test]
    fn prop_small_id_sets_skip_engine(count in 0usize..2) {
        let engine = Scripted { rows: vec![vec![1.0, 1.0, 1.0]], calls: Cell::new(0) };
        let coords = EmbeddingCoordinator::new(&engine, 0)
            .compute_coordinates(&EntityId::sequential(count), &zero_matrix(count))
            .unwrap();
        prop_assert!(coords.is_empty());
        prop_assert_eq!(engine.calls.get(), 0);
    }
}

#[test]
fn test_normalize_preserves_sign_and_ratio() {
    let out = normalize_coordinates(vec![[4.0, -2.0, 0.0], [1.0, 1.0, -8.0]]).unwrap();
    assert_eq!(out, vec![[0.5, -0.25, 0.0], [0.125, 0.125, -1.0]]);
}
