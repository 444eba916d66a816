//! End-to-end pipeline tests against the fixture tables in `tests/fixtures/`.
//!
//! Fixture: four fungal ITS types in two similar pairs (0,1) and (2,3).
//! - metadata names 0, 1, 3 and an id (17) outside the matrix, plus one short line
//! - properties name 0, 1, 2
//!
//! Each test exercises: load -> transform -> embed -> assemble -> write.

use std::fs;
use std::path::PathBuf;

use pretty_assertions::assert_eq;

use ccluster_rs::matrix::{write_packed_table, PackedElement};
use ccluster_rs::output::{read_points, MODE_FLAG_FILE, POINTS_FILE};
use ccluster_rs::{
    DissimilarityMatrix, EmbeddingEngine, EntityId, ErrorKind, LinePolicy, MetadataFormat,
    ModeFlag, Pipeline, PipelineConfig, Placement, PointMap, ScoreSourceConfig, Stage,
};

// ============================================================================
// Helpers
// ============================================================================

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

fn labels(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Fixture config with every side input supplied.
fn full_config(out: &std::path::Path) -> PipelineConfig {
    PipelineConfig::new(
        ScoreSourceConfig::FlatText { path: fixture("scores_4.txt") },
        4,
        out,
    )
    .with_metadata(fixture("metadata_4.txt"), MetadataFormat::default())
    .with_properties(fixture("properties_4.txt"))
    .with_property_names(fixture("NamesOfProperties.json"))
}

/// Places row `i` at `(i, -i, 1)`: predictable and cheap.
struct DiagonalEngine;

impl EmbeddingEngine for DiagonalEngine {
    fn embed(&self, m: &DissimilarityMatrix, dims: usize, _seed: u64) -> ccluster_rs::Result<Vec<Vec<f64>>> {
        assert_eq!(dims, 3);
        Ok((0..m.dim()).map(|i| vec![i as f64, -(i as f64), 1.0]).collect())
    }
}

fn max_abs(points: &PointMap) -> f64 {
    points
        .values()
        .flat_map(|p| p.coordinates.iter())
        .fold(0.0f64, |acc, c| acc.max(c.abs()))
}

// ============================================================================
// 1. Full run with the default t-SNE engine
// ============================================================================

#[test]
fn test_full_run_with_tsne() {
    let out = tempfile::tempdir().unwrap();
    let summary = Pipeline::new(full_config(out.path())).run().unwrap();

    let data = out.path().join("data");
    assert_eq!(summary.output_dir, data);
    assert_eq!(summary.points, 4);

    let points = read_points(&data.join(POINTS_FILE)).unwrap();
    let ids: Vec<&str> = points.keys().map(EntityId::as_str).collect();
    assert_eq!(ids, vec!["0", "1", "2", "3"]);

    for record in points.values() {
        assert_eq!(record.path.as_slice(), &["0".to_string()]);
        assert!(record.coordinates.iter().all(|c| (-1.0..=1.0).contains(c)));
    }
    assert_eq!(max_abs(&points), 1.0);

    assert_eq!(fs::read_to_string(data.join(MODE_FLAG_FILE)).unwrap(), "var bigData = false;");
    assert_eq!(
        fs::read(data.join("NamesOfProperties.json")).unwrap(),
        fs::read(fixture("NamesOfProperties.json")).unwrap()
    );
}

// ============================================================================
// 2. Categories and properties, checked per record
// ============================================================================

#[test]
fn test_side_data_per_record() {
    let out = tempfile::tempdir().unwrap();
    let config = full_config(out.path());
    let points = Pipeline::with_engine(config, DiagonalEngine).compute().unwrap();

    let get = |id: &str| points[&EntityId::from(id)].clone();

    assert_eq!(get("0").categories, labels(&["Fungi", "Ascomycota"]));
    assert_eq!(get("1").categories, labels(&["Fungi", "Basidiomycota|Agaricomycetes"]));
    assert_eq!(get("2").categories, Vec::<String>::new());
    assert_eq!(get("3").categories, labels(&["Fungi", "Ascomycota"]));

    assert_eq!(get("0").properties, labels(&["0.51", "12"]));
    assert_eq!(get("1").properties, labels(&["0.48", "9"]));
    assert_eq!(get("2").properties, labels(&["0.60", "15"]));
    assert_eq!(get("3").properties, Vec::<String>::new());

    // 17 is in the metadata but not in the matrix
    assert!(!points.contains_key(&EntityId::from("17")));

    // DiagonalEngine: row 3 is (3, -3, 1), the largest magnitude
    assert_eq!(get("3").coordinates, [1.0, -1.0, 1.0 / 3.0]);
    assert_eq!(get("0").coordinates, [0.0, 0.0, 1.0 / 3.0]);
}

// ============================================================================
// 3. "No data" for both optional inputs
// ============================================================================

#[test]
fn test_not_provided_side_data() {
    let out = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(
        ScoreSourceConfig::FlatText { path: fixture("scores_4.txt") },
        4,
        out.path(),
    );
    let points = Pipeline::with_engine(config, DiagonalEngine).compute().unwrap();
    assert_eq!(points.len(), 4);
    for record in points.values() {
        assert!(record.categories.is_empty());
        assert!(record.properties.is_empty());
    }
}

// ============================================================================
// 4. Placement and row ids
// ============================================================================

#[test]
fn test_metadata_only_placement() {
    let out = tempfile::tempdir().unwrap();
    let mut config = full_config(out.path());
    config.placement = Placement::MetadataOnly;
    let points = Pipeline::with_engine(config, DiagonalEngine).compute().unwrap();

    let ids: Vec<&str> = points.keys().map(EntityId::as_str).collect();
    assert_eq!(ids, vec!["0", "1", "3"]);
    // Normalized over all rows before filtering
    assert_eq!(points[&EntityId::from("3")].coordinates[0], 1.0);
}

#[test]
fn test_named_row_ids() {
    let out = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::new(
        ScoreSourceConfig::FlatText { path: fixture("scores_4.txt") },
        4,
        out.path(),
    );
    config.row_ids = Some(fixture("row_ids_4.txt"));
    let points = Pipeline::with_engine(config, DiagonalEngine).compute().unwrap();

    assert_eq!(
        points[&EntityId::from("Candida dubliniensis")].coordinates,
        [1.0, -1.0, 1.0 / 3.0]
    );
    assert_eq!(
        points[&EntityId::from("Saccharomyces cerevisiae")].coordinates,
        [0.0, 0.0, 1.0 / 3.0]
    );
}

#[test]
fn test_subset_of_larger_table() {
    let out = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(
        ScoreSourceConfig::FlatText { path: fixture("scores_4.txt") },
        2,
        out.path(),
    );
    let points = Pipeline::with_engine(config, DiagonalEngine).compute().unwrap();
    assert_eq!(points.len(), 2);
}

// ============================================================================
// 5. Packed store source
// ============================================================================

#[test]
fn test_packed_store_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("dist_all.bin");
    // 5×5 table of 16-bit scores; only the leading 3×3 block is used
    let values: Vec<f64> = (0..25)
        .map(|k| if k / 5 == k % 5 { 65535.0 } else { 1000.0 * (1 + k % 7) as f64 })
        .collect();
    write_packed_table(&store, 5, 5, PackedElement::U16, &values).unwrap();

    let config = PipelineConfig::new(ScoreSourceConfig::Packed { path: store }, 3, dir.path());
    let summary = Pipeline::new(config).run().unwrap();
    assert_eq!(summary.points, 3);

    let points = read_points(&summary.output_dir.join(POINTS_FILE)).unwrap();
    assert_eq!(max_abs(&points), 1.0);
}

// ============================================================================
// 6. Failures: attributed to a stage, output untouched
// ============================================================================

#[test]
fn test_strict_policy_fails_in_load_and_keeps_old_output() {
    let out = tempfile::tempdir().unwrap();
    let data = out.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("previous.json"), "{}").unwrap();

    let mut config = full_config(out.path());
    config.line_policy = LinePolicy::Strict;
    let err = Pipeline::with_engine(config, DiagonalEngine).run().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MalformedLine);
    assert_eq!(err.stage(), Some(Stage::Load));
    assert!(err.to_string().contains("metadata_4.txt"), "{err}");
    assert!(data.join("previous.json").exists());
}

#[test]
fn test_saturated_scores_fail_in_transform() {
    let dir = tempfile::tempdir().unwrap();
    let scores = dir.path().join("flat.txt");
    // Every score at the ceiling: every dissimilarity is 0
    fs::write(&scores, "1.0\n".repeat(9)).unwrap();

    let config = PipelineConfig::new(ScoreSourceConfig::FlatText { path: scores }, 3, dir.path());
    let err = Pipeline::with_engine(config, DiagonalEngine).run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DivisionByZero);
    assert_eq!(err.stage(), Some(Stage::Transform));
    assert!(!dir.path().join("data").exists());
}

#[test]
fn test_short_table_fails_in_load() {
    let out = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(
        ScoreSourceConfig::FlatText { path: fixture("scores_4.txt") },
        5,
        out.path(),
    );
    let err = Pipeline::with_engine(config, DiagonalEngine).compute().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
    assert_eq!(err.stage(), Some(Stage::Load));
}

#[test]
fn test_huge_entity_count_fails_in_load() {
    let out = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::new(
        ScoreSourceConfig::FlatText { path: fixture("scores_4.txt") },
        1 << 31,
        out.path(),
    );
    config.row_ids = Some(fixture("row_ids_4.txt"));
    let err = Pipeline::with_engine(config, DiagonalEngine).run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
    assert_eq!(err.stage(), Some(Stage::Load));
    assert!(!out.path().join("data").exists());
}

#[test]
fn test_engine_failure_is_reported_from_embed() {
    struct Failing;
    impl EmbeddingEngine for Failing {
        fn embed(&self, _: &DissimilarityMatrix, _: usize, _: u64) -> ccluster_rs::Result<Vec<Vec<f64>>> {
            Err(ccluster_rs::Error::EmbeddingFailure("did not converge".into()))
        }
    }

    let out = tempfile::tempdir().unwrap();
    let err = Pipeline::with_engine(full_config(out.path()), Failing).run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmbeddingFailure);
    assert_eq!(err.stage(), Some(Stage::Embed));
}

#[test]
fn test_invalid_config_is_rejected_before_any_stage() {
    let out = tempfile::tempdir().unwrap();
    let config = full_config(out.path()).with_property_names(out.path().join("missing.json"));
    let err = Pipeline::with_engine(config, DiagonalEngine).run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    assert_eq!(err.stage(), None);
}

// ============================================================================
// 7. Mode flag and JSON config
// ============================================================================

#[test]
fn test_big_data_flag_and_json_config() {
    let out = tempfile::tempdir().unwrap();
    let config_path = out.path().join("run.json");
    let doc = serde_json::json!({
        "scores": { "kind": "flat_text", "path": fixture("scores_4.txt") },
        "entity_count": 4,
        "output_dir": out.path(),
        "mode_flag": true,
        "tsne": { "iterations": 300, "exaggeration_iterations": 100 }
    });
    fs::write(&config_path, doc.to_string()).unwrap();

    let config = PipelineConfig::from_json_file(&config_path).unwrap();
    assert_eq!(config.mode_flag, ModeFlag::Bool(true));
    assert_eq!(config.tsne.iterations, 300);

    let summary = Pipeline::new(config).run().unwrap();
    assert_eq!(
        fs::read_to_string(summary.output_dir.join(MODE_FLAG_FILE)).unwrap(),
        "var bigData = true;"
    );
}
