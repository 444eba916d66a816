//! Pipeline orchestration.
//!
//! ```text
//! Load ──▶ Transform ──▶ Embed ──▶ Assemble ──▶ Write
//! scores    N×N in [0,1]  [-1,1]³    records      data/
//! side data
//! ```
//!
//! `compute()` runs the first four stages entirely in memory. `write()` is
//! the only stage with filesystem side effects and `run()` calls it only
//! after `compute()` succeeded, so a failed computation never destroys the
//! previous output.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{error, info, info_span};

use crate::assemble::{assemble_points, trivial_paths};
use crate::config::{PipelineConfig, Placement};
use crate::embedding::tsne::TsneEngine;
use crate::embedding::{EmbeddingCoordinator, EmbeddingEngine};
use crate::matrix::{dissimilarity_from_scores, open_source};
use crate::model::{EntityId, MetadataMap, PointMap, PropertyMap};
use crate::{output, sidedata, Result};

// ============================================================================
// Stages
// ============================================================================

/// Pipeline stage, used for progress reporting and error attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Load,
    Transform,
    Embed,
    Assemble,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Load => "load",
            Stage::Transform => "transform",
            Stage::Embed => "embed",
            Stage::Assemble => "assemble",
            Stage::Write => "write",
        })
    }
}

/// Run `body` as `stage`: log its boundaries and attribute any error to it.
fn run_stage<T>(stage: Stage, body: impl FnOnce() -> Result<T>) -> Result<T> {
    let span = info_span!("stage", %stage);
    let _entered = span.enter();
    info!("{stage} started");
    let started = Instant::now();
    match body() {
        Ok(value) => {
            info!(elapsed_ms = started.elapsed().as_millis() as u64, "{stage} finished");
            Ok(value)
        }
        Err(e) => {
            error!("{stage} failed: {e}");
            Err(e.in_stage(stage))
        }
    }
}

/// Everything read from disk before any computation.
struct Inputs {
    origin: String,
    scores: Vec<f64>,
    ids: Vec<EntityId>,
    metadata: Option<MetadataMap>,
    properties: Option<PropertyMap>,
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Number of point records written.
    pub points: usize,
    /// Directory holding the output files.
    pub output_dir: PathBuf,
    pub elapsed: Duration,
}

// ============================================================================
// Pipeline
// ============================================================================

/// One configured run, generic over the embedding engine.
pub struct Pipeline<E: EmbeddingEngine = TsneEngine> {
    config: PipelineConfig,
    coordinator: EmbeddingCoordinator<E>,
}

impl Pipeline<TsneEngine> {
    /// Pipeline using t-SNE tuned by `config.tsne`.
    pub fn new(config: PipelineConfig) -> Self {
        let engine = TsneEngine::new(config.tsne);
        Self::with_engine(config, engine)
    }
}

impl<E: EmbeddingEngine> Pipeline<E> {
    pub fn with_engine(config: PipelineConfig, engine: E) -> Self {
        let coordinator = EmbeddingCoordinator::new(engine, config.seed);
        Self { config, coordinator }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Compute everything, then write the output directory.
    pub fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();
        let points = self.compute()?;
        let output_dir = self.write(&points)?;
        let summary = RunSummary { points: points.len(), output_dir, elapsed: started.elapsed() };
        info!(
            points = summary.points,
            dir = %summary.output_dir.display(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "run complete"
        );
        Ok(summary)
    }

    /// Load, transform, embed and assemble. Touches no output files.
    pub fn compute(&self) -> Result<PointMap> {
        self.config.validate()?;
        let cfg = &self.config;
        let n = cfg.entity_count;

        let inputs = run_stage(Stage::Load, || self.load())?;

        let matrix = run_stage(Stage::Transform, || {
            dissimilarity_from_scores(&inputs.origin, n, inputs.scores, &cfg.transform())
        })?;

        let coordinates = run_stage(Stage::Embed, || {
            let mut coords = self.coordinator.compute_coordinates(&inputs.ids, &matrix)?;
            if let (Placement::MetadataOnly, Some(metadata)) = (cfg.placement, &inputs.metadata) {
                coords.retain(|id, _| metadata.contains_key(id));
                info!(placed = coords.len(), "kept entities named by metadata");
            }
            Ok(coords)
        })?;

        run_stage(Stage::Assemble, || {
            let paths = trivial_paths(coordinates.keys());
            let points = assemble_points(
                &coordinates,
                &paths,
                inputs.metadata.as_ref(),
                inputs.properties.as_ref(),
            );
            info!(points = points.len(), "records assembled");
            Ok(points)
        })
    }

    /// Reset the output directory and write every output file.
    pub fn write(&self, points: &PointMap) -> Result<PathBuf> {
        run_stage(Stage::Write, || {
            let dir = self.config.data_dir();
            output::reset_output_directory(&dir)?;
            output::write_points(points, &dir)?;
            if let Some(names) = &self.config.property_names {
                output::copy_auxiliary_file(names, &dir)?;
            }
            output::write_mode_flag(&self.config.mode_flag, &dir)?;
            Ok(dir)
        })
    }

    fn load(&self) -> Result<Inputs> {
        let cfg = &self.config;
        let n = cfg.entity_count;

        let source = open_source(&cfg.scores);
        let origin = source.describe();
        info!(source = %origin, n, "reading scores");
        let scores = source.read_scores(n)?;

        let metadata = cfg
            .metadata
            .as_ref()
            .map(|m| sidedata::read_metadata(&m.path, &m.format, cfg.line_policy))
            .transpose()?;
        let properties = cfg
            .properties
            .as_ref()
            .map(|p| sidedata::read_properties(&p.path, p.expected_values, cfg.line_policy))
            .transpose()?;
        let ids = match &cfg.row_ids {
            Some(path) => sidedata::read_row_ids(path, n)?,
            None => EntityId::sequential(n),
        };

        Ok(Inputs { origin, scores, ids, metadata, properties })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        let names: Vec<String> = [Stage::Load, Stage::Transform, Stage::Embed, Stage::Assemble, Stage::Write]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, ["load", "transform", "embed", "assemble", "write"]);
    }

    #[test]
    fn test_run_stage_attributes_errors() {
        let err = run_stage::<()>(Stage::Embed, || {
            Err(crate::Error::EmbeddingFailure("no convergence".into()))
        })
        .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Embed));
        assert_eq!(err.kind(), crate::ErrorKind::EmbeddingFailure);
        assert!(err.to_string().starts_with("embed stage failed"));
    }
}
