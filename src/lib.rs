//! # ccluster-rs: Score Tables to 3-D Point Clouds
//!
//! Converts a pairwise similarity table for a set of entities (sequence
//! types, samples, compounds) into a 3-D layout plus per-entity metadata,
//! ready for the CCluster viewer.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `MatrixSource` and `EmbeddingEngine` are the two seams;
//!    text tables, packed stores and t-SNE are just implementations
//! 2. **Clean DTOs**: `EntityId`, `DissimilarityMatrix`, `PointRecord` cross all stages
//! 3. **Compute, then write**: nothing touches the output directory until
//!    every in-memory stage has succeeded
//! 4. **Explicit absence**: an optional input that was not supplied is `None`,
//!    never an empty map
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ccluster_rs::{Pipeline, PipelineConfig, ScoreSourceConfig};
//!
//! # fn example() -> ccluster_rs::Result<()> {
//! let config = PipelineConfig::new(
//!     ScoreSourceConfig::FlatText { path: "scores.txt".into() },
//!     4271,
//!     "out",
//! );
//! let summary = Pipeline::new(config).run()?;
//! println!("{} points written to {}", summary.points, summary.output_dir.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Load | `matrix`, `sidedata` | raw scores, metadata, properties |
//! | Transform | `matrix` | normalized N×N dissimilarities |
//! | Embed | `embedding` | id → coordinate in [-1, 1]³ |
//! | Assemble | `assemble` | id → point record |
//! | Write | `output` | `data/smalldata.json`, `data/MetaData.js` |

use std::path::PathBuf;

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod config;
pub mod matrix;
pub mod embedding;
pub mod sidedata;
pub mod assemble;
pub mod output;
pub mod pipeline;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    EntityId, DissimilarityMatrix, Coordinate, CoordinateMap,
    PointRecord, PointMap, MetadataMap, PropertyMap, ClusterPath,
};

// ============================================================================
// Re-exports: Configuration
// ============================================================================

pub use config::{
    PipelineConfig, ScoreSourceConfig, ScoreTransform, MetadataFormat,
    LinePolicy, Placement, ModeFlag,
};

// ============================================================================
// Re-exports: Stages
// ============================================================================

pub use matrix::{MatrixSource, FlatTextSource, PackedTableSource, InMemorySource};
pub use embedding::{EmbeddingEngine, EmbeddingCoordinator, OUTPUT_DIMS};
pub use embedding::tsne::{TsneEngine, TsneConfig};
pub use pipeline::{Pipeline, RunSummary, Stage};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed input in {origin}: {message}")]
    MalformedInput { origin: String, message: String },

    #[error("Malformed line {line} in {}: {message}", .path.display())]
    MalformedLine { path: PathBuf, line: u64, message: String },

    #[error("Division by zero: {0}")]
    DivisionByZero(String),

    #[error("Embedding failure: {0}")]
    EmbeddingFailure(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
}

/// Failure taxonomy, independent of which stage reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedInput,
    MalformedLine,
    DivisionByZero,
    EmbeddingFailure,
    InvalidConfig,
    IoFailure,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedInput { .. } => ErrorKind::MalformedInput,
            Error::MalformedLine { .. } => ErrorKind::MalformedLine,
            Error::DivisionByZero(_) => ErrorKind::DivisionByZero,
            Error::EmbeddingFailure(_) => ErrorKind::EmbeddingFailure,
            Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Error::Io { .. } => ErrorKind::IoFailure,
            Error::Stage { source, .. } => source.kind(),
        }
    }

    /// The stage that reported this error, if it has been attributed to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub(crate) fn malformed(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::MalformedInput { origin: origin.into(), message: message.into() }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    pub(crate) fn in_stage(self, stage: Stage) -> Self {
        match self {
            already @ Error::Stage { .. } => already,
            other => Error::Stage { stage, source: Box::new(other) },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
