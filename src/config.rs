//! # Pipeline Configuration
//!
//! One explicit struct carries every input of a run. It can be built in code,
//! filled from CLI flags, or read from a JSON document:
//!
//! ```json
//! {
//!   "scores": { "kind": "flat_text", "path": "validatedtypeyeastITS_OptSimBiolomics.txt" },
//!   "entity_count": 4271,
//!   "output_dir": ".",
//!   "metadata": { "path": "validatedtypeyeastITS_Species.txt" },
//!   "property_names": "NamesOfProperties.json"
//! }
//! ```
//!
//! Optional inputs that were not supplied are `None`. That is the only
//! "no data" marker; an empty file is a provided, empty mapping.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::embedding::tsne::TsneConfig;
use crate::embedding::OUTPUT_DIMS;
use crate::{Error, Result};

// ============================================================================
// Score source
// ============================================================================

/// Where the raw pairwise scores come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreSourceConfig {
    /// Whitespace/line-delimited decimal scores, row-major.
    FlatText { path: PathBuf },

    /// Packed binary store (see `matrix::packed`).
    Packed { path: PathBuf },
}

impl ScoreSourceConfig {
    pub fn path(&self) -> &Path {
        match self {
            ScoreSourceConfig::FlatText { path } | ScoreSourceConfig::Packed { path } => path,
        }
    }

    /// Transform used when the config does not override it.
    pub fn default_transform(&self) -> ScoreTransform {
        match self {
            ScoreSourceConfig::FlatText { .. } => ScoreTransform::FLAT_TEXT,
            ScoreSourceConfig::Packed { .. } => ScoreTransform::PACKED_U16,
        }
    }
}

// ============================================================================
// Score → dissimilarity transform
// ============================================================================

/// Parameters of `d = max(-log2(max(s, floor) / ceiling), 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreTransform {
    /// Scores below this are raised to it before taking the logarithm.
    pub floor: f64,
    /// Scores are divided by this; a score at or above it maps to 0.
    pub ceiling: f64,
}

impl ScoreTransform {
    /// Text tables hold similarities already scaled to (0, 1].
    pub const FLAT_TEXT: ScoreTransform = ScoreTransform { floor: 0.1, ceiling: 1.0 };

    /// Packed stores hold 16-bit scores.
    pub const PACKED_U16: ScoreTransform = ScoreTransform { floor: 0.01, ceiling: 65535.0 };

    fn validate(&self) -> Result<()> {
        if !(self.floor.is_finite() && self.floor > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "score floor must be a positive finite number, got {}",
                self.floor
            )));
        }
        if !(self.ceiling.is_finite() && self.ceiling > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "score ceiling must be a positive finite number, got {}",
                self.ceiling
            )));
        }
        if self.floor >= self.ceiling {
            return Err(Error::InvalidConfig(format!(
                "score floor {} must be below the ceiling {}",
                self.floor, self.ceiling
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Side data
// ============================================================================

/// Grammar of the metadata file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataFormat {
    /// Field separator.
    pub delimiter: char,
    /// Zero-based column holding the entity id.
    pub id_column: usize,
}

impl Default for MetadataFormat {
    fn default() -> Self {
        Self { delimiter: '|', id_column: 2 }
    }
}

/// Metadata input: file plus its grammar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataConfig {
    pub path: PathBuf,
    #[serde(flatten)]
    pub format: MetadataFormat,
}

/// Property-intensity input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertiesConfig {
    pub path: PathBuf,
    /// When set, lines must carry exactly this many values after the id.
    #[serde(default)]
    pub expected_values: Option<usize>,
}

/// What to do with a side-data line that has too few fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinePolicy {
    /// Skip it with a warning.
    #[default]
    Lenient,
    /// Abort the run.
    Strict,
}

/// Which entities get a point record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Every matrix row.
    #[default]
    AllRows,
    /// Only rows whose id appears in the metadata file.
    MetadataOnly,
}

// ============================================================================
// Output
// ============================================================================

/// Value assigned to `bigData` in `MetaData.js`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModeFlag {
    Bool(bool),
    Text(String),
}

impl Default for ModeFlag {
    fn default() -> Self {
        ModeFlag::Bool(false)
    }
}

impl ModeFlag {
    /// Render as a JavaScript literal.
    pub fn to_js_literal(&self) -> String {
        match self {
            ModeFlag::Bool(b) => b.to_string(),
            // JSON string literals are valid JavaScript string literals
            ModeFlag::Text(s) => serde_json::Value::String(s.clone()).to_string(),
        }
    }
}

// ============================================================================
// PipelineConfig
// ============================================================================

/// Every input of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub scores: ScoreSourceConfig,
    /// Overrides the source kind's default transform.
    #[serde(default)]
    pub transform: Option<ScoreTransform>,
    /// N: the leading N×N block of the score table is used.
    pub entity_count: usize,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub metadata: Option<MetadataConfig>,
    #[serde(default)]
    pub properties: Option<PropertiesConfig>,
    /// Reference file copied verbatim next to the points.
    #[serde(default)]
    pub property_names: Option<PathBuf>,
    /// Ids of the matrix rows, one per line. Rows are numbered when absent.
    #[serde(default)]
    pub row_ids: Option<PathBuf>,
    /// Base directory; output lands in `<output_dir>/data`.
    pub output_dir: PathBuf,
    #[serde(default)]
    pub line_policy: LinePolicy,
    #[serde(default)]
    pub placement: Placement,
    #[serde(default)]
    pub mode_flag: ModeFlag,
    #[serde(default)]
    pub tsne: TsneConfig,
}

fn default_dimensions() -> usize {
    OUTPUT_DIMS
}

impl PipelineConfig {
    /// Config with every optional input absent.
    pub fn new(
        scores: ScoreSourceConfig,
        entity_count: usize,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            scores,
            transform: None,
            entity_count,
            dimensions: OUTPUT_DIMS,
            seed: 0,
            metadata: None,
            properties: None,
            property_names: None,
            row_ids: None,
            output_dir: output_dir.into(),
            line_policy: LinePolicy::default(),
            placement: Placement::default(),
            mode_flag: ModeFlag::default(),
            tsne: TsneConfig::default(),
        }
    }

    pub fn with_metadata(mut self, path: impl Into<PathBuf>, format: MetadataFormat) -> Self {
        self.metadata = Some(MetadataConfig { path: path.into(), format });
        self
    }

    pub fn with_properties(mut self, path: impl Into<PathBuf>) -> Self {
        self.properties = Some(PropertiesConfig { path: path.into(), expected_values: None });
        self
    }

    pub fn with_property_names(mut self, path: impl Into<PathBuf>) -> Self {
        self.property_names = Some(path.into());
        self
    }

    /// Read a JSON config document.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::InvalidConfig(format!("{}: {e}", path.display())))
    }

    /// The transform in effect for this run.
    pub fn transform(&self) -> ScoreTransform {
        self.transform.unwrap_or_else(|| self.scores.default_transform())
    }

    /// Directory the output stage owns.
    pub fn data_dir(&self) -> PathBuf {
        self.output_dir.join(crate::output::DATA_DIR)
    }

    /// Reject configurations that cannot produce a valid run.
    ///
    /// Runs before any stage, so a doomed run never reaches the destructive
    /// output reset.
    pub fn validate(&self) -> Result<()> {
        if self.entity_count == 0 {
            return Err(Error::InvalidConfig("entity_count must be at least 1".into()));
        }
        if self.dimensions != OUTPUT_DIMS {
            return Err(Error::InvalidConfig(format!(
                "only {OUTPUT_DIMS}-D embeddings are supported, got {}",
                self.dimensions
            )));
        }
        self.transform().validate()?;
        if let Some(meta) = &self.metadata {
            if meta.format.delimiter.len_utf8() != 1 {
                return Err(Error::InvalidConfig(format!(
                    "metadata delimiter must be a single-byte character, got {:?}",
                    meta.format.delimiter
                )));
            }
        }
        if self.placement == Placement::MetadataOnly && self.metadata.is_none() {
            return Err(Error::InvalidConfig(
                "metadata_only placement needs a metadata file".into(),
            ));
        }
        if let Some(names) = &self.property_names {
            if !names.is_file() {
                return Err(Error::InvalidConfig(format!(
                    "property-name file {} does not exist",
                    names.display()
                )));
            }
        }
        self.tsne.validate()
    }
}
