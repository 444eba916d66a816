//! `ccluster`: build CCluster viewer input from a pairwise score table.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ccluster_rs::config::{MetadataConfig, PropertiesConfig};
use ccluster_rs::matrix::{PackedElement, pack_text_table};
use ccluster_rs::{
    LinePolicy, MetadataFormat, ModeFlag, Pipeline, PipelineConfig, Placement, ScoreSourceConfig,
    ScoreTransform,
};

#[derive(Parser, Debug)]
#[command(name = "ccluster")]
#[command(about = "Creates input files for the CCluster 3-D cluster visualization tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Embed a score table and write the viewer's data directory
    Run(RunArgs),
    /// Convert the leading N×N block of a text score table into a packed store
    Pack(PackArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SourceKind {
    Text,
    Packed,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ElementKind {
    U16,
    F32,
    F64,
}

impl From<ElementKind> for PackedElement {
    fn from(kind: ElementKind) -> Self {
        match kind {
            ElementKind::U16 => PackedElement::U16,
            ElementKind::F32 => PackedElement::F32,
            ElementKind::F64 => PackedElement::F64,
        }
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON config document; replaces every other flag
    #[arg(long, conflicts_with_all = [
        "scores", "format", "entities", "metadata", "metadata_delimiter",
        "metadata_id_column", "properties", "property_names", "row_ids", "out",
        "floor", "ceiling", "seed", "strict", "metadata_only", "big_data",
    ])]
    config: Option<PathBuf>,

    /// Pairwise score table
    #[arg(short = 'i', long = "scores", required_unless_present = "config")]
    scores: Option<PathBuf>,

    /// Format of the score table
    #[arg(long, value_enum, default_value = "text")]
    format: SourceKind,

    /// Number of entities (leading N×N block of the table)
    #[arg(short = 'n', long, required_unless_present = "config")]
    entities: Option<usize>,

    /// Metadata file (category labels)
    #[arg(short = 'm', long)]
    metadata: Option<PathBuf>,

    /// Metadata field separator
    #[arg(long, default_value = "|")]
    metadata_delimiter: char,

    /// Zero-based column of the entity id in the metadata file
    #[arg(long, default_value = "2")]
    metadata_id_column: usize,

    /// Property-intensity file
    #[arg(long)]
    properties: Option<PathBuf>,

    /// Property-name reference file, copied into the output
    #[arg(long)]
    property_names: Option<PathBuf>,

    /// Ids of the matrix rows, one per line
    #[arg(long)]
    row_ids: Option<PathBuf>,

    /// Base directory; output goes to <DIR>/data
    #[arg(short = 'd', long = "out", default_value = ".")]
    out: PathBuf,

    /// Scores below this are raised to it before the logarithm
    #[arg(long)]
    floor: Option<f64>,

    /// Scores are divided by this before the logarithm
    #[arg(long)]
    ceiling: Option<f64>,

    /// Seed of the embedding
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Abort on malformed side-data lines instead of skipping them
    #[arg(long)]
    strict: bool,

    /// Place only entities named in the metadata file
    #[arg(long)]
    metadata_only: bool,

    /// Tell the viewer to stream data instead of loading it inline
    #[arg(long)]
    big_data: bool,
}

#[derive(Args, Debug)]
struct PackArgs {
    /// Text score table
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Side length of the block to pack
    #[arg(short = 'n', long)]
    size: u32,

    /// Packed store to write
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Element type of the store; scores are scaled to 0..=65535 for all of them
    #[arg(long, value_enum, default_value = "u16")]
    element: ElementKind,
}

impl RunArgs {
    fn into_config(self) -> ccluster_rs::Result<PipelineConfig> {
        if let Some(path) = &self.config {
            return PipelineConfig::from_json_file(path);
        }
        // Both are required by clap unless --config is present
        let (Some(path), Some(n)) = (self.scores, self.entities) else {
            return Err(ccluster_rs::Error::InvalidConfig(
                "--scores and --entities are required without --config".into(),
            ));
        };

        let scores = match self.format {
            SourceKind::Text => ScoreSourceConfig::FlatText { path },
            SourceKind::Packed => ScoreSourceConfig::Packed { path },
        };
        let defaults = scores.default_transform();
        let mut config = PipelineConfig::new(scores, n, self.out);
        if self.floor.is_some() || self.ceiling.is_some() {
            config.transform = Some(ScoreTransform {
                floor: self.floor.unwrap_or(defaults.floor),
                ceiling: self.ceiling.unwrap_or(defaults.ceiling),
            });
        }
        config.seed = self.seed;
        config.metadata = self.metadata.map(|path| MetadataConfig {
            path,
            format: MetadataFormat {
                delimiter: self.metadata_delimiter,
                id_column: self.metadata_id_column,
            },
        });
        config.properties = self
            .properties
            .map(|path| PropertiesConfig { path, expected_values: None });
        config.property_names = self.property_names;
        config.row_ids = self.row_ids;
        if self.strict {
            config.line_policy = LinePolicy::Strict;
        }
        if self.metadata_only {
            config.placement = Placement::MetadataOnly;
        }
        config.mode_flag = ModeFlag::Bool(self.big_data);
        Ok(config)
    }
}

fn run(args: RunArgs) -> ccluster_rs::Result<()> {
    let config = args.into_config()?;
    let summary = Pipeline::new(config).run()?;
    info!(
        "wrote {} points to {} in {:.1}s",
        summary.points,
        summary.output_dir.display(),
        summary.elapsed.as_secs_f64()
    );
    Ok(())
}

fn pack(args: PackArgs) -> ccluster_rs::Result<()> {
    let header = pack_text_table(&args.input, &args.output, args.size, args.element.into())?;
    info!(
        "packed {}×{} {:?} scores into {}",
        header.rows,
        header.cols,
        header.element,
        args.output.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Pack(args) => pack(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
