//! Output stage: the files the CCluster viewer loads.
//!
//! ```text
//! <output_dir>/data/
//!   smalldata.json      { "<id>": { "Path": [...], "Coordinates": [x, y, z],
//!                                   "Categories": [...], "Properties": [...] }, ... }
//!   MetaData.js         var bigData = false;
//!   <property names>    copied verbatim
//! ```
//!
//! Every operation here is destructive or writes files, so the pipeline only
//! calls them after all computation has succeeded. Any I/O failure aborts
//! the run; a directory left behind by a failed write is not guaranteed
//! to be complete.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::ModeFlag;
use crate::model::PointMap;
use crate::{Error, Result};

/// Subdirectory of the output base directory owned by this stage.
pub const DATA_DIR: &str = "data";

/// Point records file.
pub const POINTS_FILE: &str = "smalldata.json";

/// Mode-flag script.
pub const MODE_FLAG_FILE: &str = "MetaData.js";

/// Variable the viewer reads from the mode-flag script.
pub const MODE_FLAG_VAR: &str = "bigData";

/// Delete `dir` if it exists, then create it empty.
pub fn reset_output_directory(dir: &Path) -> Result<()> {
    if dir.exists() {
        debug!(dir = %dir.display(), "removing previous output");
        fs::remove_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    }
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))
}

/// Serialize all point records into `dir/smalldata.json`.
pub fn write_points(points: &PointMap, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(POINTS_FILE);
    let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, points).map_err(|e| {
        let source = std::io::Error::from(e);
        Error::io(&path, source)
    })?;
    writer.flush().map_err(|e| Error::io(&path, e))?;
    debug!(path = %path.display(), points = points.len(), "points written");
    Ok(path)
}

/// Read a points file back.
pub fn read_points(path: &Path) -> Result<PointMap> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_str(&text)
        .map_err(|e| Error::malformed(path.display().to_string(), e.to_string()))
}

/// Write `dir/MetaData.js` assigning `flag` to `bigData`.
pub fn write_mode_flag(flag: &ModeFlag, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(MODE_FLAG_FILE);
    let script = format!("var {MODE_FLAG_VAR} = {};", flag.to_js_literal());
    fs::write(&path, script).map_err(|e| Error::io(&path, e))?;
    Ok(path)
}

/// Copy `source` byte-for-byte into `dir`, keeping its file name.
pub fn copy_auxiliary_file(source: &Path, dir: &Path) -> Result<PathBuf> {
    let name = source.file_name().ok_or_else(|| {
        Error::io(
            source,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })?;
    let dest = dir.join(name);
    fs::copy(source, &dest).map_err(|e| Error::io(source, e))?;
    Ok(dest)
}
