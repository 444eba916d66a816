//! Side-data loaders: per-entity files keyed by entity id.
//!
//! | File | Grammar | Result |
//! |------|---------|--------|
//! | metadata | delimiter-separated (default `\|`), `"` quoting, id in a fixed column | `MetadataMap` |
//! | property intensities | whitespace-separated, id first | `PropertyMap` |
//! | row ids | one id per line, in matrix row order | `Vec<EntityId>` |
//!
//! Blank lines are skipped everywhere. A line with too few fields is handled
//! according to the `LinePolicy`: skipped with a warning, or fatal.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use hashbrown::HashSet;
use tracing::{debug, info, warn};

use crate::config::{LinePolicy, MetadataFormat};
use crate::model::{EntityId, MetadataMap, PropertyMap};
use crate::{Error, Result};

// ============================================================================
// Bad-line handling
// ============================================================================

/// Apply `policy` to one bad line.
fn reject(policy: LinePolicy, path: &Path, line: u64, message: String) -> Result<()> {
    match policy {
        LinePolicy::Strict => Err(Error::MalformedLine { path: path.to_path_buf(), line, message }),
        LinePolicy::Lenient => {
            warn!(path = %path.display(), line, "skipping line: {message}");
            Ok(())
        }
    }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path).map(BufReader::new).map_err(|e| Error::io(path, e))
}

// ============================================================================
// Metadata
// ============================================================================

/// Read a metadata file.
///
/// Each record's id is taken from `format.id_column`; every other field, in
/// file order and kept verbatim (empty fields included), becomes the
/// category list. A later record for the same id replaces an earlier one.
pub fn read_metadata(path: &Path, format: &MetadataFormat, policy: LinePolicy) -> Result<MetadataMap> {
    let delimiter = u8::try_from(format.delimiter).map_err(|_| {
        Error::InvalidConfig(format!(
            "metadata delimiter {:?} is not a single-byte character",
            format.delimiter
        ))
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .quote(b'"')
        .has_headers(false)
        .flexible(true)
        .from_reader(open(path)?);

    let mut map = MetadataMap::new();
    let mut skipped = 0usize;
    for result in reader.records() {
        let record = result.map_err(|e| csv_error(path, e))?;
        let line = record.position().map_or(0, |p| p.line());

        if record.len() <= 1 && record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if record.len() <= format.id_column {
            skipped += 1;
            reject(
                policy,
                path,
                line,
                format!(
                    "{} fields, the id column is {}",
                    record.len(),
                    format.id_column
                ),
            )?;
            continue;
        }

        let id = EntityId::from(&record[format.id_column]);
        let categories = record
            .iter()
            .enumerate()
            .filter(|(col, _)| *col != format.id_column)
            .map(|(_, field)| field.to_string())
            .collect();
        if map.insert(id.clone(), categories).is_some() {
            debug!(path = %path.display(), line, %id, "duplicate metadata id, keeping the later line");
        }
    }

    info!(path = %path.display(), entities = map.len(), skipped, "metadata loaded");
    Ok(map)
}

fn csv_error(path: &Path, e: csv::Error) -> Error {
    let line = e.position().map(|p| p.line());
    match (e.into_kind(), line) {
        (csv::ErrorKind::Io(io), _) => Error::io(path, io),
        (kind, Some(line)) => Error::MalformedLine {
            path: path.to_path_buf(),
            line,
            message: format!("{kind:?}"),
        },
        (kind, None) => Error::malformed(path.display().to_string(), format!("{kind:?}")),
    }
}

// ============================================================================
// Property intensities
// ============================================================================

/// Read a property-intensity file: `<id> <v1> <v2> ... <vK>` per line.
///
/// Values stay strings, exactly as written. With `expected_values` set, a
/// line carrying a different number of values is a bad line.
pub fn read_properties(
    path: &Path,
    expected_values: Option<usize>,
    policy: LinePolicy,
) -> Result<PropertyMap> {
    let mut map = PropertyMap::new();
    let mut skipped = 0usize;
    for (idx, line) in open(path)?.lines().enumerate() {
        let line = line.map_err(|e| Error::io(path, e))?;
        let mut tokens = line.split_whitespace();
        let Some(id) = tokens.next() else {
            continue;
        };
        let values: Vec<String> = tokens.map(str::to_string).collect();

        if let Some(expected) = expected_values {
            if values.len() != expected {
                skipped += 1;
                reject(
                    policy,
                    path,
                    idx as u64 + 1,
                    format!("{} values for id {id}, expected {expected}", values.len()),
                )?;
                continue;
            }
        }
        map.insert(EntityId::from(id), values);
    }

    info!(path = %path.display(), entities = map.len(), skipped, "property intensities loaded");
    Ok(map)
}

// ============================================================================
// Row ids
// ============================================================================

/// Read the ids of the first `n` matrix rows, one per non-blank line.
pub fn read_row_ids(path: &Path, n: usize) -> Result<Vec<EntityId>> {
    let origin = path.display().to_string();
    let mut ids = Vec::new();
    let mut seen = HashSet::new();
    for (idx, line) in open(path)?.lines().enumerate() {
        if ids.len() == n {
            break;
        }
        let line = line.map_err(|e| Error::io(path, e))?;
        let id = line.trim();
        if id.is_empty() {
            continue;
        }
        if !seen.insert(id.to_string()) {
            return Err(Error::MalformedInput {
                origin: format!("{origin}:{}", idx + 1),
                message: format!("row id '{id}' appears twice"),
            });
        }
        ids.push(EntityId::from(id));
    }

    if ids.len() < n {
        return Err(Error::malformed(
            origin,
            format!("need {n} row ids, file holds {}", ids.len()),
        ));
    }
    Ok(ids)
}
