//! Packed binary score store.
//!
//! A dense rows × cols table of little-endian numbers behind a fixed header.
//! Large all-vs-all runs produce these; a pipeline run samples only the
//! leading N×N block, seeking row by row so the rest of the table is never
//! read.
//!
//! ```text
//! offset  size  field
//! 0       8     magic "CCSCORE1"
//! 8       4     rows  (u32 LE)
//! 12      4     cols  (u32 LE)
//! 16      1     element type: 1 = u16, 2 = f32, 3 = f64
//! 17      ...   rows × cols elements, row-major, little-endian
//! ```
//!
//! Scores sit on the 16-bit scale (ceiling 65535) whatever the element type,
//! so float stores only add precision.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind as IoErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::ScoreTransform;
use crate::{Error, Result};
use super::{cell_count, FlatTextSource, MatrixSource};

/// File signature.
pub const MAGIC: &[u8; 8] = b"CCSCORE1";

/// Bytes before the first element.
pub const HEADER_LEN: u64 = 17;

/// Factor from text-table similarities in (0, 1] to the packed score scale.
pub const TEXT_TO_PACKED: f64 =
    ScoreTransform::PACKED_U16.ceiling / ScoreTransform::FLAT_TEXT.ceiling;

// ============================================================================
// Element type
// ============================================================================

/// Storage type of one table element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackedElement {
    U16,
    F32,
    F64,
}

impl PackedElement {
    pub fn tag(self) -> u8 {
        match self {
            PackedElement::U16 => 1,
            PackedElement::F32 => 2,
            PackedElement::F64 => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(PackedElement::U16),
            2 => Some(PackedElement::F32),
            3 => Some(PackedElement::F64),
            _ => None,
        }
    }

    /// Bytes per element.
    pub fn width(self) -> usize {
        match self {
            PackedElement::U16 => 2,
            PackedElement::F32 => 4,
            PackedElement::F64 => 8,
        }
    }

    fn decode(self, bytes: &[u8]) -> f64 {
        match self {
            PackedElement::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            PackedElement::F32 => {
                f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            PackedElement::F64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes[..8]);
                f64::from_le_bytes(buf)
            }
        }
    }

    fn encode(self, value: f64, out: &mut Vec<u8>) {
        match self {
            // Saturating: negative → 0, above u16::MAX → u16::MAX, NaN → 0
            PackedElement::U16 => out.extend_from_slice(&(value.round() as u16).to_le_bytes()),
            PackedElement::F32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
            PackedElement::F64 => out.extend_from_slice(&value.to_le_bytes()),
        }
    }
}

// ============================================================================
// Header
// ============================================================================

/// Decoded header of a packed store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedHeader {
    pub rows: u32,
    pub cols: u32,
    pub element: PackedElement,
}

impl PackedHeader {
    fn read_from<R: Read>(reader: &mut R, origin: &str) -> Result<Self> {
        let mut buf = [0u8; HEADER_LEN as usize];
        reader.read_exact(&mut buf).map_err(|e| truncated(origin, e, "header"))?;
        if &buf[..8] != MAGIC {
            return Err(Error::malformed(origin, "not a packed score store (bad magic)"));
        }
        let rows = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
        let cols = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);
        let element = PackedElement::from_tag(buf[16]).ok_or_else(|| {
            Error::malformed(origin, format!("unknown element type {}", buf[16]))
        })?;
        Ok(Self { rows, cols, element })
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&self.rows.to_le_bytes())?;
        writer.write_all(&self.cols.to_le_bytes())?;
        writer.write_all(&[self.element.tag()])
    }
}

fn truncated(origin: &str, e: std::io::Error, what: &str) -> Error {
    if e.kind() == IoErrorKind::UnexpectedEof {
        Error::malformed(origin, format!("file ends inside the {what}"))
    } else {
        Error::MalformedInput { origin: origin.to_string(), message: e.to_string() }
    }
}

// ============================================================================
// PackedTableSource
// ============================================================================

/// Score table in a packed binary store.
#[derive(Debug, Clone)]
pub struct PackedTableSource {
    path: PathBuf,
}

impl PackedTableSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read only the header.
    pub fn header(&self) -> Result<PackedHeader> {
        let mut file = File::open(&self.path).map_err(|e| Error::io(&self.path, e))?;
        PackedHeader::read_from(&mut file, &self.describe())
    }
}

impl MatrixSource for PackedTableSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read_scores(&self, n: usize) -> Result<Vec<f64>> {
        let origin = self.describe();
        let cells = cell_count(&origin, n)?;
        let file = File::open(&self.path).map_err(|e| Error::io(&self.path, e))?;
        let mut reader = BufReader::new(file);

        let header = PackedHeader::read_from(&mut reader, &origin)?;
        if (header.rows as usize) < n || (header.cols as usize) < n {
            return Err(Error::malformed(
                &origin,
                format!(
                    "table is {}×{}, need at least {n}×{n}",
                    header.rows, header.cols
                ),
            ));
        }

        let width = header.element.width();
        let row_stride = header.cols as u64 * width as u64;
        let mut row_bytes = vec![0u8; n * width];
        let mut scores = Vec::with_capacity(cells);
        for i in 0..n {
            reader
                .seek(SeekFrom::Start(HEADER_LEN + i as u64 * row_stride))
                .map_err(|e| Error::io(&self.path, e))?;
            reader
                .read_exact(&mut row_bytes)
                .map_err(|e| truncated(&origin, e, &format!("row {i}")))?;
            scores.extend(row_bytes.chunks_exact(width).map(|b| header.element.decode(b)));
        }

        debug!(
            path = %self.path.display(),
            rows = header.rows,
            cols = header.cols,
            n,
            "read packed score block"
        );
        Ok(scores)
    }
}

/// Write a rows × cols table in the packed format.
///
/// `values` is row-major and must hold exactly `rows * cols` entries.
pub fn write_packed_table(
    path: impl AsRef<Path>,
    rows: u32,
    cols: u32,
    element: PackedElement,
    values: &[f64],
) -> Result<()> {
    let path = path.as_ref();
    let expected = rows as usize * cols as usize;
    if values.len() != expected {
        return Err(Error::malformed(
            path.display().to_string(),
            format!("{rows}×{cols} table needs {expected} values, got {}", values.len()),
        ));
    }

    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    PackedHeader { rows, cols, element }
        .write_to(&mut writer)
        .map_err(|e| Error::io(path, e))?;

    let mut buf = Vec::with_capacity(cols as usize * element.width());
    for row in values.chunks(cols.max(1) as usize) {
        buf.clear();
        for &v in row {
            element.encode(v, &mut buf);
        }
        writer.write_all(&buf).map_err(|e| Error::io(path, e))?;
    }
    writer.flush().map_err(|e| Error::io(path, e))
}

/// Pack the leading n×n block of a text score table, rescaled by
/// [`TEXT_TO_PACKED`].
pub fn pack_text_table(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    n: u32,
    element: PackedElement,
) -> Result<PackedHeader> {
    let scores = FlatTextSource::new(input.as_ref()).read_scores(n as usize)?;
    let scaled: Vec<f64> = scores.iter().map(|s| s * TEXT_TO_PACKED).collect();
    write_packed_table(output.as_ref(), n, n, element, &scaled)?;
    debug!(
        input = %input.as_ref().display(),
        output = %output.as_ref().display(),
        n,
        ?element,
        "packed text score table"
    );
    Ok(PackedHeader { rows: n, cols: n, element })
}
