//! Flat text score table.
//!
//! Decimal scores separated by whitespace, usually one per line, in row-major
//! order of an N×N matrix (`scores[i * N + j]`). Only the first N² values are
//! read; the rest of the file is never touched.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{Error, Result};
use super::{cell_count, MatrixSource, PREALLOC_CELLS};

/// Score table in a text file.
#[derive(Debug, Clone)]
pub struct FlatTextSource {
    path: PathBuf,
}

impl FlatTextSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MatrixSource for FlatTextSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read_scores(&self, n: usize) -> Result<Vec<f64>> {
        let cells = cell_count(&self.describe(), n)?;
        let file = File::open(&self.path).map_err(|e| Error::io(&self.path, e))?;
        let reader = BufReader::new(file);

        let mut scores = Vec::with_capacity(cells.min(PREALLOC_CELLS));
        let mut lines_read = 0u64;
        for (idx, line) in reader.lines().enumerate() {
            if scores.len() == cells {
                break;
            }
            let line = line.map_err(|e| Error::io(&self.path, e))?;
            lines_read = idx as u64 + 1;
            for token in line.split_whitespace() {
                if scores.len() == cells {
                    break;
                }
                let score: f64 = token.parse().map_err(|_| Error::MalformedInput {
                    origin: format!("{}:{}", self.path.display(), lines_read),
                    message: format!("'{token}' is not a number"),
                })?;
                scores.push(score);
            }
        }

        if scores.len() < cells {
            return Err(Error::malformed(
                self.describe(),
                format!("need {cells} scores for {n} entities, file holds {}", scores.len()),
            ));
        }
        debug!(path = %self.path.display(), lines_read, cells, "read flat score table");
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::io::Write;

    fn table(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_one_score_per_line() {
        let f = table("0.9\n0.1\n0.2\n1.0\n");
        let scores = FlatTextSource::new(f.path()).read_scores(2).unwrap();
        assert_eq!(scores, vec![0.9, 0.1, 0.2, 1.0]);
    }

    #[test]
    fn test_mixed_whitespace_and_trailing_data() {
        let f = table("1 0.5\n\n 0.25\t1\nnot-read\n");
        let scores = FlatTextSource::new(f.path()).read_scores(2).unwrap();
        assert_eq!(scores, vec![1.0, 0.5, 0.25, 1.0]);
    }

    #[test]
    fn test_short_table() {
        let f = table("1\n0.5\n0.25\n");
        let err = FlatTextSource::new(f.path()).read_scores(2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn test_huge_entity_count_against_tiny_table() {
        let f = table("0.9\n0.1\n0.2\n1.0\n");
        let err = FlatTextSource::new(f.path()).read_scores(1 << 31).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(err.to_string().contains("file holds 4"), "{err}");
    }

    #[test]
    fn test_entity_count_overflowing_cell_count() {
        let f = table("1\n");
        let err = FlatTextSource::new(f.path()).read_scores(usize::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn test_bad_token_names_line() {
        let f = table("1\n0.5\nabc\n1\n");
        let err = FlatTextSource::new(f.path()).read_scores(2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(err.to_string().contains(":3"), "{err}");
    }

    #[test]
    fn test_missing_file_is_io() {
        let err = FlatTextSource::new("/no/such/scores.txt").read_scores(2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
    }
}
