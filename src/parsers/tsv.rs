// ==============================================================================
// tsv.rs - Streaming Tab-Separated Reader
// ==============================================================================
// Description: Lazily reads (optionally gzipped) TSV files, projecting each row
//              onto a set of named columns resolved once from the header
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Format: tab-delimited text, first line is the header
// Example:
//   chrom   pos   ref   alt   pval    beta
//   1       100   A     T     1e-8    0.12
// ==============================================================================

use csv::{ReaderBuilder, StringRecord};
use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Compression applied to an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Plain text
    #[serde(alias = "uncompressed")]
    None,
    /// gzip (single or multi-member, so bgzip output also works)
    #[default]
    Gzip,
}

/// Errors raised while opening or streaming a TSV file
#[derive(Error, Debug)]
pub enum TsvError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read header of {path}: {source}")]
    Header {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("File {path} is empty (no header line)")]
    EmptyFile { path: PathBuf },

    #[error("Could not find column `{column}` in header of input file `{path}`. Header: {header:?}")]
    MissingColumn {
        column: String,
        path: PathBuf,
        header: Vec<String>,
    },

    #[error("Failed to parse {path} at line {line}: {source}")]
    Row {
        path: PathBuf,
        line: u64,
        #[source]
        source: csv::Error,
    },
}

/// Lazy row iterator over one TSV file
///
/// Yields one `Vec<String>` per data line, ordered like the requested
/// columns. The first malformed line ends the stream with an error.
pub struct TsvReader {
    path: PathBuf,
    reader: csv::Reader<Box<dyn Read + Send>>,
    indices: Vec<usize>,
    record: StringRecord,
    finished: bool,
}

impl std::fmt::Debug for TsvReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TsvReader")
            .field("path", &self.path)
            .field("indices", &self.indices)
            .field("finished", &self.finished)
            .finish()
    }
}

impl TsvReader {
    /// Open `path` and resolve `columns` against its header
    ///
    /// # Arguments
    /// * `path` - Path to the TSV file
    /// * `compression` - How the file is compressed
    /// * `columns` - Column names to extract, in output order
    ///
    /// # Returns
    /// * `Ok(TsvReader)` - Reader positioned on the first data line
    /// * `Err(TsvError::MissingColumn)` - A requested column is not in the
    ///   header; no row has been read at that point
    pub fn open<S: AsRef<str>>(
        path: impl AsRef<Path>,
        compression: Compression,
        columns: &[S],
    ) -> Result<Self, TsvError> {
        let path = path.as_ref().to_path_buf();

        let file = File::open(&path).map_err(|source| TsvError::Open {
            path: path.clone(),
            source,
        })?;

        let source: Box<dyn Read + Send> = match compression {
            Compression::None => Box::new(BufReader::new(file)),
            Compression::Gzip => Box::new(MultiGzDecoder::new(BufReader::new(file))),
        };

        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(source);

        let header = reader
            .headers()
            .map_err(|source| TsvError::Header {
                path: path.clone(),
                source,
            })?
            .clone();

        if header.is_empty() {
            return Err(TsvError::EmptyFile { path });
        }

        let indices = resolve_columns(&header, columns).map_err(|column| {
            TsvError::MissingColumn {
                column,
                path: path.clone(),
                header: header.iter().map(str::to_string).collect(),
            }
        })?;

        Ok(Self {
            path,
            reader,
            indices,
            record: StringRecord::new(),
            finished: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for TsvReader {
    type Item = Result<Vec<String>, TsvError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.reader.read_record(&mut self.record) {
            Ok(true) => {
                // Field counts are checked by the csv reader, every index is in range
                let row = self
                    .indices
                    .iter()
                    .map(|&idx| self.record[idx].to_string())
                    .collect();
                Some(Ok(row))
            }
            Ok(false) => {
                self.finished = true;
                None
            }
            Err(source) => {
                self.finished = true;
                let line = source
                    .position()
                    .map(|p| p.line())
                    .unwrap_or_else(|| self.reader.position().line());
                Some(Err(TsvError::Row {
                    path: self.path.clone(),
                    line,
                    source,
                }))
            }
        }
    }
}

/// Map each requested column to its header index, or return the first missing name
fn resolve_columns<S: AsRef<str>>(
    header: &StringRecord,
    columns: &[S],
) -> Result<Vec<usize>, String> {
    let header_to_index: HashMap<&str, usize> = header
        .iter()
        .enumerate()
        .map(|(idx, name)| (name, idx))
        .collect();

    columns
        .iter()
        .map(|column| {
            let column = column.as_ref();
            header_to_index
                .get(column)
                .copied()
                .ok_or_else(|| column.to_string())
        })
        .collect()
}
