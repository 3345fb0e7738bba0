//! Streaming reader for tab-separated training/test files.
//!
//! Reading is lazy and restartable: a [`DatasetReader`] holds only the path
//! and the schema, and every call to [`DatasetReader::rows`] starts a fresh
//! pass over the file. Scaled-up training files are never materialized in
//! memory by the reader itself.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::schema::DatasetSchema;

/// One record of a dataset: a mapping from schema column name to the raw
/// text value. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    values: HashMap<String, String>,
}

impl Row {
    /// Builds a row from `(column, value)` pairs.
    pub fn from_pairs<S: Into<String>, V: Into<String>>(pairs: Vec<(S, V)>) -> Self {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Raw value of a column, if present.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(|s| s.as_str())
    }

    /// Raw value of a column, or the empty string when absent. Missing
    /// feature text degrades to an empty (all-zero) feature vector rather
    /// than an error.
    pub fn get_or_empty(&self, column: &str) -> &str {
        self.get(column).unwrap_or("")
    }
}

/// A restartable, streaming reader over one tab-separated file.
pub struct DatasetReader {
    path: PathBuf,
    schema: DatasetSchema,
}

impl DatasetReader {
    /// Binds a path to a schema. Fails with [`PipelineError::DatasetNotFound`]
    /// if the path does not point to a readable file.
    pub fn open(path: impl AsRef<Path>, schema: DatasetSchema) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(PipelineError::DatasetNotFound { path });
        }
        Ok(Self { path, schema })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    /// Starts a new pass over the file, yielding one [`Row`] per line.
    ///
    /// A line whose field count does not match the schema arity yields
    /// [`PipelineError::DatasetFormat`]; rows are never padded or truncated
    /// silently. Blank lines are skipped.
    pub fn rows(&self) -> Result<RowIter> {
        let file = File::open(&self.path).map_err(|_| PipelineError::DatasetNotFound {
            path: self.path.clone(),
        })?;
        Ok(RowIter {
            lines: BufReader::new(file).lines(),
            schema: self.schema.clone(),
            path: self.path.clone(),
            line: 0,
        })
    }
}

/// Iterator over the rows of one pass. See [`DatasetReader::rows`].
pub struct RowIter {
    lines: Lines<BufReader<File>>,
    schema: DatasetSchema,
    path: PathBuf,
    line: usize,
}

impl RowIter {
    fn parse_line(&self, text: &str) -> Result<Row> {
        let fields: Vec<&str> = text.split('\t').collect();
        if fields.len() != self.schema.arity() {
            return Err(PipelineError::DatasetFormat {
                path: self.path.clone(),
                line: self.line,
                expected: self.schema.arity(),
                found: fields.len(),
            });
        }
        let values = self
            .schema
            .columns()
            .iter()
            .zip(fields)
            .map(|(col, field)| (col.name.clone(), field.to_string()))
            .collect();
        Ok(Row { values })
    }
}

impl Iterator for RowIter {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line += 1;
            match self.lines.next()? {
                Ok(text) => {
                    if text.is_empty() {
                        continue;
                    }
                    return Some(self.parse_line(&text));
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
