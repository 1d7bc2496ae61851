//! Append-only CSV sink.
//!
//! The header comes from the field order of the first record ever written to
//! the file and is written at most once. Later batches only append rows and
//! are trusted to share that header. Existing bytes are never rewritten.

use super::provider::{DataError, RawRecord};
use serde_json::Value;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A record that can be written as one CSV row.
pub trait SinkRecord {
    /// Field names, in column order.
    fn header(&self) -> Vec<String>;

    /// Cell values in the same order as `header`. Absent values are empty.
    fn values(&self) -> Vec<String>;
}

impl SinkRecord for RawRecord {
    fn header(&self) -> Vec<String> {
        self.iter().map(|(key, _)| key.clone()).collect()
    }

    fn values(&self) -> Vec<String> {
        self.iter().map(|(_, value)| render_value(value)).collect()
    }
}

/// Natural string form of a JSON value; null renders as an empty cell.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append records, writing the header first if the file is new or empty.
    ///
    /// Returns the number of rows written. An empty batch is a no-op and does
    /// not create the file.
    pub fn append<R: SinkRecord>(&self, records: &[R]) -> Result<usize, DataError> {
        let Some(first) = records.first() else {
            return Ok(0);
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let existing_len = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(self.io_error(e)),
        };
        let needs_header = existing_len == 0;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;

        // A torn last row from an interrupted write must not absorb the next row.
        if existing_len > 0 {
            let terminated = ends_with_newline(&mut file).map_err(|e| self.io_error(e))?;
            if !terminated {
                file.write_all(b"\n").map_err(|e| self.io_error(e))?;
            }
        }

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            wtr.write_record(first.header())
                .map_err(|e| self.format_error(e))?;
        }
        for record in records {
            wtr.write_record(record.values())
                .map_err(|e| self.format_error(e))?;
        }

        wtr.flush().map_err(|e| self.io_error(e))?;

        Ok(records.len())
    }

    /// Values of the first column of every data row (header skipped).
    ///
    /// A missing file yields an empty set.
    pub fn first_column(&self) -> Result<HashSet<String>, DataError> {
        let mut seen = HashSet::new();
        if !self.path.exists() {
            return Ok(seen);
        }

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| self.format_error(e))?;

        for row in rdr.records() {
            let row = row.map_err(|e| self.format_error(e))?;
            if let Some(first) = row.get(0) {
                seen.insert(first.to_string());
            }
        }
        Ok(seen)
    }

    fn io_error(&self, source: io::Error) -> DataError {
        DataError::Sink {
            path: self.path.clone(),
            source,
        }
    }

    fn format_error(&self, e: csv::Error) -> DataError {
        DataError::SinkFormat {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }
}

fn ends_with_newline(file: &mut fs::File) -> io::Result<bool> {
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
