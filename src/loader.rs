//! Loading gzip-compressed newline-delimited JSON exports into tables
//!
//! Two strategies are tried in order:
//!
//! 1. **Stream**: the whole decompressed buffer is read as a sequence of
//!    JSON values. Every value must be an object (or an array of objects).
//!    One bad value fails the strategy as a whole.
//! 2. **Line fallback**: the buffer is split into lines; blank lines and
//!    header lines starting with the file's base name are skipped, and each
//!    remaining line is parsed on its own. Lines that are not JSON objects
//!    are dropped.
//!
//! Only an unreadable or undecodable file is an error.

use crate::error::LoadError;
use crate::types::{CellKind, Table};
use flate2::read::MultiGzDecoder;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Which strategy produced a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    Stream,
    LineFallback,
}

/// A loaded table plus what the loader had to work around
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub table: Table,
    pub strategy: LoadStrategy,
    /// Lines dropped by the fallback because they were not JSON objects
    pub discarded_lines: usize,
    /// Lines skipped by the fallback because they started with the base name
    pub skipped_headers: usize,
}

#[derive(Debug, Error)]
enum StreamFailure {
    #[error("{0}")]
    Parse(#[from] serde_json::Error),

    #[error("value {index} is not an object (found {found})")]
    NotAnObject { index: usize, found: &'static str },
}

/// Load a gzip-compressed NDJSON file into a table
pub fn load<P: AsRef<Path>>(path: P) -> Result<LoadReport, LoadError> {
    let path = path.as_ref();
    let unavailable = |source| LoadError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(unavailable)?;
    let base = base_name(path);
    let report = load_reader(table_name(&base), &base, MultiGzDecoder::new(BufReader::new(file)))
        .map_err(unavailable)?;

    info!(
        path = %path.display(),
        rows = report.table.len(),
        columns = report.table.columns().len(),
        strategy = ?report.strategy,
        "Loaded source"
    );
    Ok(report)
}

/// Load a file and keep only the table
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<Table, LoadError> {
    load(path).map(|report| report.table)
}

/// Load from an already-decompressed reader.
///
/// `base_name` is the header token the fallback skips (e.g. `users.json`).
pub fn load_reader<R: Read>(name: &str, base_name: &str, mut reader: R) -> std::io::Result<LoadReport> {
    let mut content = Vec::new();
    reader.read_to_end(&mut content)?;
    Ok(load_bytes(name, base_name, &content))
}

/// Load from decompressed bytes held in memory
pub fn load_bytes(name: &str, base_name: &str, content: &[u8]) -> LoadReport {
    match parse_stream(content) {
        Ok(records) => LoadReport {
            table: Table::from_records(name, records),
            strategy: LoadStrategy::Stream,
            discarded_lines: 0,
            skipped_headers: 0,
        },
        Err(err) => {
            warn!(source = name, error = %err, "NDJSON parse failed, falling back to line-by-line parsing");
            parse_lines(name, base_name, content)
        }
    }
}

/// Final path segment with the `.gz` suffix removed
pub fn base_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    file_name.replace(".gz", "")
}

/// Table name for a base name: everything before the first `.`
pub fn table_name(base_name: &str) -> &str {
    base_name.split('.').next().unwrap_or(base_name)
}

fn parse_stream(content: &[u8]) -> Result<Vec<Map<String, Value>>, StreamFailure> {
    let mut records = Vec::new();
    let stream = serde_json::Deserializer::from_slice(content).into_iter::<Value>();

    for (index, value) in stream.enumerate() {
        match value? {
            Value::Object(obj) => records.push(obj),
            Value::Array(items) => {
                // a top-level array of objects is a stream of rows
                for item in items {
                    match item {
                        Value::Object(obj) => records.push(obj),
                        other => {
                            return Err(StreamFailure::NotAnObject {
                                index,
                                found: CellKind::of_json(&other).as_str(),
                            })
                        }
                    }
                }
            }
            other => {
                return Err(StreamFailure::NotAnObject {
                    index,
                    found: CellKind::of_json(&other).as_str(),
                })
            }
        }
    }

    Ok(records)
}

fn parse_lines(name: &str, base_name: &str, content: &[u8]) -> LoadReport {
    let mut table = Table::new(name);
    let mut discarded_lines = 0;
    let mut skipped_headers = 0;

    for (line_no, raw) in content.split(|b| *b == b'\n').enumerate() {
        let line = raw.strip_suffix(b"\r").unwrap_or(raw);
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        if !base_name.is_empty() && line.starts_with(base_name.as_bytes()) {
            debug!(source = name, line = line_no + 1, "Skipping header line");
            skipped_headers += 1;
            continue;
        }

        let mut buf = line.to_vec();
        match simd_json::serde::from_slice::<Value>(&mut buf) {
            Ok(Value::Object(obj)) => table.push_object(obj),
            Ok(other) => {
                debug!(source = name, line = line_no + 1, found = CellKind::of_json(&other).as_str(), "Discarding non-object line");
                discarded_lines += 1;
            }
            Err(err) => {
                debug!(source = name, line = line_no + 1, error = %err, "Discarding malformed line");
                discarded_lines += 1;
            }
        }
    }

    if discarded_lines > 0 {
        info!(source = name, discarded_lines, "Dropped unparseable lines");
    }

    LoadReport {
        table,
        strategy: LoadStrategy::LineFallback,
        discarded_lines,
        skipped_headers,
    }
}
