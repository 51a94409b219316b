use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::error::{RcmError, Result};
use crate::observability::metrics;

/// Identity of the raw input file, recorded in the run manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputFingerprint {
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

impl InputFingerprint {
    pub fn of_bytes(path: &str, bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            path: path.to_string(),
            sha256: hex::encode(hasher.finalize()),
            bytes: bytes.len() as u64,
        }
    }
}

/// The raw claim-line table: column names from the header row, every cell
/// still opaque text
#[derive(Debug, Clone)]
pub struct RawTable {
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
    source: Option<InputFingerprint>,
}

impl RawTable {
    /// Build a table from already-split data rows. Short rows are padded with
    /// empty cells and extra cells are dropped so every row has one cell per
    /// header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        // First occurrence wins on duplicated header names
        let mut index = HashMap::new();
        for (i, name) in headers.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Self {
            headers,
            index,
            rows,
            source: None,
        }
    }

    /// Apply the file layout: row 0 is metadata and discarded, row 1 names the
    /// columns, everything after is data.
    pub fn from_file_rows(mut rows: Vec<Vec<String>>, path: &str) -> Result<Self> {
        if rows.len() < 2 {
            return Err(RcmError::Load {
                path: path.to_string(),
                reason: format!(
                    "expected a metadata row and a header row, found {} row(s)",
                    rows.len()
                ),
            });
        }
        let data = rows.split_off(2);
        let headers = rows
            .pop()
            .unwrap_or_default()
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect();
        Ok(Self::new(headers, data))
    }

    pub fn with_source(mut self, source: InputFingerprint) -> Self {
        self.source = Some(source);
        self
    }

    pub fn source(&self) -> Option<&InputFingerprint> {
        self.source.as_ref()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Resolve every named column, failing with the full list of absent ones
    pub fn require_columns<const N: usize>(&self, names: &[&str; N]) -> Result<[usize; N]> {
        let mut resolved = [0usize; N];
        let mut missing = Vec::new();
        for (slot, name) in resolved.iter_mut().zip(names.iter()) {
            match self.column_index(name) {
                Some(i) => *slot = i,
                None => missing.push(name.to_string()),
            }
        }
        if missing.is_empty() {
            Ok(resolved)
        } else {
            Err(RcmError::Schema { missing })
        }
    }
}

/// Load the raw delimited file at `path`.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_raw_table(path: &Path) -> Result<RawTable> {
    let display = path.display().to_string();
    let bytes = fs::read(path).map_err(|e| RcmError::Load {
        path: display.clone(),
        reason: e.to_string(),
    })?;
    let fingerprint = InputFingerprint::of_bytes(&display, &bytes);
    debug!(sha256 = %fingerprint.sha256, bytes = fingerprint.bytes, "Read input file");

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes.as_slice());

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| RcmError::Load {
            path: display.clone(),
            reason: format!("row {}: {}", i, e),
        })?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    let table = RawTable::from_file_rows(rows, &display)?.with_source(fingerprint);
    metrics::loader::records_loaded(table.len(), bytes.len() as u64);
    info!(
        "Loaded {} records with {} columns",
        table.len(),
        table.headers().len()
    );
    Ok(table)
}
