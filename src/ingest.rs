//! CSV ingest and emission.
//!
//! Input files are UTF-8 with a tolerated BOM; undecodable bytes are
//! replaced rather than rejected. The first row is the header (trimmed);
//! quoted multi-line fields are preserved as-is, and rows whose every value
//! is blank after trimming are skipped silently.

use std::{
	fs,
	path::{Path, PathBuf},
};

use indexmap::IndexMap;
use thiserror::Error;

/// A single input row: canonical (or source) column name to raw value, in
/// column order.
pub type Record = IndexMap<String, String>;

#[derive(Debug, Error)]
pub enum IngestError {
	#[error("Input file not found: {0}")]
	NotFound(PathBuf),

	#[error("Input file is {actual} bytes, over the {limit} byte limit")]
	TooLarge { actual: u64, limit: u64 },

	#[error("Input CSV is empty")]
	Empty,

	#[error("CSV error: {0}")]
	Csv(#[from] csv::Error),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

/// Read a CSV file into its trimmed header and ordered records.
///
/// `max_bytes` is the ingest-layer upload cap; `None` disables the check.
pub fn read_records(
	path: &Path,
	max_bytes: Option<u64>,
) -> Result<(Vec<String>, Vec<Record>), IngestError> {
	if !path.is_file() {
		return Err(IngestError::NotFound(path.to_path_buf()));
	}

	if let Some(limit) = max_bytes {
		let actual = fs::metadata(path)?.len();
		if actual > limit {
			return Err(IngestError::TooLarge { actual, limit });
		}
	}

	let raw = fs::read(path)?;
	let text = String::from_utf8_lossy(&raw);
	let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

	if text.trim().is_empty() {
		return Err(IngestError::Empty);
	}

	let mut reader = csv::ReaderBuilder::new()
		.has_headers(true)
		.flexible(true)
		.from_reader(text.as_bytes());

	let headers: Vec<String> = reader
		.headers()?
		.iter()
		.map(|h| h.trim().to_string())
		.collect();

	let mut rows = Vec::new();
	for result in reader.records() {
		let record = result?;

		if record.iter().all(|v| v.trim().is_empty()) {
			continue;
		}

		let mut row = Record::with_capacity(headers.len());
		for (i, header) in headers.iter().enumerate() {
			row.insert(header.clone(), record.get(i).unwrap_or("").to_string());
		}
		rows.push(row);
	}

	Ok((headers, rows))
}

/// Write records as CSV with the given column order, filling blanks for
/// missing columns. LF line endings, standard quoting, header first.
pub fn write_records(
	path: &Path,
	columns: &[String],
	rows: &[Record],
) -> Result<(), IngestError> {
	if let Some(parent) = path.parent() {
		if !parent.as_os_str().is_empty() {
			fs::create_dir_all(parent)?;
		}
	}

	let mut writer = csv::Writer::from_path(path)?;
	writer.write_record(columns)?;
	for row in rows {
		writer.write_record(
			columns
				.iter()
				.map(|col| row.get(col).map(String::as_str).unwrap_or("")),
		)?;
	}
	writer.flush()?;

	Ok(())
}

/// Union of every column seen across the rows, in first-appearance order.
pub fn column_union(rows: &[Record]) -> Vec<String> {
	let mut columns: Vec<String> = Vec::new();
	let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

	for row in rows {
		for col in row.keys() {
			if seen.insert(col.clone()) {
				columns.push(col.clone());
			}
		}
	}

	columns
}
