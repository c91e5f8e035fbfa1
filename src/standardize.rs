//! Header standardization and file-level analytics.
//!
//! Maps arbitrary input headers onto the canonical schema using column
//! metadata, emits a canonical CSV (canonical input-group columns first,
//! unmapped source columns retained verbatim), and computes a quality
//! analytics artifact for the processed file.

pub mod analytics;

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::{
	config::ColumnsMetadata,
	ingest::{self, IngestError, Record},
};

pub use analytics::Analytics;

/// Column-metadata groups whose canonical columns always appear in the
/// standardized output, even when empty.
const INPUT_GROUPS: &[&str] = &[
	"input-fields",
	"input-fields-(source)",
	"input-fields-(address)",
	"input-fields-(email)",
	"input-fields-(phone)",
];

/// Minimum header-match score the auto-mapper accepts.
const ACCEPT_SCORE: f64 = 70.0;

#[derive(Debug, Error)]
pub enum StandardizeError {
	#[error("File has no data rows")]
	NoDataRows,

	#[error(transparent)]
	Input(#[from] IngestError),

	#[error("Failed to write processed file: {0}")]
	Output(#[source] IngestError),

	#[error("Failed to write analytics: {0}")]
	Analytics(#[source] std::io::Error),
}

/// An auto-mapping of source headers to canonical columns, with per-header
/// match confidence.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HeaderMapping {
	/// Source header to canonical column.
	pub mapping: IndexMap<String, String>,
	/// Source header to match score (100 exact, 95 alternate, 70 substring).
	pub confidence: IndexMap<String, f64>,
}

/// Result of standardizing one file.
#[derive(Debug, Serialize)]
pub struct StandardizeResult {
	pub processed_filename: String,
	pub analytics_filename: String,
	pub column_mapping: IndexMap<String, String>,
	pub mapped_columns: usize,
	pub unmapped_columns: Vec<String>,
	pub total_rows: usize,
	pub total_columns: usize,
	pub analytics: Analytics,
}

/// A bounded preview of a CSV file.
#[derive(Debug, Serialize)]
pub struct Preview {
	pub headers: Vec<String>,
	pub preview: Vec<Record>,
	pub total_rows: usize,
}

/// Score one source header against the column metadata and map it to the
/// best-scoring canonical column, if any scores at least [`ACCEPT_SCORE`].
///
/// Exact canonical-name match scores 100, an exact alternate match 95, and
/// a substring match in either direction 70.
pub fn auto_map(headers: &[String], metadata: &ColumnsMetadata) -> HeaderMapping {
	let mut result = HeaderMapping::default();

	for header in headers {
		let cleaned = header.trim().to_uppercase();
		if cleaned.is_empty() {
			continue;
		}

		let mut best: Option<(&str, f64)> = None;
		for (canonical, meta) in metadata {
			let canonical_upper = canonical.to_uppercase();

			let score = if cleaned == canonical_upper {
				100.0
			} else if meta
				.alternate_columns
				.iter()
				.any(|a| a.trim().to_uppercase() == cleaned)
			{
				95.0
			} else if canonical_upper.contains(&cleaned) || cleaned.contains(&canonical_upper) {
				70.0
			} else {
				0.0
			};

			if best.map(|(_, s)| score > s).unwrap_or(score > 0.0) {
				best = Some((canonical, score));
			}
		}

		if let Some((canonical, score)) = best {
			if score >= ACCEPT_SCORE {
				result.mapping.insert(header.clone(), canonical.to_string());
				result.confidence.insert(header.clone(), score);
			}
		}
	}

	result
}

/// Standardize one file: map its headers, emit the canonical CSV into
/// `output_dir`, compute analytics, and write them alongside.
pub fn process_file(
	input: &Path,
	output_dir: &Path,
	metadata: &ColumnsMetadata,
) -> Result<StandardizeResult, StandardizeError> {
	let (source_headers, rows) = ingest::read_records(input, None)?;
	if rows.is_empty() {
		return Err(StandardizeError::NoDataRows);
	}

	let header_mapping = auto_map(&source_headers, metadata);
	let mapping = &header_mapping.mapping;

	// Canonical input-group columns lead the output, even when empty.
	let standard_columns: Vec<String> = metadata
		.iter()
		.filter(|(_, meta)| INPUT_GROUPS.contains(&meta.group.as_str()))
		.map(|(canonical, _)| canonical.clone())
		.collect();

	let unmapped_columns: Vec<String> = source_headers
		.iter()
		.filter(|h| !mapping.contains_key(*h))
		.cloned()
		.collect();

	let mut output_headers = standard_columns.clone();
	output_headers.extend(unmapped_columns.iter().cloned());

	let processed_rows: Vec<Record> = rows
		.into_iter()
		.map(|row| {
			let mut processed: Record = row
				.into_iter()
				.map(|(column, value)| {
					let name = mapping.get(&column).cloned().unwrap_or(column);
					(name, value)
				})
				.collect();
			for canonical in &standard_columns {
				if !processed.contains_key(canonical) {
					processed.insert(canonical.clone(), String::new());
				}
			}
			processed
		})
		.collect();

	let file_id: String = Uuid::new_v4().to_string().chars().take(8).collect();
	let stem = input
		.file_stem()
		.map(|s| s.to_string_lossy().to_string())
		.unwrap_or_else(|| "input".to_string());

	let processed_filename = format!("{}_{}_processed.csv", file_id, stem);
	let processed_path = output_dir.join(&processed_filename);
	ingest::write_records(&processed_path, &output_headers, &processed_rows)
		.map_err(StandardizeError::Output)?;

	let analytics = analytics::calculate(&processed_rows, &output_headers, metadata);

	let analytics_filename = format!("{}_{}_analytics.json", file_id, stem);
	let analytics_path = output_dir.join(&analytics_filename);
	write_analytics(&analytics_path, &analytics).map_err(StandardizeError::Analytics)?;

	info!(
		"Standardized {} -> {} ({} columns mapped, {} retained)",
		input.display(),
		processed_filename,
		mapping.len(),
		unmapped_columns.len()
	);

	Ok(StandardizeResult {
		processed_filename,
		analytics_filename,
		mapped_columns: mapping.len(),
		column_mapping: header_mapping.mapping,
		unmapped_columns,
		total_rows: processed_rows.len(),
		total_columns: output_headers.len(),
		analytics,
	})
}

/// Read the head of a CSV file for display.
pub fn preview(path: &Path, max_rows: usize) -> Result<Preview, StandardizeError> {
	let (headers, mut rows) = ingest::read_records(path, None)?;
	let total_rows = rows.len();
	rows.truncate(max_rows);

	Ok(Preview {
		headers,
		preview: rows,
		total_rows,
	})
}

fn write_analytics(path: &PathBuf, analytics: &Analytics) -> Result<(), std::io::Error> {
	let json = serde_json::to_vec_pretty(analytics)?;
	std::fs::write(path, json)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::ColumnMeta;

	fn metadata() -> ColumnsMetadata {
		let mut meta = ColumnsMetadata::default();
		meta.insert(
			"COMPANY_NAME".to_string(),
			ColumnMeta {
				display_label: "Company Name".to_string(),
				group: "input-fields".to_string(),
				alternate_columns: vec!["COMPANY".to_string(), "BUSINESS_NAME".to_string()],
				..ColumnMeta::default()
			},
		);
		meta.insert(
			"ZIP_CODE".to_string(),
			ColumnMeta {
				display_label: "ZIP Code".to_string(),
				group: "input-fields-(address)".to_string(),
				alternate_columns: vec!["ZIP".to_string(), "POSTAL_CODE".to_string()],
				..ColumnMeta::default()
			},
		);
		meta
	}

	fn headers(names: &[&str]) -> Vec<String> {
		names.iter().map(|n| n.to_string()).collect()
	}

	#[test]
	fn test_auto_map_exact_match() {
		let mapped = auto_map(&headers(&["COMPANY_NAME"]), &metadata());
		assert_eq!(mapped.mapping["COMPANY_NAME"], "COMPANY_NAME");
		assert_eq!(mapped.confidence["COMPANY_NAME"], 100.0);
	}

	#[test]
	fn test_auto_map_alternate_match() {
		let mapped = auto_map(&headers(&["company", "postal_code"]), &metadata());
		assert_eq!(mapped.mapping["company"], "COMPANY_NAME");
		assert_eq!(mapped.confidence["company"], 95.0);
		assert_eq!(mapped.mapping["postal_code"], "ZIP_CODE");
	}

	#[test]
	fn test_auto_map_substring_match() {
		let mapped = auto_map(&headers(&["ZIP_CODE_EXT_ZIP_CODE"]), &metadata());
		// canonical is a substring of the header
		assert_eq!(mapped.mapping["ZIP_CODE_EXT_ZIP_CODE"], "ZIP_CODE");
		assert_eq!(mapped.confidence["ZIP_CODE_EXT_ZIP_CODE"], 70.0);
	}

	#[test]
	fn test_auto_map_rejects_unrelated_headers() {
		let mapped = auto_map(&headers(&["FAVORITE_COLOR"]), &metadata());
		assert!(mapped.mapping.is_empty());
	}
}
