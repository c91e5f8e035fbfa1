//! Batch matching pipeline.
//!
//! Drives one CSV file end to end: field mapping, normalization, quality
//! scoring, blocking, rule evaluation, dedup-key assignment, and enriched
//! CSV emission. Processing is strictly input-ordered and candidates are
//! iterated in block insertion order, so the output is a deterministic
//! function of (input rows, rules, prior dedup store).

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
	config::ColumnsMetadata,
	dedup::{DedupMappings, DedupStore, StoreError},
	ingest::{self, IngestError, Record},
	normalize::{normalize_address, normalize_company_name, normalize_email, normalize_phone},
	quality::QualityScorer,
	rules::RuleEngine,
	similarity::blocking_key,
};

/// Canonical columns a matching input must carry (directly or through a
/// known alternate header).
pub const REQUIRED_COLUMNS: &[&str] = &[
	"SOURCE_TYPE",
	"SOURCE_ID",
	"COMPANY_NAME",
	"ADDRESS_LINE_1",
	"PHONE_NUMBER",
];

#[derive(Debug, Error)]
pub enum MatchingError {
	#[error("Missing required columns: {}", .0.join(", "))]
	MissingColumns(Vec<String>),

	#[error(transparent)]
	Input(#[from] IngestError),

	#[error("Failed to write output: {0}")]
	Output(#[source] IngestError),

	#[error("Failed to persist dedup store: {0}")]
	StorePersist(#[source] StoreError),
}

/// Statistics for one matching run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
	pub total_records: usize,
	pub matched_existing: usize,
	pub new_dedup_keys: usize,
	pub errors: usize,
	pub start_time: String,
	pub end_time: Option<String>,
}

/// The batch matching pipeline, with its collaborators injected.
pub struct MatchPipeline {
	engine: RuleEngine,
	scorer: QualityScorer,
	store: DedupStore,
	columns_metadata: ColumnsMetadata,
	max_input_bytes: Option<u64>,
	fixed_timestamp: Option<DateTime<Utc>>,
}

impl MatchPipeline {
	pub fn new(engine: RuleEngine, scorer: QualityScorer, store: DedupStore) -> Self {
		MatchPipeline {
			engine,
			scorer,
			store,
			columns_metadata: ColumnsMetadata::default(),
			max_input_bytes: None,
			fixed_timestamp: None,
		}
	}

	/// Columns metadata used to resolve alternate headers for the required
	/// column check.
	pub fn with_columns_metadata(mut self, metadata: ColumnsMetadata) -> Self {
		self.columns_metadata = metadata;
		self
	}

	/// Ingest-layer size cap for the input file.
	pub fn with_max_input_bytes(mut self, limit: u64) -> Self {
		self.max_input_bytes = Some(limit);
		self
	}

	/// Pin MATCH_TIMESTAMP to a fixed instant. Tests use this to assert
	/// byte-identical output.
	pub fn with_fixed_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
		self.fixed_timestamp = Some(timestamp);
		self
	}

	/// Run the pipeline over one input file.
	pub fn run(
		&self,
		input: &Path,
		output: &Path,
		field_mapping: Option<&HashMap<String, String>>,
		output_columns: Option<&[String]>,
	) -> Result<RunStats, MatchingError> {
		let mut stats = RunStats {
			total_records: 0,
			matched_existing: 0,
			new_dedup_keys: 0,
			errors: 0,
			start_time: self.timestamp(),
			end_time: None,
		};

		let (headers, rows) = ingest::read_records(input, self.max_input_bytes)?;
		let mapping = self.effective_mapping(&headers, field_mapping)?;
		let mut rows = apply_mapping(rows, &mapping);
		stats.total_records = rows.len();

		let mut mappings = self.store.load();

		// Per-row derived columns and blocking groups, in input order.
		let mut block_keys = Vec::with_capacity(rows.len());
		let mut blocks: IndexMap<String, Vec<usize>> = IndexMap::new();
		for (i, row) in rows.iter_mut().enumerate() {
			standardize_record(row);
			self.apply_quality(row);

			let key = blocking_key(row);
			blocks.entry(key.clone()).or_default().push(i);
			block_keys.push(key);
		}

		for i in 0..rows.len() {
			if let Err(message) =
				self.process_row(i, &mut rows, &blocks[&block_keys[i]], &mut mappings, &mut stats)
			{
				warn!("Row {} failed: {}", i, message);
				stats.errors += 1;
				let row = &mut rows[i];
				row.insert("MATCH_REASON".to_string(), "ERROR".to_string());
				row.insert("ERROR".to_string(), message);
			}
		}

		let columns = match output_columns {
			Some(explicit) => explicit.to_vec(),
			None => ingest::column_union(&rows),
		};
		ingest::write_records(output, &columns, &rows).map_err(MatchingError::Output)?;

		self.store
			.save(&mut mappings)
			.map_err(MatchingError::StorePersist)?;

		stats.end_time = Some(self.timestamp());
		info!(
			"Matched {} of {} records ({} new keys, {} errors)",
			stats.matched_existing, stats.total_records, stats.new_dedup_keys, stats.errors
		);
		Ok(stats)
	}

	fn process_row(
		&self,
		i: usize,
		rows: &mut [Record],
		block: &[usize],
		mappings: &mut DedupMappings,
		stats: &mut RunStats,
	) -> Result<(), String> {
		// Candidates are the already-processed rows of this block: they all
		// carry a DEDUP_KEY, so key reuse never consults unassigned rows.
		let candidate_ids: Vec<usize> = block
			.iter()
			.copied()
			.filter(|&j| j < i && rows[j].contains_key("DEDUP_KEY"))
			.collect();

		let best = self.engine.find_best_match(&rows[i], &candidate_ids, rows);

		match best {
			Some(matched) => {
				let existing_key = rows[matched.candidate]
					.get("DEDUP_KEY")
					.filter(|k| !k.is_empty())
					.cloned();
				let dedup_key = match existing_key {
					Some(key) => key,
					None => mappings.get_or_create(&rows[i]).0,
				};

				mappings.link(&dedup_key, &rows[i]);
				stats.matched_existing += 1;

				let matched_ids = mappings.matched_identifiers(&dedup_key).join("|");
				debug!("Row {} matched {} via {}", i, matched.candidate, matched.reason);

				let row = &mut rows[i];
				row.insert("DEDUP_KEY".to_string(), dedup_key);
				row.insert("MATCH_REASON".to_string(), matched.reason);
				row.insert("MATCHED_RECORD_IDS".to_string(), matched_ids);
				for (column, score) in matched.scores {
					row.insert(column, format!("{:.2}", score));
				}
			}
			None => {
				let (dedup_key, is_new) = mappings.get_or_create(&rows[i]);
				if is_new {
					stats.new_dedup_keys += 1;
				} else {
					// The content hash was already in the store: the record
					// re-found its existing key.
					stats.matched_existing += 1;
				}

				let row = &mut rows[i];
				row.insert("DEDUP_KEY".to_string(), dedup_key);
				row.insert("MATCH_REASON".to_string(), "NEW".to_string());
				row.insert("MATCHED_RECORD_IDS".to_string(), String::new());
			}
		}

		rows[i].insert("MATCH_TIMESTAMP".to_string(), self.timestamp());
		Ok(())
	}

	fn apply_quality(&self, row: &mut Record) {
		let email_quality = self.scorer.score_email(field(row, "EMAIL_ADDRESS"));
		let phone_quality = self
			.scorer
			.score_phone(field(row, "PHONE_NUMBER"), field(row, "PHONE_EXTENSION"));

		row.insert(
			"email_quality_total".to_string(),
			email_quality.total.to_string(),
		);
		for (name, score) in email_quality.criteria() {
			row.insert(format!("email_quality_{}", name), score.to_string());
		}

		row.insert(
			"phone_quality_total".to_string(),
			phone_quality.total.to_string(),
		);
		for (name, score) in phone_quality.criteria() {
			row.insert(format!("phone_quality_{}", name), score.to_string());
		}
	}

	/// Combine the explicit field mapping with alternate-header resolution
	/// for the required columns, and fail if any required column is still
	/// missing.
	fn effective_mapping(
		&self,
		headers: &[String],
		field_mapping: Option<&HashMap<String, String>>,
	) -> Result<HashMap<String, String>, MatchingError> {
		let mut mapping: HashMap<String, String> =
			field_mapping.cloned().unwrap_or_default();

		let mut missing = Vec::new();
		for required in REQUIRED_COLUMNS {
			let present = headers.iter().any(|h| {
				h.as_str() == *required
					|| mapping.get(h).map(String::as_str) == Some(*required)
			});
			if present {
				continue;
			}

			// A known alternate header satisfies the requirement and is
			// folded into the mapping.
			let alternate = self.columns_metadata.get(*required).and_then(|meta| {
				headers.iter().find(|h| {
					meta.alternate_columns
						.iter()
						.any(|a| a.trim().eq_ignore_ascii_case(h.trim()))
				})
			});

			match alternate {
				Some(header) => {
					debug!("Using {} as {}", header, required);
					mapping.insert(header.clone(), required.to_string());
				}
				None => missing.push(required.to_string()),
			}
		}

		if missing.is_empty() {
			Ok(mapping)
		} else {
			Err(MatchingError::MissingColumns(missing))
		}
	}

	fn timestamp(&self) -> String {
		self.fixed_timestamp
			.unwrap_or_else(Utc::now)
			.to_rfc3339_opts(SecondsFormat::Secs, true)
	}
}

/// Rename row columns through the mapping, passing unmapped columns through
/// in place.
fn apply_mapping(rows: Vec<Record>, mapping: &HashMap<String, String>) -> Vec<Record> {
	if mapping.is_empty() {
		return rows;
	}

	rows.into_iter()
		.map(|row| {
			row.into_iter()
				.map(|(column, value)| {
					let name = mapping.get(&column).cloned().unwrap_or(column);
					(name, value)
				})
				.collect()
		})
		.collect()
}

/// Derive the normalized view columns onto a record.
pub fn standardize_record(row: &mut Record) {
	let company = normalize_company_name(field(row, "COMPANY_NAME"));
	let address1 = normalize_address(field(row, "ADDRESS_LINE_1"));
	let address2 = normalize_address(field(row, "ADDRESS_LINE_2"));
	let phone = normalize_phone(field(row, "PHONE_NUMBER"));
	let email = normalize_email(field(row, "EMAIL_ADDRESS"));

	row.insert("COMPANY_NAME_STD".to_string(), company);
	row.insert("ADDRESS1_STD".to_string(), address1);
	row.insert("ADDRESS2_STD".to_string(), address2);
	row.insert("PHONE_STD".to_string(), phone);
	row.insert("EMAIL_STD".to_string(), email);
}

fn field<'a>(row: &'a Record, name: &str) -> &'a str {
	row.get(name).map(String::as_str).unwrap_or("")
}

#[cfg(test)]
mod tests {
	use super::*;

	fn record(pairs: &[(&str, &str)]) -> Record {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	}

	#[test]
	fn test_standardize_record_adds_std_columns() {
		let mut row = record(&[
			("COMPANY_NAME", "The Widget Co."),
			("ADDRESS_LINE_1", "100 Main Street"),
			("PHONE_NUMBER", "1-212-555-0100"),
			("EMAIL_ADDRESS", " Ops@Widget.COM"),
		]);
		standardize_record(&mut row);

		assert_eq!(row["COMPANY_NAME_STD"], "widget");
		assert_eq!(row["ADDRESS1_STD"], "100 main st");
		assert_eq!(row["ADDRESS2_STD"], "");
		assert_eq!(row["PHONE_STD"], "2125550100");
		assert_eq!(row["EMAIL_STD"], "ops@widget.com");
	}

	#[test]
	fn test_apply_mapping_renames_in_place() {
		let rows = vec![record(&[("Company", "Acme"), ("City", "NYC")])];
		let mapping: HashMap<String, String> =
			[("Company".to_string(), "COMPANY_NAME".to_string())]
				.into_iter()
				.collect();

		let mapped = apply_mapping(rows, &mapping);
		let columns: Vec<&String> = mapped[0].keys().collect();
		assert_eq!(columns, ["COMPANY_NAME", "City"]);
		assert_eq!(mapped[0]["COMPANY_NAME"], "Acme");
	}
}
