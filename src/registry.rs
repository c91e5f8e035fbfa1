//! Incremental record registry.
//!
//! A persistent SQLite registry of every absorbed record, with secondary
//! blocking indices (exact normalized phone, 6-char name/address prefix
//! keys) and a weighted-blend scorer. Unlike the batch pipeline, records
//! are matched against everything previously absorbed, one file at a time.

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
	ingest::{self, IngestError, Record},
	normalize::{normalize_address, normalize_company_name, normalize_phone},
	similarity::{Method, calculate_similarity, compute_keys},
};

/// Accept threshold for the weighted blend score.
const MIN_SCORE: i64 = 82;
/// Relaxed threshold when the phone matches exactly.
const MIN_SCORE_PHONE_EXACT: i64 = 75;
/// Cap on candidates pulled per blocking probe.
const CANDIDATE_LIMIT: i64 = 500;

#[derive(Debug, Error)]
pub enum RegistryError {
	#[error("Missing required columns: {}", .0.join(", "))]
	MissingColumns(Vec<String>),

	#[error("Registry database error: {0}")]
	Sqlite(#[from] rusqlite::Error),

	#[error(transparent)]
	Input(#[from] IngestError),

	#[error("Failed to write output: {0}")]
	Output(#[source] IngestError),
}

/// A previously absorbed record, as seen by the matcher.
#[derive(Debug, Clone)]
pub struct CandidateRecord {
	pub source_type: String,
	pub source_id: String,
	pub company_name_norm: String,
	pub address_norm: String,
	pub phone_norm: String,
	pub dedup_id: String,
}

/// Statistics for one incremental ingest.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
	pub processed: usize,
	pub matched_existing: usize,
	pub new_dedup: usize,
	pub errors: usize,
}

/// SQLite-backed record registry.
pub struct RecordRegistry {
	conn: Connection,
}

impl RecordRegistry {
	/// Open (creating if needed) a registry database file.
	pub fn open(path: &Path) -> Result<Self, RegistryError> {
		let conn = Connection::open(path)?;
		Self::with_connection(conn)
	}

	/// An in-memory registry, used by tests.
	pub fn open_in_memory() -> Result<Self, RegistryError> {
		Self::with_connection(Connection::open_in_memory()?)
	}

	fn with_connection(conn: Connection) -> Result<Self, RegistryError> {
		conn.execute_batch(
			"
			CREATE TABLE IF NOT EXISTS records (
				id INTEGER PRIMARY KEY AUTOINCREMENT,
				source_type TEXT NOT NULL,
				source_id TEXT NOT NULL,
				company_name TEXT,
				company_name_norm TEXT,
				address TEXT,
				address_norm TEXT,
				phone TEXT,
				phone_norm TEXT,
				name_key TEXT,
				addr_key TEXT,
				dedup_id TEXT NOT NULL,
				created_at TEXT NOT NULL,
				UNIQUE(source_type, source_id)
			);
			CREATE INDEX IF NOT EXISTS idx_records_phone_norm ON records(phone_norm);
			CREATE INDEX IF NOT EXISTS idx_records_name_key ON records(name_key);
			CREATE INDEX IF NOT EXISTS idx_records_addr_key ON records(addr_key);
			CREATE INDEX IF NOT EXISTS idx_records_dedup_id ON records(dedup_id);
			",
		)?;

		Ok(RecordRegistry { conn })
	}

	/// Candidates sharing an exact normalized phone, most recent first.
	pub fn candidates_by_phone(
		&self,
		phone_norm: &str,
	) -> Result<Vec<CandidateRecord>, RegistryError> {
		let mut stmt = self.conn.prepare(
			"SELECT source_type, source_id, company_name_norm, address_norm, phone_norm, dedup_id
			 FROM records
			 WHERE phone_norm = ?1
			 ORDER BY id DESC
			 LIMIT ?2",
		)?;

		let rows = stmt.query_map(params![phone_norm, CANDIDATE_LIMIT], candidate_from_row)?;
		collect_candidates(rows)
	}

	/// Candidates sharing a name or address prefix key, most recent first.
	pub fn candidates_by_keys(
		&self,
		name_key: Option<&str>,
		addr_key: Option<&str>,
	) -> Result<Vec<CandidateRecord>, RegistryError> {
		if name_key.is_none() && addr_key.is_none() {
			return Ok(Vec::new());
		}

		let mut stmt = self.conn.prepare(
			"SELECT source_type, source_id, company_name_norm, address_norm, phone_norm, dedup_id
			 FROM records
			 WHERE (?1 IS NOT NULL AND name_key = ?1) OR (?2 IS NOT NULL AND addr_key = ?2)
			 ORDER BY id DESC
			 LIMIT ?3",
		)?;

		let rows = stmt.query_map(params![name_key, addr_key, CANDIDATE_LIMIT], candidate_from_row)?;
		collect_candidates(rows)
	}

	/// Upsert a record; re-ingesting the same `(source_type, source_id)`
	/// replaces the previous row.
	#[allow(clippy::too_many_arguments)]
	fn insert(
		&self,
		row: &Record,
		company_norm: &str,
		address_norm: &str,
		phone_norm: &str,
		name_key: Option<&str>,
		addr_key: Option<&str>,
		dedup_id: &str,
	) -> Result<(), RegistryError> {
		let field = |name: &str| row.get(name).map(|v| v.trim()).unwrap_or("");

		self.conn.execute(
			"INSERT OR REPLACE INTO records (
				source_type, source_id, company_name, company_name_norm,
				address, address_norm, phone, phone_norm,
				name_key, addr_key, dedup_id, created_at
			) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
			params![
				field("SOURCE_TYPE"),
				field("SOURCE_ID"),
				field("COMPANY_NAME"),
				company_norm,
				field("ADDRESS_LINE_1"),
				address_norm,
				field("PHONE_NUMBER"),
				phone_norm,
				name_key,
				addr_key,
				dedup_id,
				Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
			],
		)?;

		Ok(())
	}

	/// Stream a CSV file through the registry: block, match, assign a dedup
	/// id, absorb, and emit the enriched rows to `output`.
	pub fn ingest_file(
		&self,
		input: &Path,
		output: &Path,
		max_bytes: Option<u64>,
	) -> Result<IngestStats, RegistryError> {
		let (headers, mut rows) = ingest::read_records(input, max_bytes)?;

		let missing: Vec<String> = crate::matching::REQUIRED_COLUMNS
			.iter()
			.filter(|required| !headers.iter().any(|h| h == *required))
			.map(|required| required.to_string())
			.collect();
		if !missing.is_empty() {
			return Err(RegistryError::MissingColumns(missing));
		}

		let mut stats = IngestStats::default();

		for row in rows.iter_mut() {
			stats.processed += 1;

			match self.absorb_row(row) {
				Ok(absorbed) => {
					if absorbed.matched {
						stats.matched_existing += 1;
					} else {
						stats.new_dedup += 1;
					}
				}
				Err(e) => {
					stats.errors += 1;
					row.insert("DEDUP_ID".to_string(), String::new());
					row.insert("MATCH_STATUS".to_string(), "ERROR".to_string());
					row.insert("MATCH_SCORE".to_string(), String::new());
					row.insert("MATCHED_TO".to_string(), String::new());
					row.insert("ERROR".to_string(), e.to_string());
				}
			}
		}

		let mut columns = headers;
		for extra in ["DEDUP_ID", "MATCH_STATUS", "MATCH_SCORE", "MATCHED_TO", "ERROR"] {
			if !columns.iter().any(|c| c == extra) {
				columns.push(extra.to_string());
			}
		}
		ingest::write_records(output, &columns, &rows).map_err(RegistryError::Output)?;

		info!(
			"Absorbed {} records ({} matched, {} new, {} errors)",
			stats.processed, stats.matched_existing, stats.new_dedup, stats.errors
		);
		Ok(stats)
	}

	fn absorb_row(&self, row: &mut Record) -> Result<AbsorbedRow, RegistryError> {
		let field = |row: &Record, name: &str| {
			row.get(name).map(|v| v.trim().to_string()).unwrap_or_default()
		};

		let company_norm = normalize_company_name(&field(row, "COMPANY_NAME"));
		let address_norm = normalize_address(&field(row, "ADDRESS_LINE_1"));
		let phone_norm = normalize_phone(&field(row, "PHONE_NUMBER"));
		let (name_key, addr_key) = compute_keys(&company_norm, &address_norm);

		// Phone blocking first; prefix keys as the fallback probe.
		let mut candidates = if phone_norm.is_empty() {
			Vec::new()
		} else {
			self.candidates_by_phone(&phone_norm)?
		};
		if candidates.is_empty() {
			candidates = self.candidates_by_keys(name_key.as_deref(), addr_key.as_deref())?;
		}

		let best = pick_best_match(&company_norm, &address_norm, &phone_norm, &candidates);

		let (dedup_id, matched) = match &best {
			Some((candidate, score)) => {
				debug!(
					"{}:{} matched {}:{} at {}",
					field(row, "SOURCE_TYPE"),
					field(row, "SOURCE_ID"),
					candidate.source_type,
					candidate.source_id,
					score
				);
				(candidate.dedup_id.clone(), true)
			}
			None => (Uuid::new_v4().to_string(), false),
		};

		self.insert(
			row,
			&company_norm,
			&address_norm,
			&phone_norm,
			name_key.as_deref(),
			addr_key.as_deref(),
			&dedup_id,
		)?;

		row.insert("DEDUP_ID".to_string(), dedup_id);
		row.insert(
			"MATCH_STATUS".to_string(),
			if matched { "MATCH" } else { "NEW" }.to_string(),
		);
		row.insert(
			"MATCH_SCORE".to_string(),
			best.as_ref()
				.map(|(_, score)| score.to_string())
				.unwrap_or_default(),
		);
		row.insert(
			"MATCHED_TO".to_string(),
			best.as_ref()
				.map(|(candidate, _)| {
					format!("{}:{}", candidate.source_type, candidate.source_id)
				})
				.unwrap_or_default(),
		);

		Ok(AbsorbedRow { matched })
	}
}

struct AbsorbedRow {
	matched: bool,
}

/// Score every candidate with the weighted blend and keep the best, subject
/// to the acceptance guardrails: ≥ 82 normally, ≥ 75 when the phone matches
/// exactly.
pub fn pick_best_match<'a>(
	company_name_norm: &str,
	address_norm: &str,
	phone_norm: &str,
	candidates: &'a [CandidateRecord],
) -> Option<(&'a CandidateRecord, i64)> {
	let mut best: Option<(&CandidateRecord, i64)> = None;

	for candidate in candidates {
		let score = blend_score(company_name_norm, address_norm, phone_norm, candidate);
		if best.map(|(_, s)| score > s).unwrap_or(true) {
			best = Some((candidate, score));
		}
	}

	let (candidate, score) = best?;

	if !phone_norm.is_empty() && candidate.phone_norm == phone_norm {
		return (score >= MIN_SCORE_PHONE_EXACT).then_some((candidate, score));
	}

	(score >= MIN_SCORE).then_some((candidate, score))
}

/// Weighted blend: name 55%, address 35%, exact phone 10%.
fn blend_score(
	company_name_norm: &str,
	address_norm: &str,
	phone_norm: &str,
	candidate: &CandidateRecord,
) -> i64 {
	let name_sim = calculate_similarity(
		company_name_norm,
		&candidate.company_name_norm,
		Method::TokenSort,
	);
	let addr_sim = calculate_similarity(address_norm, &candidate.address_norm, Method::TokenSort);
	let phone_sim = if !phone_norm.is_empty() && candidate.phone_norm == phone_norm {
		100.0
	} else {
		0.0
	};

	(0.55 * name_sim + 0.35 * addr_sim + 0.10 * phone_sim).round() as i64
}

fn candidate_from_row(row: &rusqlite::Row) -> rusqlite::Result<CandidateRecord> {
	Ok(CandidateRecord {
		source_type: row.get(0)?,
		source_id: row.get(1)?,
		company_name_norm: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
		address_norm: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
		phone_norm: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
		dedup_id: row.get(5)?,
	})
}

fn collect_candidates(
	rows: impl Iterator<Item = rusqlite::Result<CandidateRecord>>,
) -> Result<Vec<CandidateRecord>, RegistryError> {
	let mut candidates = Vec::new();
	for row in rows {
		candidates.push(row?);
	}
	Ok(candidates)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn record(source_type: &str, source_id: &str, company: &str, address: &str, phone: &str) -> Record {
		[
			("SOURCE_TYPE", source_type),
			("SOURCE_ID", source_id),
			("COMPANY_NAME", company),
			("ADDRESS_LINE_1", address),
			("PHONE_NUMBER", phone),
		]
		.iter()
		.map(|(k, v)| (k.to_string(), v.to_string()))
		.collect()
	}

	fn absorb(registry: &RecordRegistry, rec: &Record) -> (String, bool) {
		let mut row = rec.clone();
		registry.absorb_row(&mut row).expect("absorb");
		(
			row["DEDUP_ID"].clone(),
			row["MATCH_STATUS"] == "MATCH",
		)
	}

	#[test]
	fn test_absorb_matches_by_phone_block() {
		let registry = RecordRegistry::open_in_memory().expect("registry");

		let (first_id, matched) = absorb(
			&registry,
			&record("A", "1", "Acme, Inc.", "100 Main St", "212-555-0100"),
		);
		assert!(!matched);

		let (second_id, matched) = absorb(
			&registry,
			&record("B", "7", "ACME INCORPORATED", "100 Main Street", "(212) 555-0100"),
		);
		assert!(matched);
		assert_eq!(first_id, second_id);
	}

	#[test]
	fn test_absorb_matches_by_prefix_keys_without_phone() {
		let registry = RecordRegistry::open_in_memory().expect("registry");

		let (first_id, _) = absorb(
			&registry,
			&record("A", "1", "Initech Systems", "200 Oak Avenue", ""),
		);
		let (second_id, matched) = absorb(
			&registry,
			&record("B", "2", "Initech Systems LLC", "200 Oak Ave", ""),
		);

		assert!(matched);
		assert_eq!(first_id, second_id);
	}

	#[test]
	fn test_absorb_distinct_companies_get_distinct_ids() {
		let registry = RecordRegistry::open_in_memory().expect("registry");

		let (first_id, _) = absorb(
			&registry,
			&record("A", "1", "Acme", "100 Main St", "212-555-0100"),
		);
		let (second_id, matched) = absorb(
			&registry,
			&record("A", "2", "Globex", "900 Elm Blvd", "415-555-0123"),
		);

		assert!(!matched);
		assert_ne!(first_id, second_id);
	}

	#[test]
	fn test_reingesting_same_source_replaces_row() {
		let registry = RecordRegistry::open_in_memory().expect("registry");

		absorb(&registry, &record("A", "1", "Acme", "100 Main St", "212-555-0100"));
		absorb(&registry, &record("A", "1", "Acme Corp", "100 Main St", "212-555-0100"));

		let count: i64 = registry
			.conn
			.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
			.expect("count");
		assert_eq!(count, 1);
	}

	#[test]
	fn test_pick_best_match_guardrails() {
		let candidate = CandidateRecord {
			source_type: "A".to_string(),
			source_id: "1".to_string(),
			company_name_norm: "acme widgets".to_string(),
			address_norm: "totally different".to_string(),
			phone_norm: "2125550100".to_string(),
			dedup_id: "key".to_string(),
		};
		let candidates = vec![candidate];

		// name 100 * 0.55 + addr ~0 + phone 100 * 0.10 = ~65: even the
		// relaxed phone threshold rejects it
		assert!(pick_best_match("acme widgets", "x y z", "2125550100", &candidates).is_none());

		// without address drag the blend clears the phone-exact bar
		let strong = pick_best_match(
			"acme widgets",
			"totally different",
			"2125550100",
			&candidates,
		);
		assert!(strong.is_some());
	}

	#[test]
	fn test_candidates_by_keys_requires_some_key() {
		let registry = RecordRegistry::open_in_memory().expect("registry");
		let candidates = registry.candidates_by_keys(None, None).expect("query");
		assert!(candidates.is_empty());
	}
}
