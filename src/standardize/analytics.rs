//! Data-quality analytics over standardized rows.
//!
//! Produces the per-file artifact: column completeness, field-level
//! validity, duplicate detection, value distributions, and an overall
//! graded quality score.

use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::{config::ColumnsMetadata, ingest::Record, quality::is_valid_email};

/// Categorical fields whose value distributions are reported.
const CATEGORICAL_FIELDS: &[&str] = &[
	"SOURCE_TYPE",
	"STATE",
	"COUNTRY_CODE",
	"PHONE_TYPE",
	"ADDRESS_LOCATION_TYPE",
];

/// Key-field combinations scanned for potential duplicates.
const DUPLICATE_COMBOS: &[(&str, &[&str])] = &[
	("company_phone", &["COMPANY_NAME", "PHONE_NUMBER"]),
	(
		"company_address",
		&["COMPANY_NAME", "ADDRESS_LINE_1", "ZIP_CODE"],
	),
	("email", &["EMAIL_ADDRESS"]),
	("phone", &["PHONE_NUMBER"]),
];

#[derive(Debug, Serialize)]
pub struct Analytics {
	pub summary: Summary,
	pub column_completeness: IndexMap<String, ColumnCompleteness>,
	pub field_analytics: FieldAnalytics,
	pub duplicates: Duplicates,
	pub value_distributions: IndexMap<String, ValueDistribution>,
	pub data_quality: DataQuality,
}

#[derive(Debug, Serialize)]
pub struct Summary {
	pub total_rows: usize,
	pub total_columns: usize,
	pub processed_at: String,
}

#[derive(Debug, Serialize)]
pub struct ColumnCompleteness {
	pub filled: usize,
	pub empty: usize,
	pub completeness_pct: f64,
	pub display_label: String,
	pub description: String,
}

#[derive(Debug, Default, Serialize)]
pub struct FieldAnalytics {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub email: Option<ValidityStats>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub phone: Option<ValidityStats>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub zip_code: Option<ValidityStats>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub state: Option<StateStats>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub company_name: Option<CompanyStats>,
}

#[derive(Debug, Serialize)]
pub struct ValidityStats {
	pub total: usize,
	pub valid: usize,
	pub invalid: usize,
	pub validity_pct: f64,
	pub unique: usize,
}

#[derive(Debug, Serialize)]
pub struct StateStats {
	pub unique_states: usize,
	pub top_states: IndexMap<String, usize>,
}

#[derive(Debug, Serialize)]
pub struct CompanyStats {
	pub total: usize,
	pub unique: usize,
	pub avg_length: f64,
}

#[derive(Debug, Serialize)]
pub struct Duplicates {
	pub exact_duplicates: usize,
	pub potential_duplicates: IndexMap<String, ComboDuplicates>,
}

#[derive(Debug, Serialize)]
pub struct ComboDuplicates {
	pub duplicate_count: usize,
	pub fields: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ValueDistribution {
	pub unique_values: usize,
	pub top_values: IndexMap<String, usize>,
	pub total_filled: usize,
}

#[derive(Debug, Serialize)]
pub struct DataQuality {
	pub overall_score: f64,
	pub completeness_score: f64,
	pub duplicate_penalty: f64,
	pub grade: String,
}

/// Compute the analytics artifact for standardized rows.
pub fn calculate(rows: &[Record], headers: &[String], metadata: &ColumnsMetadata) -> Analytics {
	let total_rows = rows.len();

	let column_completeness = completeness(rows, headers, metadata);
	let field_analytics = analyze_fields(rows, headers);
	let duplicates = detect_duplicates(rows, headers);
	let value_distributions = distributions(rows, headers);
	let data_quality = quality_score(
		&column_completeness,
		&field_analytics,
		&duplicates,
		total_rows,
	);

	Analytics {
		summary: Summary {
			total_rows,
			total_columns: headers.len(),
			processed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
		},
		column_completeness,
		field_analytics,
		duplicates,
		value_distributions,
		data_quality,
	}
}

fn completeness(
	rows: &[Record],
	headers: &[String],
	metadata: &ColumnsMetadata,
) -> IndexMap<String, ColumnCompleteness> {
	let total_rows = rows.len();
	let mut result = IndexMap::new();

	for column in headers {
		let filled = rows
			.iter()
			.filter(|row| !value(row, column).trim().is_empty())
			.count();
		let pct = if total_rows > 0 {
			round2(filled as f64 / total_rows as f64 * 100.0)
		} else {
			0.0
		};

		let meta = metadata.get(column);
		result.insert(
			column.clone(),
			ColumnCompleteness {
				filled,
				empty: total_rows - filled,
				completeness_pct: pct,
				display_label: meta
					.map(|m| m.display_label.clone())
					.filter(|l| !l.is_empty())
					.unwrap_or_else(|| column.clone()),
				description: meta.map(|m| m.description.clone()).unwrap_or_default(),
			},
		);
	}

	result
}

fn analyze_fields(rows: &[Record], headers: &[String]) -> FieldAnalytics {
	let mut result = FieldAnalytics::default();
	let has = |name: &str| headers.iter().any(|h| h == name);

	if has("EMAIL_ADDRESS") {
		result.email = Some(validity_stats(rows, "EMAIL_ADDRESS", is_valid_email, |e| {
			e.trim().to_lowercase()
		}));
	}

	if has("PHONE_NUMBER") {
		result.phone = Some(validity_stats(rows, "PHONE_NUMBER", is_valid_phone, digits));
	}

	if has("ZIP_CODE") {
		result.zip_code = Some(validity_stats(rows, "ZIP_CODE", is_valid_zip, |z| {
			z.trim().chars().take(5).collect()
		}));
	}

	if has("STATE") {
		let states: Vec<String> = rows
			.iter()
			.map(|row| value(row, "STATE"))
			.filter(|v| !v.is_empty())
			.map(|v| v.trim().to_uppercase())
			.collect();
		let counts = counted(states.iter().map(String::as_str));
		result.state = Some(StateStats {
			unique_states: counts.len(),
			top_states: top_n(counts, 10),
		});
	}

	if has("COMPANY_NAME") {
		let companies: Vec<&str> = rows
			.iter()
			.map(|row| value(row, "COMPANY_NAME"))
			.filter(|v| !v.is_empty())
			.collect();
		let unique: std::collections::HashSet<String> = companies
			.iter()
			.map(|c| c.trim().to_lowercase())
			.collect();
		let avg_length = if companies.is_empty() {
			0.0
		} else {
			round1(
				companies.iter().map(|c| c.chars().count()).sum::<usize>() as f64
					/ companies.len() as f64,
			)
		};

		result.company_name = Some(CompanyStats {
			total: companies.len(),
			unique: unique.len(),
			avg_length,
		});
	}

	result
}

fn validity_stats(
	rows: &[Record],
	column: &str,
	is_valid: impl Fn(&str) -> bool,
	canonical: impl Fn(&str) -> String,
) -> ValidityStats {
	let values: Vec<&str> = rows.iter().map(|row| value(row, column)).collect();
	let total = values.len();
	let valid = values.iter().filter(|v| is_valid(v)).count();
	let unique: std::collections::HashSet<String> = values
		.iter()
		.filter(|v| !v.is_empty())
		.map(|v| canonical(v))
		.collect();

	ValidityStats {
		total,
		valid,
		invalid: total - valid,
		validity_pct: if total > 0 {
			round2(valid as f64 / total as f64 * 100.0)
		} else {
			0.0
		},
		unique: unique.len(),
	}
}

fn detect_duplicates(rows: &[Record], headers: &[String]) -> Duplicates {
	// Exact duplicates: full-row fingerprint, counting every repeat.
	let fingerprints = rows.iter().map(|row| {
		headers
			.iter()
			.map(|h| value(row, h).trim().to_lowercase())
			.collect::<Vec<_>>()
			.join("|")
	});
	let exact_duplicates = excess(counted_owned(fingerprints));

	let mut potential_duplicates = IndexMap::new();
	for (name, fields) in DUPLICATE_COMBOS {
		if !fields.iter().all(|f| headers.iter().any(|h| h == f)) {
			continue;
		}

		let combos = rows.iter().filter_map(|row| {
			let combo = fields
				.iter()
				.map(|f| value(row, f).trim().to_lowercase())
				.collect::<Vec<_>>()
				.join("|");
			// Skip compositions whose every component is empty.
			if combo.chars().all(|c| c == '|') {
				None
			} else {
				Some(combo)
			}
		});

		potential_duplicates.insert(
			name.to_string(),
			ComboDuplicates {
				duplicate_count: excess(counted_owned(combos)),
				fields: fields.iter().map(|f| f.to_string()).collect(),
			},
		);
	}

	Duplicates {
		exact_duplicates,
		potential_duplicates,
	}
}

fn distributions(rows: &[Record], headers: &[String]) -> IndexMap<String, ValueDistribution> {
	let mut result = IndexMap::new();

	for field in CATEGORICAL_FIELDS {
		if !headers.iter().any(|h| h == field) {
			continue;
		}

		let values: Vec<String> = rows
			.iter()
			.map(|row| value(row, field))
			.filter(|v| !v.is_empty())
			.map(|v| v.trim().to_string())
			.collect();
		if values.is_empty() {
			continue;
		}

		let counts = counted(values.iter().map(String::as_str));
		result.insert(
			field.to_string(),
			ValueDistribution {
				unique_values: counts.len(),
				top_values: top_n(counts, 10),
				total_filled: values.len(),
			},
		);
	}

	result
}

fn quality_score(
	completeness: &IndexMap<String, ColumnCompleteness>,
	fields: &FieldAnalytics,
	duplicates: &Duplicates,
	total_rows: usize,
) -> DataQuality {
	let mut scores = Vec::new();

	let avg_completeness = if completeness.is_empty() {
		0.0
	} else {
		completeness
			.values()
			.map(|c| c.completeness_pct)
			.sum::<f64>() / completeness.len() as f64
	};
	scores.push(avg_completeness);

	for validity in [&fields.email, &fields.phone, &fields.zip_code]
		.into_iter()
		.flatten()
	{
		scores.push(validity.validity_pct);
	}

	let dup_score = if total_rows > 0 {
		(100.0 - duplicates.exact_duplicates as f64 / total_rows as f64 * 100.0).max(0.0)
	} else {
		100.0
	};
	scores.push(dup_score);

	let overall = round1(scores.iter().sum::<f64>() / scores.len() as f64);

	DataQuality {
		overall_score: overall,
		completeness_score: round1(avg_completeness),
		duplicate_penalty: round1(100.0 - dup_score),
		grade: grade(overall).to_string(),
	}
}

fn grade(score: f64) -> &'static str {
	if score >= 90.0 {
		"A"
	} else if score >= 80.0 {
		"B"
	} else if score >= 70.0 {
		"C"
	} else if score >= 60.0 {
		"D"
	} else {
		"F"
	}
}

fn is_valid_phone(phone: &str) -> bool {
	digits(phone).len() >= 10
}

fn is_valid_zip(zip: &str) -> bool {
	let len = digits(zip).len();
	len == 5 || len == 9
}

fn digits(s: &str) -> String {
	s.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn value<'a>(row: &'a Record, column: &str) -> &'a str {
	row.get(column).map(String::as_str).unwrap_or("")
}

/// Count occurrences preserving first-seen order.
fn counted<'a>(values: impl Iterator<Item = &'a str>) -> IndexMap<String, usize> {
	let mut counts: IndexMap<String, usize> = IndexMap::new();
	for v in values {
		*counts.entry(v.to_string()).or_insert(0) += 1;
	}
	counts
}

fn counted_owned(values: impl Iterator<Item = String>) -> HashMap<String, usize> {
	let mut counts: HashMap<String, usize> = HashMap::new();
	for v in values {
		*counts.entry(v).or_insert(0) += 1;
	}
	counts
}

/// Sum of every occurrence beyond the first per distinct value.
fn excess(counts: HashMap<String, usize>) -> usize {
	counts.values().filter(|&&c| c > 1).map(|c| c - 1).sum()
}

/// Top `n` values by count, descending; ties keep first-seen order.
fn top_n(counts: IndexMap<String, usize>, n: usize) -> IndexMap<String, usize> {
	let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
	entries.sort_by(|a, b| b.1.cmp(&a.1));
	entries.into_iter().take(n).collect()
}

fn round1(v: f64) -> f64 {
	(v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
	(v * 100.0).round() / 100.0
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

	fn headers(names: &[&str]) -> Vec<String> {
		names.iter().map(|n| n.to_string()).collect()
	}

	#[test]
	fn test_completeness_counts_blanks() {
		let rows = vec![
			record(&[("COMPANY_NAME", "Acme"), ("CITY", "NYC")]),
			record(&[("COMPANY_NAME", "  "), ("CITY", "LA")]),
		];
		let analytics = calculate(
			&rows,
			&headers(&["COMPANY_NAME", "CITY"]),
			&ColumnsMetadata::default(),
		);

		let company = &analytics.column_completeness["COMPANY_NAME"];
		assert_eq!(company.filled, 1);
		assert_eq!(company.empty, 1);
		assert_eq!(company.completeness_pct, 50.0);
		assert_eq!(analytics.column_completeness["CITY"].completeness_pct, 100.0);
	}

	#[test]
	fn test_email_validity_and_uniqueness() {
		let rows = vec![
			record(&[("EMAIL_ADDRESS", "ops@acme.com")]),
			record(&[("EMAIL_ADDRESS", "OPS@ACME.COM ")]),
			record(&[("EMAIL_ADDRESS", "broken@")]),
		];
		let analytics = calculate(&rows, &headers(&["EMAIL_ADDRESS"]), &ColumnsMetadata::default());

		let email = analytics.field_analytics.email.expect("email stats");
		assert_eq!(email.total, 3);
		assert_eq!(email.valid, 2);
		assert_eq!(email.invalid, 1);
		// case-insensitive uniqueness: two of the three collapse
		assert_eq!(email.unique, 2);
	}

	#[test]
	fn test_exact_duplicates() {
		let rows = vec![
			record(&[("COMPANY_NAME", "Acme"), ("CITY", "NYC")]),
			record(&[("COMPANY_NAME", "ACME"), ("CITY", "nyc")]),
			record(&[("COMPANY_NAME", "Globex"), ("CITY", "LA")]),
		];
		let analytics = calculate(
			&rows,
			&headers(&["COMPANY_NAME", "CITY"]),
			&ColumnsMetadata::default(),
		);

		// case-folded fingerprints collide: one excess row
		assert_eq!(analytics.duplicates.exact_duplicates, 1);
	}

	#[test]
	fn test_combo_duplicates_skip_empty_compositions() {
		let rows = vec![
			record(&[("COMPANY_NAME", ""), ("PHONE_NUMBER", "")]),
			record(&[("COMPANY_NAME", ""), ("PHONE_NUMBER", "")]),
			record(&[("COMPANY_NAME", "Acme"), ("PHONE_NUMBER", "212-555-0100")]),
			record(&[("COMPANY_NAME", "Acme"), ("PHONE_NUMBER", "212-555-0100")]),
		];
		let analytics = calculate(
			&rows,
			&headers(&["COMPANY_NAME", "PHONE_NUMBER"]),
			&ColumnsMetadata::default(),
		);

		let combo = &analytics.duplicates.potential_duplicates["company_phone"];
		// the all-empty pair does not count
		assert_eq!(combo.duplicate_count, 1);
	}

	#[test]
	fn test_value_distributions_top_values() {
		let rows = vec![
			record(&[("STATE", "NY")]),
			record(&[("STATE", "NY")]),
			record(&[("STATE", "CA")]),
			record(&[("STATE", "")]),
		];
		let analytics = calculate(&rows, &headers(&["STATE"]), &ColumnsMetadata::default());

		let dist = &analytics.value_distributions["STATE"];
		assert_eq!(dist.total_filled, 3);
		assert_eq!(dist.unique_values, 2);
		assert_eq!(dist.top_values["NY"], 2);
	}

	#[test]
	fn test_quality_grade_bands() {
		assert_eq!(grade(95.0), "A");
		assert_eq!(grade(85.0), "B");
		assert_eq!(grade(75.0), "C");
		assert_eq!(grade(65.0), "D");
		assert_eq!(grade(30.0), "F");
	}

	#[test]
	fn test_quality_score_perfect_file() {
		let rows = vec![
			record(&[("COMPANY_NAME", "Acme"), ("EMAIL_ADDRESS", "a@acme.com")]),
			record(&[("COMPANY_NAME", "Globex"), ("EMAIL_ADDRESS", "b@globex.com")]),
		];
		let analytics = calculate(
			&rows,
			&headers(&["COMPANY_NAME", "EMAIL_ADDRESS"]),
			&ColumnsMetadata::default(),
		);

		assert_eq!(analytics.data_quality.overall_score, 100.0);
		assert_eq!(analytics.data_quality.grade, "A");
		assert_eq!(analytics.data_quality.duplicate_penalty, 0.0);
	}
}
