//! File standardization end to end: header auto-mapping against the shipped
//! column metadata, canonical CSV emission, and the analytics artifact.

use std::fs;

use matchmaker::config::ConfigStore;
use matchmaker::standardize;

const MESSY_INPUT: &str = "\
Company,Address,Zip,Phone,Email,Lead Score
\"Acme, Inc.\",100 Main St,10001,(212) 555-0100,ops@acme.com,7
Globex LLC,900 Elm Blvd,94105,415-555-0123,hq@globex.com,3
Globex LLC,900 Elm Blvd,94105,415-555-0123,hq@globex.com,3
";

fn shipped_columns_metadata() -> matchmaker::config::ColumnsMetadata {
	// integration tests run from the package root, where config/ lives
	let store = ConfigStore::new(
		"config/rules.json",
		"config/columns_metadata.json",
		"config/settings.json",
	);
	(*store.columns()).clone()
}

#[test]
fn process_file_maps_headers_and_writes_artifacts() {
	let dir = tempfile::tempdir().expect("tempdir");
	let input = dir.path().join("vendors.csv");
	fs::write(&input, MESSY_INPUT).expect("write input");

	let metadata = shipped_columns_metadata();
	let result = standardize::process_file(&input, dir.path(), &metadata).expect("process");

	// alternates resolve to canonical names
	assert_eq!(result.column_mapping["Company"], "COMPANY_NAME");
	assert_eq!(result.column_mapping["Address"], "ADDRESS_LINE_1");
	assert_eq!(result.column_mapping["Zip"], "ZIP_CODE");
	assert_eq!(result.column_mapping["Phone"], "PHONE_NUMBER");
	assert_eq!(result.column_mapping["Email"], "EMAIL_ADDRESS");
	assert_eq!(result.unmapped_columns, vec!["Lead Score"]);
	assert_eq!(result.total_rows, 3);

	// processed CSV: canonical input-group columns first, retained source
	// columns last
	let processed = fs::read_to_string(dir.path().join(&result.processed_filename))
		.expect("processed file");
	let header = processed.lines().next().expect("header");
	assert!(header.starts_with("SOURCE_TYPE,SOURCE_ID,COMPANY_NAME"));
	assert!(header.ends_with("Lead Score"));
	assert!(processed.contains("\"Acme, Inc.\""));

	// analytics JSON is written alongside
	let analytics_path = dir.path().join(&result.analytics_filename);
	assert!(analytics_path.exists());

	let analytics: serde_json::Value =
		serde_json::from_slice(&fs::read(&analytics_path).expect("analytics"))
			.expect("analytics json");
	assert_eq!(analytics["summary"]["total_rows"], 3);
	assert_eq!(analytics["duplicates"]["exact_duplicates"], 1);
}

#[test]
fn analytics_track_validity_and_grade() {
	let dir = tempfile::tempdir().expect("tempdir");
	let input = dir.path().join("vendors.csv");
	fs::write(&input, MESSY_INPUT).expect("write input");

	let metadata = shipped_columns_metadata();
	let result = standardize::process_file(&input, dir.path(), &metadata).expect("process");

	let email = result.analytics.field_analytics.email.expect("email stats");
	assert_eq!(email.valid, 3);
	assert_eq!(email.unique, 2);

	let grade = &result.analytics.data_quality.grade;
	assert!(["A", "B", "C", "D", "F"].contains(&grade.as_str()));
}

#[test]
fn process_file_rejects_headers_only() {
	let dir = tempfile::tempdir().expect("tempdir");
	let input = dir.path().join("empty.csv");
	fs::write(&input, "Company,Phone\n").expect("write input");

	let result = standardize::process_file(&input, dir.path(), &shipped_columns_metadata());
	assert!(result.is_err());
}

#[test]
fn preview_bounds_rows_but_reports_total() {
	let dir = tempfile::tempdir().expect("tempdir");
	let input = dir.path().join("vendors.csv");
	fs::write(&input, MESSY_INPUT).expect("write input");

	let preview = standardize::preview(&input, 2).expect("preview");
	assert_eq!(preview.preview.len(), 2);
	assert_eq!(preview.total_rows, 3);
	assert_eq!(preview.headers[0], "Company");
}
