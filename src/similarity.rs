//! Field-level similarity comparators and blocking keys.
//!
//! The comparators wrap the fuzzy primitives in [`fuzz`] with the field
//! normalizers, so callers always compare canonical forms. Phones and emails
//! are all-or-nothing: they score exactly 0 or 100.

pub mod fuzz;

use crate::{
	ingest::Record,
	normalize::{normalize_address, normalize_company_name, normalize_email, normalize_phone},
};

/// Base string similarity methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
	Ratio,
	TokenSort,
	TokenSet,
	Partial,
}

/// Similarity of two raw strings under the given method, 0..=100. Blank
/// input (after trimming) on either side scores 0.
pub fn calculate_similarity(value1: &str, value2: &str, method: Method) -> f64 {
	let v1 = value1.trim();
	let v2 = value2.trim();

	if v1.is_empty() || v2.is_empty() {
		return 0.0;
	}

	match method {
		Method::Ratio => fuzz::ratio(v1, v2),
		Method::TokenSort => fuzz::token_sort_ratio(v1, v2),
		Method::TokenSet => fuzz::token_set_ratio(v1, v2),
		Method::Partial => fuzz::partial_ratio(v1, v2),
	}
}

/// Compare two company names: token-sort ratio over the normalized forms.
pub fn compare_company_names(name1: &str, name2: &str) -> f64 {
	calculate_similarity(
		&normalize_company_name(name1),
		&normalize_company_name(name2),
		Method::TokenSort,
	)
}

/// Compare two addresses: token-sort ratio over the normalized forms.
pub fn compare_addresses(addr1: &str, addr2: &str) -> f64 {
	calculate_similarity(
		&normalize_address(addr1),
		&normalize_address(addr2),
		Method::TokenSort,
	)
}

/// Compare two phone numbers: 100 when the normalized digits are identical,
/// otherwise 0.
pub fn compare_phones(phone1: &str, phone2: &str) -> f64 {
	let p1 = normalize_phone(phone1);
	let p2 = normalize_phone(phone2);

	if p1.is_empty() || p2.is_empty() {
		return 0.0;
	}

	if p1 == p2 { 100.0 } else { 0.0 }
}

/// Compare two email addresses: 100 on normalized equality, otherwise 0.
pub fn compare_emails(email1: &str, email2: &str) -> f64 {
	let e1 = normalize_email(email1);
	let e2 = normalize_email(email2);

	if e1.is_empty() || e2.is_empty() {
		return 0.0;
	}

	if e1 == e2 { 100.0 } else { 0.0 }
}

/// Composite blocking key for a record: `"{c}_{z}_{p}"` lower-cased, where
/// `c` is the first 3 characters of the normalized company name, `z` the
/// first 5 characters of the raw ZIP code, and `p` the last 4 digits of the
/// normalized phone. Components may be empty; the key is still formed, so
/// sparse records block together rather than escaping comparison.
pub fn blocking_key(record: &Record) -> String {
	let company: String = normalize_company_name(field(record, "COMPANY_NAME"))
		.chars()
		.take(3)
		.collect();

	let zip: String = field(record, "ZIP_CODE").chars().take(5).collect();

	let phone = normalize_phone(field(record, "PHONE_NUMBER"));
	let phone_suffix = &phone[phone.len().saturating_sub(4)..];

	format!("{}_{}_{}", company, zip, phone_suffix).to_lowercase()
}

/// Secondary blocking keys: the first 6 alphanumeric characters of the
/// space-stripped normalized company name and address. Empty sides yield
/// `None`. Used by the incremental registry entry point.
pub fn compute_keys(
	company_name_norm: &str,
	address_norm: &str,
) -> (Option<String>, Option<String>) {
	(prefix_key(company_name_norm), prefix_key(address_norm))
}

fn prefix_key(normalized: &str) -> Option<String> {
	let key: String = normalized
		.chars()
		.filter(|c| !c.is_whitespace())
		.take(6)
		.collect();

	if key.is_empty() { None } else { Some(key) }
}

fn field<'a>(record: &'a Record, name: &str) -> &'a str {
	record.get(name).map(String::as_str).unwrap_or("")
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
	fn test_company_comparator_normalizes() {
		// legal forms and articles vanish before comparison
		assert_eq!(
			compare_company_names("The Widget Co.", "widget company"),
			100.0
		);
		assert_eq!(compare_company_names("Acme, Inc.", "ACME INCORPORATED"), 100.0);
	}

	#[test]
	fn test_address_comparator_normalizes() {
		assert_eq!(
			compare_addresses("100 Main Street", "100 Main St"),
			100.0
		);
	}

	#[test]
	fn test_phone_comparator_is_binary() {
		assert_eq!(compare_phones("(212) 555-0100", "1-212-555-0100"), 100.0);
		assert_eq!(compare_phones("212-555-0100", "212-555-0101"), 0.0);
		assert_eq!(compare_phones("", "212-555-0100"), 0.0);
	}

	#[test]
	fn test_email_comparator_is_binary() {
		assert_eq!(compare_emails(" Ops@Acme.com", "ops@acme.COM "), 100.0);
		assert_eq!(compare_emails("ops@acme.com", "info@acme.com"), 0.0);
		assert_eq!(compare_emails("ops@acme.com", ""), 0.0);
	}

	#[test]
	fn test_blocking_key_composite() {
		let rec = record(&[
			("COMPANY_NAME", "Acme, Inc."),
			("ZIP_CODE", "10001-1234"),
			("PHONE_NUMBER", "(212) 555-0100"),
		]);
		assert_eq!(blocking_key(&rec), "acm_10001_0100");
	}

	#[test]
	fn test_blocking_key_with_empty_components() {
		let rec = record(&[("COMPANY_NAME", ""), ("ZIP_CODE", ""), ("PHONE_NUMBER", "")]);
		assert_eq!(blocking_key(&rec), "__");
	}

	#[test]
	fn test_secondary_keys() {
		let (name_key, addr_key) = compute_keys("acme widget", "100 main st");
		assert_eq!(name_key.as_deref(), Some("acmewi"));
		assert_eq!(addr_key.as_deref(), Some("100mai"));

		let (none_key, _) = compute_keys("", "x");
		assert_eq!(none_key, None);
	}
}
