//! Field normalizers for the record-linkage core.
//!
//! Every normalizer is a pure function of its input: the same raw value
//! always produces the same normalized form, normalizing twice is a no-op,
//! and empty input yields an empty string.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

/// Legal-form suffixes stripped from company names, as whole tokens.
static LEGAL_FORM_TOKENS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
	[
		"inc",
		"incorporated",
		"corp",
		"corporation",
		"llc",
		"ltd",
		"limited",
		"co",
		"company",
		"plc",
		"lp",
		"llp",
		"pllc",
		"pc",
		"pa",
		"na",
	]
	.into_iter()
	.collect()
});

/// Leading articles stripped from company names, as whole tokens.
static ARTICLE_TOKENS: Lazy<HashSet<&'static str>> =
	Lazy::new(|| ["the", "a", "an"].into_iter().collect());

/// Whole-word postal abbreviations applied to addresses.
static STREET_ABBREVIATIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
	[
		("street", "st"),
		("avenue", "ave"),
		("road", "rd"),
		("boulevard", "blvd"),
		("drive", "dr"),
		("lane", "ln"),
		("court", "ct"),
		("place", "pl"),
		("suite", "ste"),
		("apartment", "apt"),
		("building", "bldg"),
		("floor", "fl"),
		("north", "n"),
		("south", "s"),
		("east", "e"),
		("west", "w"),
	]
	.into_iter()
	.collect()
});

/// Lower-case the input, replace every non-alphanumeric character with a
/// space, collapse runs of whitespace, and trim.
pub fn normalize_text(input: &str) -> String {
	let mut out = String::with_capacity(input.len());
	let mut pending_space = false;

	for ch in input.chars() {
		if ch.is_alphanumeric() {
			if pending_space && !out.is_empty() {
				out.push(' ');
			}
			pending_space = false;
			// Lowercasing can expand to several chars (e.g. dotted capital I
			// becomes i + combining dot); keep only the alphanumeric ones so
			// normalizing twice is still a no-op.
			for lower in ch.to_lowercase() {
				if lower.is_alphanumeric() {
					out.push(lower);
				}
			}
		} else {
			pending_space = true;
		}
	}

	out
}

/// Normalize a company name: [`normalize_text`], then drop legal-form
/// suffixes (inc, llc, ltd, ...) and articles as whole tokens.
pub fn normalize_company_name(name: &str) -> String {
	let text = normalize_text(name);

	text.split_whitespace()
		.filter(|token| !LEGAL_FORM_TOKENS.contains(token) && !ARTICLE_TOKENS.contains(token))
		.collect::<Vec<_>>()
		.join(" ")
}

/// Normalize an address: [`normalize_text`], then substitute standard postal
/// abbreviations. Substitutions are whole-word only, so "Streetwise" is left
/// alone while "Street" becomes "st".
pub fn normalize_address(address: &str) -> String {
	let text = normalize_text(address);

	text.split_whitespace()
		.map(|token| STREET_ABBREVIATIONS.get(token).copied().unwrap_or(token))
		.collect::<Vec<_>>()
		.join(" ")
}

/// Normalize a phone number to bare digits, dropping the leading country
/// code `1` from 11-digit US numbers. The result may be any length; callers
/// that require exactly 10 digits reject other lengths themselves.
pub fn normalize_phone(phone: &str) -> String {
	let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

	if digits.len() == 11 && digits.starts_with('1') {
		digits[1..].to_string()
	} else {
		digits
	}
}

/// Normalize an email address: trim and lower-case.
pub fn normalize_email(email: &str) -> String {
	email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_normalize_text_basics() {
		assert_eq!(normalize_text("  Hello,   World! "), "hello world");
		assert_eq!(normalize_text("A&B-C"), "a b c");
		assert_eq!(normalize_text(""), "");
		assert_eq!(normalize_text("!!!"), "");
	}

	#[test]
	fn test_normalize_company_strips_legal_forms() {
		assert_eq!(normalize_company_name("Acme, Inc."), "acme");
		assert_eq!(normalize_company_name("ACME INCORPORATED"), "acme");
		assert_eq!(normalize_company_name("Globex Corporation LLC"), "globex");
	}

	#[test]
	fn test_normalize_company_strips_articles() {
		// "The Widget Co." and "widget company" must collapse to the same form
		assert_eq!(normalize_company_name("The Widget Co."), "widget");
		assert_eq!(normalize_company_name("widget company"), "widget");
	}

	#[test]
	fn test_normalize_company_keeps_inner_tokens() {
		// "co" is only stripped as a whole token
		assert_eq!(normalize_company_name("Costco Wholesale"), "costco wholesale");
	}

	#[test]
	fn test_normalize_address_abbreviations() {
		assert_eq!(normalize_address("100 Main Street"), "100 main st");
		assert_eq!(
			normalize_address("42 North Oak Avenue, Suite 9"),
			"42 n oak ave ste 9"
		);
		assert_eq!(normalize_address("1 Streetwise Way"), "1 streetwise way");
	}

	#[test]
	fn test_normalize_phone_digits() {
		assert_eq!(normalize_phone("(212) 555-0100"), "2125550100");
		assert_eq!(normalize_phone("1-212-555-0100"), "2125550100");
		// a non-US 11-digit number keeps its digits
		assert_eq!(normalize_phone("21255501001"), "21255501001");
		assert_eq!(normalize_phone("555-0100"), "5550100");
		assert_eq!(normalize_phone("n/a"), "");
	}

	#[test]
	fn test_normalize_email() {
		assert_eq!(normalize_email("  Ops@Acme.COM "), "ops@acme.com");
		assert_eq!(normalize_email(""), "");
	}

	#[test]
	fn test_normalizers_idempotent() {
		for raw in ["The Widget Co.", "100 Main Street", "(212) 555-0100", " X@Y.Z "] {
			assert_eq!(
				normalize_text(&normalize_text(raw)),
				normalize_text(raw)
			);
			assert_eq!(
				normalize_company_name(&normalize_company_name(raw)),
				normalize_company_name(raw)
			);
			assert_eq!(
				normalize_address(&normalize_address(raw)),
				normalize_address(raw)
			);
			assert_eq!(
				normalize_phone(&normalize_phone(raw)),
				normalize_phone(raw)
			);
			assert_eq!(
				normalize_email(&normalize_email(raw)),
				normalize_email(raw)
			);
		}
	}
}
