//! Email and phone quality scoring.
//!
//! Each scorer buckets a raw value into 0-100 by summing independent
//! criteria. Email criteria are worth 20 points each; phone criteria are
//! worth 11 points (12 for the toll-free check) with a 5-point partial for
//! the extension criterion. A value that fails the basic format check
//! short-circuits to an all-zero breakdown.
//!
//! The lookup tables (personal domains, generic and department mailbox
//! prefixes, toll-free area codes) come from `settings.json`; built-in
//! defaults apply when the document or a table is absent.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::normalize::normalize_phone;

static EMAIL_FORMAT: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email pattern")
});

const DEFAULT_PERSONAL_DOMAINS: &[&str] = &[
	"gmail.com",
	"yahoo.com",
	"hotmail.com",
	"outlook.com",
	"aol.com",
	"icloud.com",
	"mail.com",
	"protonmail.com",
	"zoho.com",
	"yandex.com",
	"live.com",
	"msn.com",
	"comcast.net",
	"att.net",
	"verizon.net",
];

const DEFAULT_GENERIC_PREFIXES: &[&str] = &[
	"info",
	"contact",
	"sales",
	"support",
	"admin",
	"help",
	"service",
	"webmaster",
	"postmaster",
	"noreply",
	"no-reply",
	"hello",
	"enquiries",
];

const DEFAULT_DEPARTMENT_PREFIXES: &[&str] = &[
	"hr",
	"finance",
	"marketing",
	"legal",
	"accounting",
	"billing",
	"operations",
	"engineering",
	"it",
	"tech",
	"development",
];

const DEFAULT_TOLL_FREE_CODES: &[&str] = &["800", "888", "877", "866", "855", "844", "833"];

/// Administrative mailbox prefixes; fixed, not configurable.
const ADMIN_PREFIXES: &[&str] = &["admin", "support", "help", "helpdesk", "service"];

/// Is the string a plausibly formatted email address?
pub fn is_valid_email(email: &str) -> bool {
	let trimmed = email.trim();
	!trimmed.is_empty() && EMAIL_FORMAT.is_match(trimmed)
}

fn string_set(values: &[&str]) -> HashSet<String> {
	values.iter().map(|v| v.to_string()).collect()
}

/// Email lookup tables from `settings.json` (`quality_scores.email`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailLists {
	#[serde(default = "EmailLists::default_personal_domains")]
	pub personal_domains: HashSet<String>,
	#[serde(default = "EmailLists::default_generic_prefixes")]
	pub generic_prefixes: HashSet<String>,
	#[serde(default = "EmailLists::default_department_prefixes")]
	pub department_prefixes: HashSet<String>,
}

impl EmailLists {
	fn default_personal_domains() -> HashSet<String> {
		string_set(DEFAULT_PERSONAL_DOMAINS)
	}

	fn default_generic_prefixes() -> HashSet<String> {
		string_set(DEFAULT_GENERIC_PREFIXES)
	}

	fn default_department_prefixes() -> HashSet<String> {
		string_set(DEFAULT_DEPARTMENT_PREFIXES)
	}
}

impl Default for EmailLists {
	fn default() -> Self {
		EmailLists {
			personal_domains: Self::default_personal_domains(),
			generic_prefixes: Self::default_generic_prefixes(),
			department_prefixes: Self::default_department_prefixes(),
		}
	}
}

/// Phone lookup tables from `settings.json` (`quality_scores.phone`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneLists {
	#[serde(default = "PhoneLists::default_toll_free_codes")]
	pub toll_free_codes: HashSet<String>,
}

impl PhoneLists {
	fn default_toll_free_codes() -> HashSet<String> {
		string_set(DEFAULT_TOLL_FREE_CODES)
	}
}

impl Default for PhoneLists {
	fn default() -> Self {
		PhoneLists {
			toll_free_codes: Self::default_toll_free_codes(),
		}
	}
}

/// The `quality_scores` section of `settings.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityLists {
	#[serde(default)]
	pub email: EmailLists,
	#[serde(default)]
	pub phone: PhoneLists,
}

/// Per-criterion email quality breakdown. Criteria are worth 20 points each.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmailQuality {
	pub valid_format: u8,
	pub non_personal: u8,
	pub non_generic: u8,
	pub non_admin: u8,
	pub non_department: u8,
	pub total: u8,
}

impl EmailQuality {
	/// Criterion names and scores, in scoring order.
	pub fn criteria(&self) -> [(&'static str, u8); 5] {
		[
			("valid_format", self.valid_format),
			("non_personal", self.non_personal),
			("non_generic", self.non_generic),
			("non_admin", self.non_admin),
			("non_department", self.non_department),
		]
	}
}

/// Per-criterion phone quality breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhoneQuality {
	pub has_10_digits: u8,
	pub not_all_same: u8,
	pub valid_area_code: u8,
	pub valid_exchange: u8,
	pub valid_line_number: u8,
	pub not_toll_free: u8,
	pub not_main_line: u8,
	pub has_extension: u8,
	pub high_quality: u8,
	pub total: u8,
}

impl PhoneQuality {
	/// Criterion names and scores, in scoring order.
	pub fn criteria(&self) -> [(&'static str, u8); 9] {
		[
			("has_10_digits", self.has_10_digits),
			("not_all_same", self.not_all_same),
			("valid_area_code", self.valid_area_code),
			("valid_exchange", self.valid_exchange),
			("valid_line_number", self.valid_line_number),
			("not_toll_free", self.not_toll_free),
			("not_main_line", self.not_main_line),
			("has_extension", self.has_extension),
			("high_quality", self.high_quality),
		]
	}
}

/// Quality scoring engine for emails and phones.
pub struct QualityScorer {
	lists: QualityLists,
}

impl QualityScorer {
	/// Create a scorer with the built-in lookup tables.
	pub fn new() -> Self {
		QualityScorer {
			lists: QualityLists::default(),
		}
	}

	/// Create a scorer with tables loaded from settings.
	pub fn with_lists(lists: QualityLists) -> Self {
		QualityScorer { lists }
	}

	/// Score an email address. Invalid format short-circuits to zero.
	pub fn score_email(&self, email: &str) -> EmailQuality {
		let mut result = EmailQuality::default();

		let email = email.trim().to_lowercase();
		if email.is_empty() || !EMAIL_FORMAT.is_match(&email) {
			return result;
		}
		result.valid_format = 20;

		let Some((local, domain)) = email.rsplit_once('@') else {
			return result;
		};

		if !self.lists.email.personal_domains.contains(domain) {
			result.non_personal = 20;
		}
		if !self.lists.email.generic_prefixes.contains(local) {
			result.non_generic = 20;
		}
		if !ADMIN_PREFIXES.contains(&local) {
			result.non_admin = 20;
		}
		if !self.lists.email.department_prefixes.contains(local) {
			result.non_department = 20;
		}

		result.total = result.valid_format
			+ result.non_personal
			+ result.non_generic
			+ result.non_admin
			+ result.non_department;
		result
	}

	/// Score a phone number. Anything but 10 digits (after dropping a
	/// leading US `1`) short-circuits to zero.
	pub fn score_phone(&self, phone: &str, extension: &str) -> PhoneQuality {
		let mut result = PhoneQuality::default();

		if phone.trim().is_empty() {
			return result;
		}

		let digits = normalize_phone(phone);
		if digits.len() != 10 {
			return result;
		}
		result.has_10_digits = 11;

		let unique: HashSet<char> = digits.chars().collect();
		if unique.len() > 1 {
			result.not_all_same = 11;
		}

		let area_code = &digits[..3];
		let exchange = &digits[3..6];
		let line_number = &digits[6..];

		if !area_code.starts_with(['0', '1']) {
			result.valid_area_code = 11;
		}
		if !exchange.starts_with(['0', '1']) {
			result.valid_exchange = 11;
		}
		if line_number != "0000" {
			result.valid_line_number = 11;
		}
		if !self.lists.phone.toll_free_codes.contains(area_code) {
			result.not_toll_free = 12;
		}

		// A line number ending in 000 usually reaches a switchboard, not a
		// person; an extension restores the value of such a number.
		let is_main_line = line_number.ends_with("000");
		if !is_main_line {
			result.not_main_line = 11;
		}
		if !extension.trim().is_empty() {
			result.has_extension = 11;
		} else if !is_main_line {
			result.has_extension = 5;
		}

		let sequential = digits.contains("0123456789") || digits.contains("9876543210");
		let bytes = digits.as_bytes();
		let repeating = (0..=6).any(|i| bytes[i..i + 4].iter().all(|&b| b == bytes[i]));
		if !sequential && !repeating {
			result.high_quality = 11;
		}

		result.total = result
			.criteria()
			.iter()
			.map(|(_, score)| *score as u16)
			.sum::<u16>() as u8;
		result
	}
}

impl Default for QualityScorer {
	fn default() -> Self {
		Self::new()
	}
}
