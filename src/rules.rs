//! Declarative match rules and their evaluation.
//!
//! A rule is a conjunction of per-field conditions; a pair of records
//! matches a rule iff every condition holds. Rules are evaluated in
//! ascending priority, with declaration order breaking ties, and the first
//! matching (rule, candidate) pair wins.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
	ingest::Record,
	similarity::{
		Method, calculate_similarity, compare_addresses, compare_company_names, compare_emails,
		compare_phones,
	},
};

/// A per-field threshold with blank-handling modifiers.
///
/// Semantics, in order:
/// 1. `blank` set: the condition holds iff both values are empty.
/// 2. Either value empty: the condition holds iff `blank_allowed`.
/// 3. Otherwise the field comparator score `s` decides:
///    `include` means `s >= percentage`, `!include` means `s < percentage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
	pub field: String,
	#[serde(default)]
	pub percentage: f64,
	#[serde(default = "default_true")]
	pub include: bool,
	#[serde(default)]
	pub blank: bool,
	#[serde(default)]
	pub blank_allowed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
	#[serde(default = "default_true")]
	pub enabled: bool,
	#[serde(default = "default_priority")]
	pub priority: i64,
	#[serde(default)]
	pub match_reason: String,
	#[serde(default)]
	pub conditions: Vec<Condition>,
}

/// The on-disk rule document: rule id to rule, declaration order preserved
/// because priority ties break on it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesDocument {
	#[serde(default)]
	pub rules: IndexMap<String, Rule>,
}

fn default_true() -> bool {
	true
}

fn default_priority() -> i64 {
	999
}

/// Comparator families a condition's field can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldComparator {
	Company,
	Address,
	Phone,
	Email,
	Generic,
}

/// Substring dispatch table, scanned in declared order against the
/// uppercased field name. Precedence: COMPANY|NAME, ADDRESS, PHONE, EMAIL,
/// then the generic comparator.
const COMPARATOR_DISPATCH: &[(&str, FieldComparator)] = &[
	("COMPANY", FieldComparator::Company),
	("NAME", FieldComparator::Company),
	("ADDRESS", FieldComparator::Address),
	("PHONE", FieldComparator::Phone),
	("EMAIL", FieldComparator::Email),
];

/// Pick the comparator for a field name.
pub fn comparator_for(field: &str) -> FieldComparator {
	let upper = field.to_uppercase();

	COMPARATOR_DISPATCH
		.iter()
		.find(|(needle, _)| upper.contains(needle))
		.map(|(_, comparator)| *comparator)
		.unwrap_or(FieldComparator::Generic)
}

fn compare(comparator: FieldComparator, value1: &str, value2: &str) -> f64 {
	match comparator {
		FieldComparator::Company => compare_company_names(value1, value2),
		FieldComparator::Address => compare_addresses(value1, value2),
		FieldComparator::Phone => compare_phones(value1, value2),
		FieldComparator::Email => compare_emails(value1, value2),
		FieldComparator::Generic => calculate_similarity(value1, value2, Method::TokenSort),
	}
}

/// A successful rule evaluation against one candidate.
#[derive(Debug, Clone)]
pub struct BestMatch {
	/// Index of the matched candidate in the caller's row list.
	pub candidate: usize,
	/// The matching rule's `match_reason` (falling back to its id).
	pub reason: String,
	/// Per-field scores observed during evaluation, keyed
	/// `<field lowercased>_score`.
	pub scores: IndexMap<String, f64>,
}

/// Rule evaluation engine with a precomputed priority ordering.
pub struct RuleEngine {
	doc: RulesDocument,
	ordered_ids: Vec<String>,
}

impl RuleEngine {
	pub fn new(doc: RulesDocument) -> Self {
		// Stable sort: equal priorities keep declaration order.
		let mut ordered_ids: Vec<String> = doc.rules.keys().cloned().collect();
		ordered_ids.sort_by_key(|id| doc.rules[id].priority);

		RuleEngine { doc, ordered_ids }
	}

	pub fn rules(&self) -> &RulesDocument {
		&self.doc
	}

	/// Evaluate a single condition against a record pair. Values are
	/// trimmed before the blank checks and comparison.
	pub fn evaluate_condition(record: &Record, candidate: &Record, condition: &Condition) -> bool {
		let v1 = trimmed(record, &condition.field);
		let v2 = trimmed(candidate, &condition.field);

		if condition.blank {
			return v1.is_empty() && v2.is_empty();
		}

		if v1.is_empty() || v2.is_empty() {
			return condition.blank_allowed;
		}

		let score = compare(comparator_for(&condition.field), v1, v2);
		if condition.include {
			score >= condition.percentage
		} else {
			score < condition.percentage
		}
	}

	/// Evaluate a rule against a record pair.
	///
	/// Returns whether every condition held, plus the per-field scores
	/// computed along the way. Evaluation stops at the first failing
	/// condition; scores gathered up to and including that field are still
	/// returned for observability.
	pub fn evaluate_rule(
		record: &Record,
		candidate: &Record,
		rule: &Rule,
	) -> (bool, IndexMap<String, f64>) {
		let mut scores = IndexMap::new();

		if !rule.enabled || rule.conditions.is_empty() {
			return (false, scores);
		}

		for condition in &rule.conditions {
			let v1 = trimmed(record, &condition.field);
			let v2 = trimmed(candidate, &condition.field);

			if !v1.is_empty() && !v2.is_empty() {
				scores.insert(
					format!("{}_score", condition.field.to_lowercase()),
					compare(comparator_for(&condition.field), v1, v2),
				);
			}

			if !Self::evaluate_condition(record, candidate, condition) {
				return (false, scores);
			}
		}

		(true, scores)
	}

	/// Find the first matching (rule, candidate) pair: rules in priority
	/// order, candidates in the given order. `None` when nothing matches.
	pub fn find_best_match(
		&self,
		record: &Record,
		candidate_ids: &[usize],
		rows: &[Record],
	) -> Option<BestMatch> {
		for id in &self.ordered_ids {
			let rule = &self.doc.rules[id];
			if !rule.enabled {
				continue;
			}

			for &candidate in candidate_ids {
				let (matched, scores) = Self::evaluate_rule(record, &rows[candidate], rule);
				if matched {
					let reason = if rule.match_reason.is_empty() {
						id.clone()
					} else {
						rule.match_reason.clone()
					};
					return Some(BestMatch {
						candidate,
						reason,
						scores,
					});
				}
			}
		}

		None
	}
}

fn trimmed<'a>(record: &'a Record, field: &str) -> &'a str {
	record.get(field).map(|v| v.trim()).unwrap_or("")
}
