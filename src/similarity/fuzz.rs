//! Fuzzy string comparison primitives.
//!
//! Implements the Indel-based ratio family used by the field comparators:
//! plain `ratio`, `token_sort_ratio`, `token_set_ratio`, and
//! `partial_ratio`. Scores are floats in 0..=100; an empty string on either
//! side always scores 0.

use std::collections::BTreeSet;

/// Length of the longest common subsequence of two char slices.
///
/// Single-row dynamic program; O(len1 * len2) time, O(len2) space.
fn lcs_len(a: &[char], b: &[char]) -> usize {
	if a.is_empty() || b.is_empty() {
		return 0;
	}

	let mut prev = vec![0usize; b.len() + 1];
	let mut curr = vec![0usize; b.len() + 1];

	for &ca in a {
		for (j, &cb) in b.iter().enumerate() {
			curr[j + 1] = if ca == cb {
				prev[j] + 1
			} else {
				prev[j + 1].max(curr[j])
			};
		}
		std::mem::swap(&mut prev, &mut curr);
		curr.fill(0);
	}

	prev[b.len()]
}

/// Similarity of two char slices as a percentage.
///
/// The Indel distance (insertions + deletions only) between the slices is
/// `len1 + len2 - 2 * lcs`, so the normalized similarity reduces to
/// `2 * lcs / (len1 + len2)`.
fn indel_similarity(a: &[char], b: &[char]) -> f64 {
	let total = a.len() + b.len();
	if total == 0 {
		return 0.0;
	}

	(2.0 * lcs_len(a, b) as f64 / total as f64) * 100.0
}

/// Indel-based similarity ratio of two strings.
pub fn ratio(a: &str, b: &str) -> f64 {
	if a.is_empty() || b.is_empty() {
		return 0.0;
	}

	let ac: Vec<char> = a.chars().collect();
	let bc: Vec<char> = b.chars().collect();
	indel_similarity(&ac, &bc)
}

/// [`ratio`] over the whitespace-separated tokens of each side, sorted and
/// re-joined, so word order does not matter.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
	ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// Token-set similarity: split both sides into token sets, then take the
/// best ratio among (intersection vs intersection+diff_a), (intersection vs
/// intersection+diff_b), and (both combined forms). Robust to one side
/// containing extra tokens.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
	let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
	let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();

	if tokens_a.is_empty() || tokens_b.is_empty() {
		return 0.0;
	}

	let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
	let diff_a: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
	let diff_b: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

	// One side a strict subset of the other: perfect set score.
	if !intersection.is_empty() && (diff_a.is_empty() || diff_b.is_empty()) {
		return 100.0;
	}

	let sect = intersection.join(" ");
	let sect_a = join_parts(&sect, &diff_a.join(" "));
	let sect_b = join_parts(&sect, &diff_b.join(" "));

	ratio(&sect, &sect_a)
		.max(ratio(&sect, &sect_b))
		.max(ratio(&sect_a, &sect_b))
}

/// Best [`ratio`] of the shorter string against every same-length window of
/// the longer string.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
	if a.is_empty() || b.is_empty() {
		return 0.0;
	}

	let ac: Vec<char> = a.chars().collect();
	let bc: Vec<char> = b.chars().collect();
	let (shorter, longer) = if ac.len() <= bc.len() {
		(&ac, &bc)
	} else {
		(&bc, &ac)
	};

	if shorter.len() == longer.len() {
		return indel_similarity(shorter, longer);
	}

	let mut best = 0.0f64;
	for start in 0..=(longer.len() - shorter.len()) {
		let window = &longer[start..start + shorter.len()];
		let score = indel_similarity(shorter, window);
		if score > best {
			best = score;
			if best >= 100.0 {
				break;
			}
		}
	}

	best
}

fn sorted_tokens(s: &str) -> String {
	let mut tokens: Vec<&str> = s.split_whitespace().collect();
	tokens.sort_unstable();
	tokens.join(" ")
}

fn join_parts(left: &str, right: &str) -> String {
	if left.is_empty() {
		right.to_string()
	} else if right.is_empty() {
		left.to_string()
	} else {
		format!("{} {}", left, right)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_ratio_identical() {
		assert_eq!(ratio("acme widgets", "acme widgets"), 100.0);
	}

	#[test]
	fn test_ratio_empty_is_zero() {
		assert_eq!(ratio("", "acme"), 0.0);
		assert_eq!(ratio("acme", ""), 0.0);
		assert_eq!(ratio("", ""), 0.0);
	}

	#[test]
	fn test_ratio_single_edit() {
		// "mets" -> "meats" is one insertion: 1 - 1/27 = 96.296...
		let score = ratio("new york mets", "new york meats");
		assert!((score - 96.2962).abs() < 0.01);
	}

	#[test]
	fn test_ratio_symmetric() {
		assert_eq!(ratio("abcd", "bcde"), ratio("bcde", "abcd"));
	}

	#[test]
	fn test_token_sort_ignores_word_order() {
		assert_eq!(
			token_sort_ratio("main st 100", "100 main st"),
			100.0
		);
		assert!(token_sort_ratio("acme widgets", "widgets acma") > 85.0);
	}

	#[test]
	fn test_token_set_subset_scores_perfect() {
		assert_eq!(
			token_set_ratio("acme widgets", "acme widgets western division"),
			100.0
		);
	}

	#[test]
	fn test_token_set_disjoint() {
		let score = token_set_ratio("alpha beta", "gamma delta");
		assert!(score < 50.0);
	}

	#[test]
	fn test_partial_finds_substring() {
		assert_eq!(partial_ratio("main st", "100 main st ste 4"), 100.0);
	}

	#[test]
	fn test_partial_equal_lengths_degrades_to_ratio() {
		assert_eq!(partial_ratio("abcd", "abcd"), ratio("abcd", "abcd"));
	}
}
