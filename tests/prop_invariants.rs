use matchmaker::normalize::{
	normalize_address, normalize_company_name, normalize_email, normalize_phone, normalize_text,
};
use matchmaker::similarity::{
	Method, calculate_similarity, compare_emails, compare_phones,
};
use proptest::prelude::*;

proptest! {
	#[test]
	fn normalize_text_idempotent(s in any::<String>()) {
		let once = normalize_text(&s);
		prop_assert_eq!(normalize_text(&once), once);
	}

	#[test]
	fn normalize_company_idempotent(s in any::<String>()) {
		let once = normalize_company_name(&s);
		prop_assert_eq!(normalize_company_name(&once), once);
	}

	#[test]
	fn normalize_address_idempotent(s in any::<String>()) {
		let once = normalize_address(&s);
		prop_assert_eq!(normalize_address(&once), once);
	}

	#[test]
	fn normalize_phone_idempotent(s in any::<String>()) {
		let once = normalize_phone(&s);
		prop_assert_eq!(normalize_phone(&once), once);
	}

	#[test]
	fn normalize_email_idempotent(s in any::<String>()) {
		let once = normalize_email(&s);
		prop_assert_eq!(normalize_email(&once), once);
	}

	#[test]
	fn normalize_text_collapses_whitespace(s in any::<String>()) {
		let out = normalize_text(&s);
		prop_assert!(!out.contains("  "));
		prop_assert_eq!(out.trim(), out.as_str());
	}

	#[test]
	fn similarity_is_symmetric(
		a in "[a-z0-9 ]{1,24}",
		b in "[a-z0-9 ]{1,24}",
	) {
		for method in [Method::Ratio, Method::TokenSort, Method::TokenSet, Method::Partial] {
			let forward = calculate_similarity(&a, &b, method);
			let backward = calculate_similarity(&b, &a, method);
			prop_assert_eq!(forward, backward);
		}
	}

	#[test]
	fn similarity_with_self_is_100(a in "[a-z0-9]{1,16}( [a-z0-9]{1,8}){0,3}") {
		for method in [Method::Ratio, Method::TokenSort, Method::TokenSet, Method::Partial] {
			prop_assert_eq!(calculate_similarity(&a, &a, method), 100.0);
		}
	}

	#[test]
	fn similarity_stays_in_range(a in any::<String>(), b in any::<String>()) {
		for method in [Method::Ratio, Method::TokenSort, Method::TokenSet, Method::Partial] {
			let score = calculate_similarity(&a, &b, method);
			prop_assert!((0.0..=100.0).contains(&score));
		}
	}

	#[test]
	fn phone_comparator_is_binary(a in any::<String>(), b in any::<String>()) {
		let score = compare_phones(&a, &b);
		prop_assert!(score == 0.0 || score == 100.0);
	}

	#[test]
	fn email_comparator_is_binary(a in any::<String>(), b in any::<String>()) {
		let score = compare_emails(&a, &b);
		prop_assert!(score == 0.0 || score == 100.0);
	}
}
