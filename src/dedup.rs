//! Persistent dedup-key store.
//!
//! Maps a short content hash of a record's identifying fields to a stable
//! UUID dedup key, with reverse indices from key to member hashes and to
//! source identifiers. The store is monotone: hashes and members are only
//! ever added, existing hash-to-key bindings never change, and keys are
//! never reused. Saves are atomic (write temp, rename) and serialized with
//! a marker-file lock.

use std::{
	collections::BTreeMap,
	fs, io,
	path::{Path, PathBuf},
	time::Duration,
};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::{
	file_lock::FileLock,
	ingest::Record,
	normalize::{normalize_address, normalize_company_name, normalize_phone},
};

/// Current mapping document version.
pub const MAPPING_VERSION: &str = "2.0";

const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("I/O error: {0}")]
	Io(#[from] io::Error),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingMetadata {
	pub created_at: String,
	pub last_updated: String,
	pub total_runs: u64,
	pub version: String,
}

/// The persistent dedup mapping document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupMappings {
	pub version: String,
	#[serde(default)]
	pub data_hash_to_key: BTreeMap<String, String>,
	#[serde(default)]
	pub key_to_data_hashes: BTreeMap<String, Vec<String>>,
	#[serde(default)]
	pub key_to_identifiers: BTreeMap<String, Vec<String>>,
	pub metadata: MappingMetadata,
}

impl Default for DedupMappings {
	fn default() -> Self {
		let now = now_iso();
		DedupMappings {
			version: MAPPING_VERSION.to_string(),
			data_hash_to_key: BTreeMap::new(),
			key_to_data_hashes: BTreeMap::new(),
			key_to_identifiers: BTreeMap::new(),
			metadata: MappingMetadata {
				created_at: now.clone(),
				last_updated: now,
				total_runs: 0,
				version: MAPPING_VERSION.to_string(),
			},
		}
	}
}

impl DedupMappings {
	/// Look up the dedup key for a record's content hash, minting a new
	/// UUIDv4 key (and registering the record in all three indices) when the
	/// hash is unknown. Returns `(key, is_new)`.
	pub fn get_or_create(&mut self, record: &Record) -> (String, bool) {
		let hash = data_hash(record);

		if let Some(key) = self.data_hash_to_key.get(&hash) {
			return (key.clone(), false);
		}

		let key = Uuid::new_v4().to_string();
		self.data_hash_to_key.insert(hash.clone(), key.clone());
		self.key_to_data_hashes.insert(key.clone(), vec![hash]);
		self.key_to_identifiers
			.insert(key.clone(), vec![identifier(record)]);

		(key, true)
	}

	/// Link a record to an existing dedup key. Idempotent: the hash and
	/// identifier are appended at most once, and an existing hash-to-key
	/// binding is never overwritten.
	pub fn link(&mut self, dedup_key: &str, record: &Record) {
		let hash = data_hash(record);

		self.data_hash_to_key
			.entry(hash.clone())
			.or_insert_with(|| dedup_key.to_string());

		let hashes = self
			.key_to_data_hashes
			.entry(dedup_key.to_string())
			.or_default();
		if !hashes.contains(&hash) {
			hashes.push(hash);
		}

		let id = identifier(record);
		let identifiers = self
			.key_to_identifiers
			.entry(dedup_key.to_string())
			.or_default();
		if !identifiers.contains(&id) {
			identifiers.push(id);
		}
	}

	/// All source identifiers linked to a dedup key, in link order.
	pub fn matched_identifiers(&self, dedup_key: &str) -> &[String] {
		self.key_to_identifiers
			.get(dedup_key)
			.map(Vec::as_slice)
			.unwrap_or(&[])
	}
}

/// Content hash of a record's identifying fields: the first 16 hex chars of
/// SHA-256 over `SOURCE_TYPE|SOURCE_ID|company|address1|phone`, with the
/// source type uppercased, the id trimmed, and the rest normalized.
pub fn data_hash(record: &Record) -> String {
	let field = |name: &str| record.get(name).map(String::as_str).unwrap_or("");

	let components = [
		field("SOURCE_TYPE").trim().to_uppercase(),
		field("SOURCE_ID").trim().to_string(),
		normalize_company_name(field("COMPANY_NAME")),
		normalize_address(field("ADDRESS_LINE_1")),
		normalize_phone(field("PHONE_NUMBER")),
	];

	let mut hasher = Sha256::new();
	hasher.update(components.join("|").as_bytes());
	let digest = format!("{:x}", hasher.finalize());
	digest[..16].to_string()
}

fn identifier(record: &Record) -> String {
	let field = |name: &str| record.get(name).map(String::as_str).unwrap_or("");
	format!("{}:{}", field("SOURCE_TYPE"), field("SOURCE_ID"))
}

fn now_iso() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// File-backed store for [`DedupMappings`].
pub struct DedupStore {
	path: PathBuf,
}

impl DedupStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		DedupStore { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Load the mapping document. A missing file yields the empty default;
	/// an unreadable or malformed file is logged and also yields the
	/// default rather than failing the job.
	pub fn load(&self) -> DedupMappings {
		match fs::read(&self.path) {
			Ok(raw) => match serde_json::from_slice(&raw) {
				Ok(mappings) => mappings,
				Err(e) => {
					warn!(
						"Dedup store at {} is malformed ({}); starting from an empty mapping",
						self.path.display(),
						e
					);
					DedupMappings::default()
				}
			},
			Err(e) if e.kind() == io::ErrorKind::NotFound => DedupMappings::default(),
			Err(e) => {
				warn!(
					"Could not read dedup store at {} ({}); starting from an empty mapping",
					self.path.display(),
					e
				);
				DedupMappings::default()
			}
		}
	}

	/// Persist the mapping document: bump `total_runs`, refresh
	/// `last_updated`, and atomically replace the file under the store
	/// lock. Readers never observe a torn document.
	pub fn save(&self, mappings: &mut DedupMappings) -> Result<(), StoreError> {
		mappings.metadata.last_updated = now_iso();
		mappings.metadata.total_runs += 1;

		if let Some(parent) = self.path.parent() {
			if !parent.as_os_str().is_empty() {
				fs::create_dir_all(parent)?;
			}
		}

		let _lock = FileLock::acquire_blocking(&self.path, LOCK_TIMEOUT)?;

		let tmp_path = self.path.with_extension("json.tmp");
		let json = serde_json::to_vec_pretty(mappings)?;
		fs::write(&tmp_path, json)?;
		fs::rename(&tmp_path, &self.path)?;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn record(source_type: &str, source_id: &str, company: &str) -> Record {
		[
			("SOURCE_TYPE", source_type),
			("SOURCE_ID", source_id),
			("COMPANY_NAME", company),
			("ADDRESS_LINE_1", "100 Main St"),
			("PHONE_NUMBER", "212-555-0100"),
		]
		.iter()
		.map(|(k, v)| (k.to_string(), v.to_string()))
		.collect()
	}

	#[test]
	fn test_data_hash_is_stable_and_normalized() {
		let a = record("a", "1", "Acme, Inc.");
		let b = record("A", " 1 ", "ACME INCORPORATED");

		// source type case, id whitespace, and company legal forms all wash out
		assert_eq!(data_hash(&a), data_hash(&b));
		assert_eq!(data_hash(&a).len(), 16);
	}

	#[test]
	fn test_data_hash_differs_on_content() {
		let a = record("A", "1", "Acme");
		let b = record("A", "2", "Acme");
		assert_ne!(data_hash(&a), data_hash(&b));
	}

	#[test]
	fn test_get_or_create_reuses_key() {
		let mut mappings = DedupMappings::default();
		let rec = record("A", "1", "Acme");

		let (key, is_new) = mappings.get_or_create(&rec);
		assert!(is_new);

		let (again, is_new) = mappings.get_or_create(&rec);
		assert!(!is_new);
		assert_eq!(key, again);
		assert_eq!(mappings.data_hash_to_key.len(), 1);
	}

	#[test]
	fn test_link_is_idempotent() {
		let mut mappings = DedupMappings::default();
		let first = record("A", "1", "Acme");
		let second = record("B", "9", "Acme");

		let (key, _) = mappings.get_or_create(&first);
		mappings.link(&key, &second);
		mappings.link(&key, &second);

		assert_eq!(mappings.key_to_data_hashes[&key].len(), 2);
		assert_eq!(
			mappings.matched_identifiers(&key),
			&["A:1".to_string(), "B:9".to_string()]
		);
	}

	#[test]
	fn test_link_never_rebinds_a_hash() {
		let mut mappings = DedupMappings::default();
		let rec = record("A", "1", "Acme");

		let (original_key, _) = mappings.get_or_create(&rec);
		mappings.link("some-other-key", &rec);

		assert_eq!(mappings.data_hash_to_key[&data_hash(&rec)], original_key);
	}

	#[test]
	fn test_save_and_load_round_trip() {
		let dir = tempfile::tempdir().expect("tempdir");
		let store = DedupStore::new(dir.path().join("models").join("mappings.json"));

		let mut mappings = store.load();
		assert_eq!(mappings.metadata.total_runs, 0);

		let (key, _) = mappings.get_or_create(&record("A", "1", "Acme"));
		store.save(&mut mappings).expect("save");

		let reloaded = store.load();
		assert_eq!(reloaded.metadata.total_runs, 1);
		assert_eq!(reloaded.data_hash_to_key.values().next(), Some(&key));
		assert_eq!(reloaded.version, MAPPING_VERSION);
	}

	#[test]
	fn test_load_malformed_store_falls_back_to_default() {
		let dir = tempfile::tempdir().expect("tempdir");
		let path = dir.path().join("mappings.json");
		fs::write(&path, b"{ not json").expect("write");

		let store = DedupStore::new(&path);
		let mappings = store.load();
		assert!(mappings.data_hash_to_key.is_empty());
	}
}
