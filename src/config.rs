//! Mtime-cached JSON configuration documents.
//!
//! Three documents drive a run: match rules, column metadata, and free-form
//! settings. Each is loaded lazily and cached against its file modification
//! time; an absent file is the empty document, and malformed JSON is logged
//! and treated as empty so a bad edit never takes matching down. Saves are
//! atomic (write temp, rename) with 4-space indentation and invalidate the
//! cache slot.

use std::{
	fs, io,
	path::{Path, PathBuf},
	sync::{Arc, Mutex},
	time::SystemTime,
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::warn;

use crate::{quality::QualityLists, rules::RulesDocument};

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error: {0}")]
	Io(#[from] io::Error),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Metadata for one canonical column, used by the standardizer to map
/// arbitrary input headers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnMeta {
	#[serde(default)]
	pub display_label: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub group: String,
	#[serde(default)]
	pub alternate_columns: Vec<String>,
}

/// Canonical column name to metadata, in document order.
pub type ColumnsMetadata = IndexMap<String, ColumnMeta>;

/// The free-form settings document, with its typed sub-sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
	#[serde(default)]
	pub quality_scores: QualityLists,
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One mtime-guarded cache slot.
struct Slot<T> {
	state: Mutex<Option<(SystemTime, Arc<T>)>>,
}

impl<T: DeserializeOwned + Default> Slot<T> {
	fn new() -> Self {
		Slot {
			state: Mutex::new(None),
		}
	}

	fn read(&self, path: &Path) -> Arc<T> {
		let Ok(mtime) = fs::metadata(path).and_then(|m| m.modified()) else {
			// Absent (or unstattable) file: the empty document. Nothing is
			// cached so the file is picked up as soon as it appears.
			return Arc::new(T::default());
		};

		let mut state = self.state.lock().expect("config cache lock");

		if let Some((cached_mtime, doc)) = state.as_ref() {
			if *cached_mtime == mtime {
				return Arc::clone(doc);
			}
		}

		let doc = match fs::read(path) {
			Ok(raw) => match serde_json::from_slice(&raw) {
				Ok(doc) => doc,
				Err(e) => {
					warn!(
						"Malformed config document {} ({}); using the empty document",
						path.display(),
						e
					);
					T::default()
				}
			},
			Err(e) => {
				warn!(
					"Could not read config document {} ({}); using the empty document",
					path.display(),
					e
				);
				T::default()
			}
		};

		let doc = Arc::new(doc);
		*state = Some((mtime, Arc::clone(&doc)));
		doc
	}

	fn invalidate(&self) {
		*self.state.lock().expect("config cache lock") = None;
	}
}

/// Cached access to the three configuration documents.
pub struct ConfigStore {
	rules_path: PathBuf,
	columns_path: PathBuf,
	settings_path: PathBuf,
	rules: Slot<RulesDocument>,
	columns: Slot<ColumnsMetadata>,
	settings: Slot<Settings>,
}

impl ConfigStore {
	pub fn new(
		rules_path: impl Into<PathBuf>,
		columns_path: impl Into<PathBuf>,
		settings_path: impl Into<PathBuf>,
	) -> Self {
		ConfigStore {
			rules_path: rules_path.into(),
			columns_path: columns_path.into(),
			settings_path: settings_path.into(),
			rules: Slot::new(),
			columns: Slot::new(),
			settings: Slot::new(),
		}
	}

	pub fn rules(&self) -> Arc<RulesDocument> {
		self.rules.read(&self.rules_path)
	}

	pub fn columns(&self) -> Arc<ColumnsMetadata> {
		self.columns.read(&self.columns_path)
	}

	pub fn settings(&self) -> Arc<Settings> {
		self.settings.read(&self.settings_path)
	}

	pub fn save_rules(&self, doc: &RulesDocument) -> Result<(), ConfigError> {
		save_json(&self.rules_path, doc)?;
		self.rules.invalidate();
		Ok(())
	}

	pub fn save_columns(&self, doc: &ColumnsMetadata) -> Result<(), ConfigError> {
		save_json(&self.columns_path, doc)?;
		self.columns.invalidate();
		Ok(())
	}

	pub fn save_settings(&self, doc: &Settings) -> Result<(), ConfigError> {
		save_json(&self.settings_path, doc)?;
		self.settings.invalidate();
		Ok(())
	}
}

/// Atomically write a config document with 4-space indentation.
fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
	if let Some(parent) = path.parent() {
		if !parent.as_os_str().is_empty() {
			fs::create_dir_all(parent)?;
		}
	}

	let mut buf = Vec::new();
	let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
	let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
	value.serialize(&mut serializer)?;

	let tmp_path = path.with_extension("json.tmp");
	fs::write(&tmp_path, buf)?;
	fs::rename(&tmp_path, path)?;

	Ok(())
}
