//! Host configuration: working directories, limits, and config document
//! paths.
//!
//! Loaded from `matchmaker.json` in the working directory, `/etc/matchmaker/`,
//! or the user config directory (first match wins for each key), with every
//! field optional and defaulted. The core itself reads no environment
//! variables; everything arrives through this structure.

use std::path::PathBuf;

use config::File;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default ingest-layer upload cap: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigurationError {
	#[error("Configuration error: {0}")]
	Load(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
	#[serde(default)]
	pub paths: PathConfiguration,
	#[serde(default = "default_max_upload_bytes")]
	pub max_upload_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfiguration {
	/// Uploaded files waiting to be processed.
	#[serde(default = "PathConfiguration::default_incoming")]
	pub incoming: PathBuf,
	/// Standardized files and their analytics.
	#[serde(default = "PathConfiguration::default_process")]
	pub process: PathBuf,
	/// Matching output files.
	#[serde(default = "PathConfiguration::default_output")]
	pub output: PathBuf,
	/// The persistent dedup mapping store.
	#[serde(default = "PathConfiguration::default_dedup_store")]
	pub dedup_store: PathBuf,
	/// The incremental registry database.
	#[serde(default = "PathConfiguration::default_registry_db")]
	pub registry_db: PathBuf,
	/// Match rules document.
	#[serde(default = "PathConfiguration::default_rules")]
	pub rules: PathBuf,
	/// Column metadata document.
	#[serde(default = "PathConfiguration::default_columns_metadata")]
	pub columns_metadata: PathBuf,
	/// Free-form settings document.
	#[serde(default = "PathConfiguration::default_settings")]
	pub settings: PathBuf,
}

impl PathConfiguration {
	fn default_incoming() -> PathBuf {
		PathBuf::from("datafiles/incoming")
	}

	fn default_process() -> PathBuf {
		PathBuf::from("datafiles/process")
	}

	fn default_output() -> PathBuf {
		PathBuf::from("datafiles/output")
	}

	fn default_dedup_store() -> PathBuf {
		PathBuf::from("datafiles/models/dedup_mappings.json")
	}

	fn default_registry_db() -> PathBuf {
		PathBuf::from("datafiles/models/registry.db")
	}

	fn default_rules() -> PathBuf {
		PathBuf::from("config/rules.json")
	}

	fn default_columns_metadata() -> PathBuf {
		PathBuf::from("config/columns_metadata.json")
	}

	fn default_settings() -> PathBuf {
		PathBuf::from("config/settings.json")
	}
}

impl Default for PathConfiguration {
	fn default() -> Self {
		PathConfiguration {
			incoming: Self::default_incoming(),
			process: Self::default_process(),
			output: Self::default_output(),
			dedup_store: Self::default_dedup_store(),
			registry_db: Self::default_registry_db(),
			rules: Self::default_rules(),
			columns_metadata: Self::default_columns_metadata(),
			settings: Self::default_settings(),
		}
	}
}

impl Default for Configuration {
	fn default() -> Self {
		Configuration {
			paths: PathConfiguration::default(),
			max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
		}
	}
}

fn default_max_upload_bytes() -> u64 {
	DEFAULT_MAX_UPLOAD_BYTES
}

impl Configuration {
	/// Load the configuration. An explicit path is required to exist; the
	/// default locations are all optional and a missing file simply yields
	/// the defaults.
	pub fn load(path: &Option<PathBuf>) -> Result<Self, ConfigurationError> {
		if let Some(config_path) = path {
			debug!(
				"Loading configuration from user specified path: {:?}",
				config_path
			);
			let builder = config::Config::builder()
				.add_source(File::from(config_path.clone()).required(true));
			return Ok(builder.build()?.try_deserialize()?);
		}

		let mut builder = config::Config::builder()
			.add_source(File::with_name("matchmaker").required(false))
			.add_source(File::with_name("/etc/matchmaker/config").required(false));

		if let Some(user_dir) = dirs::config_local_dir().or_else(dirs::config_dir) {
			let user_path = user_dir.join("matchmaker").join("config.json");
			builder = builder.add_source(File::from(user_path).required(false));
		}

		Ok(builder.build()?.try_deserialize()?)
	}
}
