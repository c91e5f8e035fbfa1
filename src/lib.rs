mod cli;
pub mod config;
pub mod configuration;
pub mod dedup;
pub mod file_lock;
pub mod ingest;
pub mod matching;
pub mod normalize;
pub mod quality;
pub mod registry;
pub mod rules;
pub mod similarity;
pub mod standardize;

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::{
	cli::{Cli, Commands},
	config::ConfigStore,
	configuration::Configuration,
	dedup::DedupStore,
	matching::MatchPipeline,
	quality::QualityScorer,
	registry::RecordRegistry,
	rules::RuleEngine,
};

pub fn run() -> Result<(), RunError> {
	let cli = match Cli::try_parse() {
		Ok(cli) => cli,
		Err(e) => {
			eprintln!("{}", e);
			std::process::exit(1);
		}
	};

	let configuration = Configuration::load(&cli.config)?;
	let store = ConfigStore::new(
		&configuration.paths.rules,
		&configuration.paths.columns_metadata,
		&configuration.paths.settings,
	);

	match cli.command {
		Commands::Standardize(args) => {
			let output_dir = args
				.output_dir
				.unwrap_or_else(|| configuration.paths.process.clone());
			let columns = match &args.columns_metadata {
				Some(path) => ConfigStore::new(
					&configuration.paths.rules,
					path,
					&configuration.paths.settings,
				)
				.columns(),
				None => store.columns(),
			};
			let result = standardize::process_file(&args.input, &output_dir, &columns)?;
			print_json(&result)?;
		}
		Commands::Match(args) => {
			let engine = RuleEngine::new((*store.rules()).clone());
			let scorer = QualityScorer::with_lists(store.settings().quality_scores.clone());
			let dedup_store = DedupStore::new(
				args.store
					.unwrap_or_else(|| configuration.paths.dedup_store.clone()),
			);

			let field_mapping = match &args.mapping {
				Some(path) => Some(read_mapping(path)?),
				None => None,
			};

			let pipeline = MatchPipeline::new(engine, scorer, dedup_store)
				.with_columns_metadata((*store.columns()).clone())
				.with_max_input_bytes(configuration.max_upload_bytes);
			let stats = pipeline.run(
				&args.input,
				&args.output,
				field_mapping.as_ref(),
				args.columns.as_deref(),
			)?;
			print_json(&stats)?;
		}
		Commands::Ingest(args) => {
			let db_path = args
				.db
				.unwrap_or_else(|| configuration.paths.registry_db.clone());
			if let Some(parent) = db_path.parent() {
				if !parent.as_os_str().is_empty() {
					std::fs::create_dir_all(parent)?;
				}
			}

			let output = args.output.unwrap_or_else(|| {
				let stem = args
					.input
					.file_stem()
					.map(|s| s.to_string_lossy().to_string())
					.unwrap_or_else(|| "input".to_string());
				configuration
					.paths
					.output
					.join(format!("{}_ingested.csv", stem))
			});

			let registry = RecordRegistry::open(&db_path)?;
			let stats = registry.ingest_file(
				&args.input,
				&output,
				Some(configuration.max_upload_bytes),
			)?;
			print_json(&stats)?;
		}
		Commands::Preview(args) => {
			let preview = standardize::preview(&args.input, args.rows)?;
			print_json(&preview)?;
		}
	}

	Ok(())
}

fn read_mapping(path: &PathBuf) -> Result<HashMap<String, String>, RunError> {
	let raw = std::fs::read(path)?;
	Ok(serde_json::from_slice(&raw)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), RunError> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

#[derive(Debug, Error)]
pub enum RunError {
	#[error("Configuration error: {0}")]
	Configuration(#[from] configuration::ConfigurationError),

	#[error("Matching error: {0}")]
	Matching(#[from] matching::MatchingError),

	#[error("Standardize error: {0}")]
	Standardize(#[from] standardize::StandardizeError),

	#[error("Registry error: {0}")]
	Registry(#[from] registry::RegistryError),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}
