//! Command-line interface for the Matchmaker record-linkage engine.

use std::path::PathBuf;

use clap::Parser;

/// Matchmaker: business-entity record linkage and deduplication
#[derive(Parser, Debug)]
#[command(name = "matchmaker")]
#[command(about = "Standardize tabular business records, match them against prior data with declarative rules, and assign stable dedup keys", long_about = None)]
pub struct Cli {
	/// Path to a configuration file (defaults: ./matchmaker.json,
	/// /etc/matchmaker/config.json, then the user config directory)
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Parser, Debug)]
pub enum Commands {
	/// Map a file's headers onto the canonical schema and emit the
	/// standardized CSV plus a data-quality analytics report
	Standardize(StandardizeArgs),
	/// Run the batch matching pipeline over a CSV file, assigning a dedup
	/// key to every row
	Match(MatchArgs),
	/// Absorb a CSV file into the incremental registry, matching each row
	/// against everything previously absorbed
	Ingest(IngestArgs),
	/// Show the header and first rows of a CSV file
	Preview(PreviewArgs),
}

/// Arguments for the standardize command
#[derive(Parser, Debug)]
pub struct StandardizeArgs {
	/// Input CSV file
	#[arg(value_name = "FILE")]
	pub input: PathBuf,

	/// Directory for the processed file and analytics (default: the
	/// configured process directory)
	#[arg(short, long, value_name = "DIR")]
	pub output_dir: Option<PathBuf>,

	/// Column metadata document (default: the configured path)
	#[arg(long, value_name = "FILE")]
	pub columns_metadata: Option<PathBuf>,
}

/// Arguments for the match command
#[derive(Parser, Debug)]
pub struct MatchArgs {
	/// Input CSV file
	#[arg(value_name = "FILE")]
	pub input: PathBuf,

	/// Output CSV file with dedup keys and match columns
	#[arg(value_name = "FILE")]
	pub output: PathBuf,

	/// JSON file mapping source headers to canonical field names
	#[arg(long, value_name = "FILE")]
	pub mapping: Option<PathBuf>,

	/// Restrict the output to these columns, in order
	#[arg(long, value_name = "COL,COL,...", value_delimiter = ',')]
	pub columns: Option<Vec<String>>,

	/// Dedup store path (default: the configured store)
	#[arg(long, value_name = "FILE")]
	pub store: Option<PathBuf>,
}

/// Arguments for the ingest command
#[derive(Parser, Debug)]
pub struct IngestArgs {
	/// Input CSV file
	#[arg(value_name = "FILE")]
	pub input: PathBuf,

	/// Output CSV file (default: <input stem>_ingested.csv in the
	/// configured output directory)
	#[arg(short, long, value_name = "FILE")]
	pub output: Option<PathBuf>,

	/// Registry database path (default: the configured registry)
	#[arg(long, value_name = "FILE")]
	pub db: Option<PathBuf>,
}

/// Arguments for the preview command
#[derive(Parser, Debug)]
pub struct PreviewArgs {
	/// CSV file to preview
	#[arg(value_name = "FILE")]
	pub input: PathBuf,

	/// Maximum number of rows to show
	#[arg(short, long, default_value_t = 100)]
	pub rows: usize,
}
