use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_writer(std::io::stderr)
		.init();

	if let Err(e) = matchmaker::run() {
		error!(
			"An unrecoverable error has occurred and the application will exit: {}",
			e
		);
		std::process::exit(1);
	}
}
